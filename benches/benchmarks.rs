use phylo_likelihood::{Capabilities, Operation};

criterion::criterion_main!(benches);
criterion::criterion_group! {
    name = benches;
    config = criterion::Criterion::default()
        .without_plots()
        .noise_threshold(3.0)
        .significance_level(0.01)
        .sample_size(10)
        .measurement_time(std::time::Duration::from_secs(1));
    targets =
        exponentiating_jc69_transition_matrix,
        pruning_a_two_tip_cherry,
        pruning_a_fifty_tip_caterpillar,
        integrating_root_log_likelihoods,
}

fn jc69_eigen() -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    #[rustfmt::skip]
    let e = vec![
        1.0,  1.0,  1.0,  1.0,
        1.0,  1.0, -1.0, -1.0,
        1.0, -1.0,  1.0, -1.0,
        1.0, -1.0, -1.0,  1.0,
    ];
    let e_inv = e.iter().map(|x| x * 0.25).collect();
    let lambda = vec![0.0, -4.0 / 3.0, -4.0 / 3.0, -4.0 / 3.0];
    (e, e_inv, lambda)
}

fn exponentiating_jc69_transition_matrix(c: &mut criterion::Criterion) {
    let (e, e_inv, lambda) = jc69_eigen();
    let handle =
        phylo_likelihood::create_instance(2, 1, 2, 4, 1, 1, 2, 1, &[], Capabilities::empty()).unwrap();
    phylo_likelihood::set_eigen_decomposition(handle, 0, &e, &e_inv, &lambda).unwrap();
    c.bench_function("exponentiate a JC69 transition matrix", |b| {
        b.iter(|| {
            phylo_likelihood::update_transition_matrices(handle, 0, &[0], None, None, &[0.1]).unwrap()
        })
    });
    phylo_likelihood::finalize(handle).unwrap();
}

fn pruning_a_two_tip_cherry(c: &mut criterion::Criterion) {
    let (e, e_inv, lambda) = jc69_eigen();
    let handle =
        phylo_likelihood::create_instance(2, 1, 2, 4, 200, 1, 2, 1, &[], Capabilities::empty())
            .unwrap();
    phylo_likelihood::set_eigen_decomposition(handle, 0, &e, &e_inv, &lambda).unwrap();
    for tip in 0..2 {
        phylo_likelihood::set_tip_states(handle, tip, &vec![0i32; 200]).unwrap();
    }
    phylo_likelihood::update_transition_matrices(handle, 0, &[0, 1], None, None, &[0.1, 0.1]).unwrap();
    let op = Operation {
        destination_partials: 0,
        destination_scaling: Some(0),
        source1: 1,
        source1_matrix: 0,
        source2: 2,
        source2_matrix: 1,
    };
    c.bench_function("prune a two-tip cherry across 200 patterns", |b| {
        b.iter(|| phylo_likelihood::update_partials(handle, &[op], true).unwrap())
    });
    phylo_likelihood::finalize(handle).unwrap();
}

fn pruning_a_fifty_tip_caterpillar(c: &mut criterion::Criterion) {
    let (e, e_inv, lambda) = jc69_eigen();
    let depth = 50usize;
    let tip_count = depth + 1;
    let handle = phylo_likelihood::create_instance(
        tip_count,
        depth,
        tip_count,
        4,
        50,
        1,
        1,
        1,
        &[],
        Capabilities::empty(),
    )
    .unwrap();
    phylo_likelihood::set_eigen_decomposition(handle, 0, &e, &e_inv, &lambda).unwrap();
    for tip in 0..tip_count {
        phylo_likelihood::set_tip_states(handle, tip, &vec![(tip % 4) as i32; 50]).unwrap();
    }
    phylo_likelihood::update_transition_matrices(handle, 0, &[0], None, None, &[0.2]).unwrap();

    let mut ops = Vec::with_capacity(depth);
    ops.push(Operation {
        destination_partials: 0,
        destination_scaling: Some(0),
        source1: depth,
        source1_matrix: 0,
        source2: depth + 1,
        source2_matrix: 0,
    });
    for i in 1..depth {
        ops.push(Operation {
            destination_partials: i,
            destination_scaling: Some(i),
            source1: i - 1,
            source1_matrix: 0,
            source2: depth + i + 1,
            source2_matrix: 0,
        });
    }

    c.bench_function("prune a 50-tip caterpillar across 50 patterns", |b| {
        b.iter(|| phylo_likelihood::update_partials(handle, &ops, true).unwrap())
    });
    phylo_likelihood::finalize(handle).unwrap();
}

fn integrating_root_log_likelihoods(c: &mut criterion::Criterion) {
    let (e, e_inv, lambda) = jc69_eigen();
    let handle =
        phylo_likelihood::create_instance(2, 1, 2, 4, 500, 1, 2, 1, &[], Capabilities::empty())
            .unwrap();
    phylo_likelihood::set_eigen_decomposition(handle, 0, &e, &e_inv, &lambda).unwrap();
    for tip in 0..2 {
        phylo_likelihood::set_tip_states(handle, tip, &vec![0i32; 500]).unwrap();
    }
    phylo_likelihood::update_transition_matrices(handle, 0, &[0, 1], None, None, &[0.1, 0.1]).unwrap();
    let op = Operation {
        destination_partials: 0,
        destination_scaling: Some(0),
        source1: 1,
        source1_matrix: 0,
        source2: 2,
        source2_matrix: 1,
    };
    phylo_likelihood::update_partials(handle, &[op], true).unwrap();
    let mut out = vec![0.0; 500];
    c.bench_function("integrate root log-likelihoods over 500 patterns", |b| {
        b.iter(|| {
            phylo_likelihood::calculate_root_log_likelihoods(
                handle,
                &[0],
                &[1.0],
                &[0.25, 0.25, 0.25, 0.25],
                &mut out,
            )
            .unwrap()
        })
    });
    phylo_likelihood::finalize(handle).unwrap();
}
