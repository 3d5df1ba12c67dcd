//! Public entry points. Each free function validates nothing itself beyond
//! what the registry and instance layers already do; it only translates
//! `EngineError` into the stable [`ErrorCode`] taxonomy via
//! [`error::boundary`].

use crate::error::{boundary, ErrorCode};
use crate::instance::InstanceDetails;
use crate::pruning::Operation;
use crate::registry;
use crate::resource::{Capabilities, Resource};
use crate::{Handle, Real};

/// Enumerates the compute resources the in-tree backend factories can bind
/// to.
pub fn get_resource_list() -> Vec<Resource> {
    crate::resource::resource_list()
}

/// Allocates buffers and selects a backend via the factory chain, returning
/// a fresh handle.
#[allow(clippy::too_many_arguments)]
pub fn create_instance(
    tip_count: usize,
    partials_buffer_count: usize,
    compact_buffer_count: usize,
    state_count: usize,
    pattern_count: usize,
    eigen_buffer_count: usize,
    matrix_buffer_count: usize,
    rate_category_count: usize,
    resource_list: &[usize],
    requirement_flags: Capabilities,
) -> Result<Handle, ErrorCode> {
    boundary(|| {
        registry::create_instance(
            tip_count,
            partials_buffer_count,
            compact_buffer_count,
            state_count,
            pattern_count,
            eigen_buffer_count,
            matrix_buffer_count,
            rate_category_count,
            resource_list,
            requirement_flags,
        )
    })
}

/// Returns the backend details chosen for `handle` by `create_instance`.
/// The in-tree backends finish construction synchronously, so this only
/// looks the details up.
pub fn initialize_instance(handle: Handle) -> Result<InstanceDetails, ErrorCode> {
    boundary(|| registry::with_instance(handle, |inst| Ok(inst.details())))
}

/// Destroys the backend behind `handle` and frees its registry slot for
/// reuse.
pub fn finalize(handle: Handle) -> Result<(), ErrorCode> {
    boundary(|| registry::finalize(handle))
}

pub fn set_partials(handle: Handle, index: usize, values: &[Real]) -> Result<(), ErrorCode> {
    boundary(|| registry::with_instance_mut(handle, |inst| inst.set_partials(index, values)))
}

pub fn get_partials(handle: Handle, index: usize, out: &mut [Real]) -> Result<(), ErrorCode> {
    boundary(|| registry::with_instance(handle, |inst| inst.get_partials(index, out)))
}

pub fn set_tip_states(handle: Handle, tip_index: usize, states: &[i32]) -> Result<(), ErrorCode> {
    boundary(|| registry::with_instance_mut(handle, |inst| inst.set_tip_states(tip_index, states)))
}

pub fn set_tip_ambiguity_table(handle: Handle, table: &[Real]) -> Result<(), ErrorCode> {
    boundary(|| registry::with_instance_mut(handle, |inst| inst.set_tip_ambiguity_table(table)))
}

pub fn set_eigen_decomposition(
    handle: Handle,
    index: usize,
    eigenvectors: &[Real],
    inverse_eigenvectors: &[Real],
    eigenvalues: &[Real],
) -> Result<(), ErrorCode> {
    boundary(|| {
        registry::with_instance_mut(handle, |inst| {
            inst.set_eigen_decomposition(index, eigenvectors, inverse_eigenvectors, eigenvalues)
        })
    })
}

pub fn set_transition_matrix(handle: Handle, index: usize, values: &[Real]) -> Result<(), ErrorCode> {
    boundary(|| registry::with_instance_mut(handle, |inst| inst.set_transition_matrix(index, values)))
}

/// Installs the per-category rate multipliers used by every subsequent
/// `update_transition_matrices` call on `handle`. Unset categories default
/// to `1.0`.
pub fn set_category_rates(handle: Handle, rates: &[Real]) -> Result<(), ErrorCode> {
    boundary(|| registry::with_instance_mut(handle, |inst| inst.set_category_rates(rates)))
}

pub fn update_transition_matrices(
    handle: Handle,
    eigen_index: usize,
    probability_indices: &[usize],
    first_derivative_indices: Option<&[usize]>,
    second_derivative_indices: Option<&[usize]>,
    edge_lengths: &[Real],
) -> Result<(), ErrorCode> {
    boundary(|| {
        registry::with_instance_mut(handle, |inst| {
            inst.update_transition_matrices(
                eigen_index,
                probability_indices,
                first_derivative_indices,
                second_derivative_indices,
                edge_lengths,
            )
        })
    })
}

pub fn update_partials(handle: Handle, operations: &[Operation], rescale: bool) -> Result<(), ErrorCode> {
    boundary(|| registry::with_instance_mut(handle, |inst| inst.update_partials(operations, rescale)))
}

pub fn wait_for_partials(handle: Handle, indices: &[usize]) -> Result<(), ErrorCode> {
    boundary(|| registry::with_instance(handle, |inst| inst.wait_for_partials(indices)))
}

pub fn calculate_root_log_likelihoods(
    handle: Handle,
    buffer_indices: &[usize],
    weights: &[Real],
    state_frequencies: &[Real],
    out: &mut [Real],
) -> Result<(), ErrorCode> {
    boundary(|| {
        registry::with_instance(handle, |inst| {
            inst.calculate_root_log_likelihoods(buffer_indices, weights, state_frequencies, out)
        })
    })
}

#[allow(clippy::too_many_arguments)]
pub fn calculate_edge_log_likelihoods(
    handle: Handle,
    parent: &[usize],
    child: &[usize],
    probability_indices: &[usize],
    first_derivative_indices: Option<&[usize]>,
    second_derivative_indices: Option<&[usize]>,
    weights: &[Real],
    frequencies: &[Real],
    out: &mut [Real],
    out_d1: Option<&mut [Real]>,
    out_d2: Option<&mut [Real]>,
) -> Result<(), ErrorCode> {
    boundary(|| {
        registry::with_instance(handle, |inst| {
            inst.calculate_edge_log_likelihoods(
                parent,
                child,
                probability_indices,
                first_derivative_indices,
                second_derivative_indices,
                weights,
                frequencies,
                out,
                out_d1,
                out_d2,
            )
        })
    })
}

/// RAII convenience wrapper around a handle: `finalize`s on drop so callers
/// don't have to match every `create_instance` with a manual `finalize`.
/// The free functions above remain the canonical handle-based API; this is
/// an ergonomic addition layered on top.
pub struct Engine {
    handle: Handle,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        tip_count: usize,
        partials_buffer_count: usize,
        compact_buffer_count: usize,
        state_count: usize,
        pattern_count: usize,
        eigen_buffer_count: usize,
        matrix_buffer_count: usize,
        rate_category_count: usize,
        resource_list: &[usize],
        requirement_flags: Capabilities,
    ) -> Result<Self, ErrorCode> {
        let handle = create_instance(
            tip_count,
            partials_buffer_count,
            compact_buffer_count,
            state_count,
            pattern_count,
            eigen_buffer_count,
            matrix_buffer_count,
            rate_category_count,
            resource_list,
            requirement_flags,
        )?;
        Ok(Self { handle })
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn initialize(&self) -> Result<InstanceDetails, ErrorCode> {
        initialize_instance(self.handle)
    }

    pub fn set_partials(&self, index: usize, values: &[Real]) -> Result<(), ErrorCode> {
        set_partials(self.handle, index, values)
    }

    pub fn get_partials(&self, index: usize, out: &mut [Real]) -> Result<(), ErrorCode> {
        get_partials(self.handle, index, out)
    }

    pub fn set_tip_states(&self, tip_index: usize, states: &[i32]) -> Result<(), ErrorCode> {
        set_tip_states(self.handle, tip_index, states)
    }

    pub fn set_tip_ambiguity_table(&self, table: &[Real]) -> Result<(), ErrorCode> {
        set_tip_ambiguity_table(self.handle, table)
    }

    pub fn set_eigen_decomposition(
        &self,
        index: usize,
        eigenvectors: &[Real],
        inverse_eigenvectors: &[Real],
        eigenvalues: &[Real],
    ) -> Result<(), ErrorCode> {
        set_eigen_decomposition(self.handle, index, eigenvectors, inverse_eigenvectors, eigenvalues)
    }

    pub fn set_transition_matrix(&self, index: usize, values: &[Real]) -> Result<(), ErrorCode> {
        set_transition_matrix(self.handle, index, values)
    }

    pub fn set_category_rates(&self, rates: &[Real]) -> Result<(), ErrorCode> {
        set_category_rates(self.handle, rates)
    }

    pub fn update_transition_matrices(
        &self,
        eigen_index: usize,
        probability_indices: &[usize],
        first_derivative_indices: Option<&[usize]>,
        second_derivative_indices: Option<&[usize]>,
        edge_lengths: &[Real],
    ) -> Result<(), ErrorCode> {
        update_transition_matrices(
            self.handle,
            eigen_index,
            probability_indices,
            first_derivative_indices,
            second_derivative_indices,
            edge_lengths,
        )
    }

    pub fn update_partials(&self, operations: &[Operation], rescale: bool) -> Result<(), ErrorCode> {
        update_partials(self.handle, operations, rescale)
    }

    pub fn wait_for_partials(&self, indices: &[usize]) -> Result<(), ErrorCode> {
        wait_for_partials(self.handle, indices)
    }

    pub fn calculate_root_log_likelihoods(
        &self,
        buffer_indices: &[usize],
        weights: &[Real],
        state_frequencies: &[Real],
        out: &mut [Real],
    ) -> Result<(), ErrorCode> {
        calculate_root_log_likelihoods(self.handle, buffer_indices, weights, state_frequencies, out)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn calculate_edge_log_likelihoods(
        &self,
        parent: &[usize],
        child: &[usize],
        probability_indices: &[usize],
        first_derivative_indices: Option<&[usize]>,
        second_derivative_indices: Option<&[usize]>,
        weights: &[Real],
        frequencies: &[Real],
        out: &mut [Real],
        out_d1: Option<&mut [Real]>,
        out_d2: Option<&mut [Real]>,
    ) -> Result<(), ErrorCode> {
        calculate_edge_log_likelihoods(
            self.handle,
            parent,
            child,
            probability_indices,
            first_derivative_indices,
            second_derivative_indices,
            weights,
            frequencies,
            out,
            out_d1,
            out_d2,
        )
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(err) = finalize(self.handle) {
            log::warn!("Engine::drop: finalize({}) failed: {err}", self.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Jukes-Cantor eigendecomposition of the 4-state rate matrix, scaled
    /// so `lambda = [0, -4/3, -4/3, -4/3]`. `E` is its own Hadamard-style
    /// inverse up to the `1/4` factor, so `E_inv = E / 4`.
    fn jc69_eigen() -> (Vec<Real>, Vec<Real>, Vec<Real>) {
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

    /// Closed-form `(P_same, P_diff)` for JC69 at branch length `t`.
    fn jc69_closed_form(t: Real) -> (Real, Real) {
        let a = (-4.0 / 3.0 * t).exp();
        (0.25 + 0.75 * a, 0.25 - 0.25 * a)
    }

    #[test]
    fn jc69_two_tip_matches_closed_form() {
        let (e, e_inv, lambda) = jc69_eigen();
        let handle = create_instance(2, 1, 2, 4, 1, 1, 2, 1, &[], Capabilities::empty()).unwrap();
        set_eigen_decomposition(handle, 0, &e, &e_inv, &lambda).unwrap();
        set_tip_states(handle, 0, &[0]).unwrap();
        set_tip_states(handle, 1, &[0]).unwrap();
        update_transition_matrices(handle, 0, &[0, 1], None, None, &[0.1, 0.1]).unwrap();

        let op = Operation {
            destination_partials: 0,
            destination_scaling: Some(0),
            source1: 1,
            source1_matrix: 0,
            source2: 2,
            source2_matrix: 1,
        };
        update_partials(handle, &[op], true).unwrap();

        let mut out = [0.0; 1];
        calculate_root_log_likelihoods(handle, &[0], &[1.0], &[0.25, 0.25, 0.25, 0.25], &mut out)
            .unwrap();

        let (p_same, p_diff) = jc69_closed_form(0.1);
        let expected = 0.25 * (p_same * p_same + 3.0 * p_diff * p_diff);
        assert!((out[0].exp() - expected).abs() < 1e-9, "{} vs {}", out[0].exp(), expected);
        finalize(handle).unwrap();
    }

    #[test]
    fn balanced_four_taxon_tree_is_deterministic() {
        let (e, e_inv, lambda) = jc69_eigen();

        let run = || -> Real {
            let handle = create_instance(4, 3, 4, 4, 1, 1, 6, 1, &[], Capabilities::empty()).unwrap();
            set_eigen_decomposition(handle, 0, &e, &e_inv, &lambda).unwrap();
            set_tip_states(handle, 0, &[0]).unwrap();
            set_tip_states(handle, 1, &[1]).unwrap();
            set_tip_states(handle, 2, &[2]).unwrap();
            set_tip_states(handle, 3, &[3]).unwrap();
            update_transition_matrices(
                handle,
                0,
                &[0, 1, 2, 3, 4, 5],
                None,
                None,
                &[0.1, 0.1, 0.1, 0.1, 0.05, 0.05],
            )
            .unwrap();

            let ops = [
                Operation {
                    destination_partials: 0,
                    destination_scaling: Some(0),
                    source1: 3,
                    source1_matrix: 0,
                    source2: 4,
                    source2_matrix: 1,
                },
                Operation {
                    destination_partials: 1,
                    destination_scaling: Some(1),
                    source1: 5,
                    source1_matrix: 2,
                    source2: 6,
                    source2_matrix: 3,
                },
                Operation {
                    destination_partials: 2,
                    destination_scaling: Some(2),
                    source1: 0,
                    source1_matrix: 4,
                    source2: 1,
                    source2_matrix: 5,
                },
            ];
            update_partials(handle, &ops, true).unwrap();

            let mut out = [0.0; 1];
            calculate_root_log_likelihoods(handle, &[2], &[1.0], &[0.25, 0.25, 0.25, 0.25], &mut out)
                .unwrap();
            finalize(handle).unwrap();
            out[0]
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn deep_caterpillar_rescaling_prevents_underflow() {
        let (e, e_inv, lambda) = jc69_eigen();
        let depth = 600usize;
        let tip_count = depth + 1;
        let t = 10.0; // near-saturated branch length: every entry of P(t) ~= 0.25

        let run = |rescale: bool| -> Real {
            let handle =
                create_instance(tip_count, depth, tip_count, 4, 1, 1, 1, 1, &[], Capabilities::empty())
                    .unwrap();
            set_eigen_decomposition(handle, 0, &e, &e_inv, &lambda).unwrap();
            for tip in 0..tip_count {
                set_tip_states(handle, tip, &[0]).unwrap();
            }
            update_transition_matrices(handle, 0, &[0], None, None, &[t]).unwrap();

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
            update_partials(handle, &ops, rescale).unwrap();

            let mut out = [0.0; 1];
            calculate_root_log_likelihoods(
                handle,
                &[depth - 1],
                &[1.0],
                &[0.25, 0.25, 0.25, 0.25],
                &mut out,
            )
            .unwrap();
            finalize(handle).unwrap();
            out[0]
        };

        let rescaled = run(true);
        assert!(rescaled.is_finite(), "rescaled root log-likelihood should stay finite, got {rescaled}");

        let unrescaled = run(false);
        assert!(
            unrescaled.is_infinite() && unrescaled.is_sign_negative(),
            "without rescaling a 600-deep caterpillar should underflow to -inf, got {unrescaled}"
        );
    }

    #[test]
    fn ambiguous_tip_marginalizes_over_concrete_states() {
        let (e, e_inv, lambda) = jc69_eigen();
        let t = 0.1;

        let run = |tip0_code: i32, ambiguity_table: Option<&[Real]>| -> Vec<Real> {
            let handle = create_instance(2, 1, 2, 4, 1, 1, 2, 1, &[], Capabilities::empty()).unwrap();
            set_eigen_decomposition(handle, 0, &e, &e_inv, &lambda).unwrap();
            if let Some(table) = ambiguity_table {
                set_tip_ambiguity_table(handle, table).unwrap();
            }
            set_tip_states(handle, 0, &[tip0_code]).unwrap();
            set_tip_states(handle, 1, &[0]).unwrap();
            update_transition_matrices(handle, 0, &[0, 1], None, None, &[t, t]).unwrap();

            let op = Operation {
                destination_partials: 0,
                destination_scaling: Some(0),
                source1: 1,
                source1_matrix: 0,
                source2: 2,
                source2_matrix: 1,
            };
            // No rescaling: the additive identity below compares raw,
            // un-normalized partial-likelihood buffers across independent
            // instances, which only line up before any rescale factor is
            // divided in.
            update_partials(handle, &[op], false).unwrap();

            let mut out = vec![0.0; 4];
            get_partials(handle, 0, &mut out).unwrap();
            finalize(handle).unwrap();
            out
        };

        let ambiguity_table = [1.0; 4]; // code 4 ("N") weighs every concrete state equally
        let ambiguous = run(4, Some(&ambiguity_table));

        let mut summed = vec![0.0; 4];
        for code in 0..4 {
            let concrete = run(code, None);
            for j in 0..4 {
                summed[j] += concrete[j];
            }
        }

        for j in 0..4 {
            assert!(
                (ambiguous[j] - summed[j]).abs() < 1e-9,
                "state {j}: ambiguous={} summed-concrete={}",
                ambiguous[j],
                summed[j]
            );
        }
    }

    #[test]
    fn edge_log_likelihood_matches_root_at_zero_length() {
        let (e, e_inv, lambda) = jc69_eigen();
        let handle = create_instance(1, 1, 1, 4, 1, 1, 1, 1, &[], Capabilities::empty()).unwrap();
        set_eigen_decomposition(handle, 0, &e, &e_inv, &lambda).unwrap();
        set_tip_states(handle, 0, &[2]).unwrap();
        set_partials(handle, 0, &[0.0, 0.0, 1.0, 0.0]).unwrap();
        update_transition_matrices(handle, 0, &[0], None, None, &[0.0]).unwrap();

        let mut root_out = [0.0; 1];
        calculate_root_log_likelihoods(handle, &[0], &[1.0], &[0.25, 0.25, 0.25, 0.25], &mut root_out)
            .unwrap();

        let mut edge_out = [0.0; 1];
        calculate_edge_log_likelihoods(
            handle,
            &[0],
            &[1], // compact tip buffer 0 -> source index partials_count(1) + 0
            &[0],
            None,
            None,
            &[1.0],
            &[0.25, 0.25, 0.25, 0.25],
            &mut edge_out,
            None,
            None,
        )
        .unwrap();

        assert!(
            (root_out[0] - edge_out[0]).abs() < 1e-12,
            "{} vs {}",
            root_out[0],
            edge_out[0]
        );
        finalize(handle).unwrap();
    }

    #[test]
    fn gamma_categories_average_to_full_likelihood() {
        let (e, e_inv, lambda) = jc69_eigen();
        let handle = create_instance(2, 1, 2, 4, 1, 1, 2, 4, &[], Capabilities::empty()).unwrap();
        set_eigen_decomposition(handle, 0, &e, &e_inv, &lambda).unwrap();
        set_category_rates(handle, &[0.2, 0.6, 1.2, 2.0]).unwrap();
        set_tip_states(handle, 0, &[0]).unwrap();
        set_tip_states(handle, 1, &[1]).unwrap();
        update_transition_matrices(handle, 0, &[0, 1], None, None, &[0.1, 0.1]).unwrap();

        let op = Operation {
            destination_partials: 0,
            destination_scaling: Some(0),
            source1: 1,
            source1_matrix: 0,
            source2: 2,
            source2_matrix: 1,
        };
        update_partials(handle, &[op], true).unwrap();

        let weights = [0.25, 0.25, 0.25, 0.25];
        let frequencies = [0.25, 0.25, 0.25, 0.25];
        let mut full_out = [0.0; 1];
        calculate_root_log_likelihoods(handle, &[0], &weights, &frequencies, &mut full_out).unwrap();

        let mut weighted_sum = 0.0;
        for c in 0..4 {
            let mut one_hot = [0.0; 4];
            one_hot[c] = 1.0;
            let mut per_category = [0.0; 1];
            calculate_root_log_likelihoods(handle, &[0], &one_hot, &frequencies, &mut per_category)
                .unwrap();
            weighted_sum += weights[c] * per_category[0].exp();
        }

        let full = full_out[0].exp();
        assert!(
            (full - weighted_sum).abs() < 1e-9 * full.max(1.0),
            "{full} vs {weighted_sum}"
        );
        finalize(handle).unwrap();
    }

    /// `state_count = 5` against the vectorized backend's width-4 lanes
    /// pads to `state_padded = 8`; this drives pruning and integration
    /// through that padded layout end to end rather than just checking the
    /// padding arithmetic in isolation.
    #[cfg(feature = "simd")]
    #[test]
    fn vectorized_backend_handles_non_aligned_state_count() {
        let state_count = 5;
        // Identity rate matrix: P(t) = E diag(exp(0)) E_inv = E E_inv = I
        // for every edge length, so the expected likelihood is computable
        // by hand without a closed-form substitution model at 5 states.
        let mut e = vec![0.0; state_count * state_count];
        for i in 0..state_count {
            e[i * state_count + i] = 1.0;
        }
        let e_inv = e.clone();
        let lambda = vec![0.0; state_count];

        let handle =
            create_instance(2, 1, 2, state_count, 1, 1, 2, 1, &[], Capabilities::empty()).unwrap();
        let details = initialize_instance(handle).unwrap();
        assert_eq!(details.resource_name, "CPU-vectorized");

        set_eigen_decomposition(handle, 0, &e, &e_inv, &lambda).unwrap();
        set_tip_states(handle, 0, &[0]).unwrap();
        set_tip_states(handle, 1, &[0]).unwrap();
        update_transition_matrices(handle, 0, &[0, 1], None, None, &[1.0, 1.0]).unwrap();

        let op = Operation {
            destination_partials: 0,
            destination_scaling: Some(0),
            source1: 1,
            source1_matrix: 0,
            source2: 2,
            source2_matrix: 1,
        };
        update_partials(handle, &[op], true).unwrap();

        let mut partials_out = vec![0.0; state_count];
        get_partials(handle, 0, &mut partials_out).unwrap();
        let mut expected_partials = vec![0.0; state_count];
        expected_partials[0] = 1.0;
        assert_eq!(partials_out, expected_partials);

        let frequencies = vec![1.0 / state_count as Real; state_count];
        let mut out = [0.0];
        calculate_root_log_likelihoods(handle, &[0], &[1.0], &frequencies, &mut out).unwrap();
        let expected = (1.0 / state_count as Real).ln();
        assert!((out[0] - expected).abs() < 1e-9, "{} vs {expected}", out[0]);
        finalize(handle).unwrap();
    }
}
