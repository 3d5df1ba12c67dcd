use crate::arena::{EigenArena, MatrixArena};
use crate::error::{EngineError, EngineResult};
use crate::Real;

/// Batch-exponentiates one eigendecomposition into transition matrices (and
/// optionally their first/second derivatives w.r.t. edge length) for a set
/// of edges and rate categories.
#[allow(clippy::too_many_arguments)]
pub(crate) fn update_transition_matrices(
    eigen: &EigenArena,
    matrices: &mut MatrixArena,
    category_rates: &[Real],
    eigen_index: usize,
    probability_indices: &[usize],
    first_derivative_indices: Option<&[usize]>,
    second_derivative_indices: Option<&[usize]>,
    edge_lengths: &[Real],
) -> EngineResult<()> {
    if probability_indices.len() != edge_lengths.len() {
        return Err(EngineError::OutOfRange {
            what: "probability_indices/edge_lengths length mismatch",
            index: probability_indices.len() as i64,
            bound: edge_lengths.len(),
        });
    }
    if let Some(d1) = first_derivative_indices {
        if d1.len() != edge_lengths.len() {
            return Err(EngineError::OutOfRange {
                what: "first_derivative_indices length mismatch",
                index: d1.len() as i64,
                bound: edge_lengths.len(),
            });
        }
    }
    if let Some(d2) = second_derivative_indices {
        if d2.len() != edge_lengths.len() {
            return Err(EngineError::OutOfRange {
                what: "second_derivative_indices length mismatch",
                index: d2.len() as i64,
                bound: edge_lengths.len(),
            });
        }
    }

    let decomposition = eigen.get(eigen_index)?;
    let state_count = decomposition.lambda.len();
    let state_padded = matrices.state_padded();
    let rate_count = category_rates.len();

    let mut worst: Option<EngineError> = None;

    for i in 0..edge_lengths.len() {
        let t = edge_lengths[i];
        for c in 0..rate_count {
            let r = category_rates[c];
            let result = write_category(
                decomposition,
                state_count,
                state_padded,
                t,
                r,
            );
            match result {
                Ok((p, d1, d2)) => {
                    write_matrix(matrices, probability_indices[i], c, &p)?;
                    if let Some(idx) = first_derivative_indices {
                        write_matrix(matrices, idx[i], c, &d1)?;
                    }
                    if let Some(idx) = second_derivative_indices {
                        write_matrix(matrices, idx[i], c, &d2)?;
                    }
                }
                Err(err) => {
                    log::warn!("{err}");
                    worst = Some(err);
                }
            }
        }
    }

    match worst {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

type CategoryMatrices = (Vec<Real>, Vec<Real>, Vec<Real>);

fn write_category(
    decomposition: &crate::arena::EigenDecomposition,
    state_count: usize,
    state_padded: usize,
    t: Real,
    r: Real,
) -> EngineResult<CategoryMatrices> {
    let mut p = vec![0.0; state_padded * state_padded];
    let mut d1 = vec![0.0; state_padded * state_padded];
    let mut d2 = vec![0.0; state_padded * state_padded];

    for j in 0..state_padded {
        for k in 0..state_padded {
            let idx = j * state_padded + k;
            if j >= state_count || k >= state_count {
                p[idx] = if j == k { 1.0 } else { 0.0 };
                continue;
            }
            let mut sum_p = 0.0;
            let mut sum_d1 = 0.0;
            let mut sum_d2 = 0.0;
            for s in 0..state_count {
                let lambda_s = decomposition.lambda[s];
                let rate = lambda_s * r;
                let exponent = rate * t;
                let factor = exponent.exp();
                let e_js = decomposition.e[j * state_count + s];
                let einv_sk = decomposition.e_inv[s * state_count + k];
                sum_p += e_js * factor * einv_sk;
                sum_d1 += e_js * rate * factor * einv_sk;
                sum_d2 += e_js * rate * rate * factor * einv_sk;
            }
            if !sum_p.is_finite() || !sum_d1.is_finite() || !sum_d2.is_finite() {
                return Err(EngineError::Numerical(format!(
                    "exponentiating transition matrix at t={t}, rate={r}"
                )));
            }
            p[idx] = sum_p;
            d1[idx] = sum_d1;
            d2[idx] = sum_d2;
        }
    }

    Ok((p, d1, d2))
}

fn write_matrix(
    matrices: &mut MatrixArena,
    buffer_index: usize,
    category: usize,
    values: &[Real],
) -> EngineResult<()> {
    let offset = matrices.category_offset(category);
    let len = values.len();
    let buffer = matrices.get_mut(buffer_index)?;
    buffer[offset..offset + len].copy_from_slice(values);
    Ok(())
}
