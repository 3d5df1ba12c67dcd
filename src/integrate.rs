use crate::arena::{Arena, CompactArena};
use crate::dims::{Dimensions, SourceKind};
use crate::error::{EngineError, EngineResult};
use crate::Real;

/// Combines root (or edge-rooted) partials with category weights and
/// stationary frequencies into per-pattern log-likelihoods.
pub(crate) fn calculate_root_log_likelihoods(
    dims: &Dimensions,
    arena: &Arena,
    buffer_indices: &[usize],
    weights: &[Real],
    state_frequencies: &[Real],
    out: &mut [Real],
) -> EngineResult<()> {
    let count = buffer_indices.len();
    expect_len("weights", weights.len(), count * dims.rate_count)?;
    expect_len(
        "state_frequencies",
        state_frequencies.len(),
        count * dims.state_count,
    )?;
    expect_len("out", out.len(), count * dims.pattern_count)?;

    for (g, &buffer) in buffer_indices.iter().enumerate() {
        if buffer >= dims.partials_count {
            return Err(EngineError::OutOfRange {
                what: "root buffer index",
                index: buffer as i64,
                bound: dims.partials_count,
            });
        }
        let partials = arena.partials.get(buffer)?;
        let scale = arena.scaling.get(buffer)?;
        let w = &weights[g * dims.rate_count..(g + 1) * dims.rate_count];
        let pi = &state_frequencies[g * dims.state_count..(g + 1) * dims.state_count];

        for p in 0..dims.pattern_count {
            let mut l = 0.0;
            for c in 0..dims.rate_count {
                let offset = p * dims.rate_count * dims.state_padded + c * dims.state_padded;
                let mut inner = 0.0;
                for j in 0..dims.state_count {
                    inner += pi[j] * partials[offset + j];
                }
                l += w[c] * inner;
            }
            out[g * dims.pattern_count + p] = if l <= 0.0 {
                Real::NEG_INFINITY
            } else {
                l.ln() + scale[p]
            };
        }
    }
    Ok(())
}

/// Computes edge log-likelihoods and, optionally, first/second derivatives
/// w.r.t. edge length, from a parent partials buffer, a child buffer (tip
/// or partials), and the transition matrix (and its derivatives) across
/// that edge.
#[allow(clippy::too_many_arguments)]
pub(crate) fn calculate_edge_log_likelihoods(
    dims: &Dimensions,
    arena: &Arena,
    parent: &[usize],
    child: &[usize],
    prob_idx: &[usize],
    first_deriv_idx: Option<&[usize]>,
    second_deriv_idx: Option<&[usize]>,
    weights: &[Real],
    frequencies: &[Real],
    out: &mut [Real],
    mut out_d1: Option<&mut [Real]>,
    mut out_d2: Option<&mut [Real]>,
) -> EngineResult<()> {
    let count = parent.len();
    expect_len("child", child.len(), count)?;
    expect_len("prob_idx", prob_idx.len(), count)?;
    expect_len("weights", weights.len(), count * dims.rate_count)?;
    expect_len("frequencies", frequencies.len(), count * dims.state_count)?;
    expect_len("out", out.len(), count * dims.pattern_count)?;

    let want_derivatives = first_deriv_idx.is_some() && second_deriv_idx.is_some();
    if want_derivatives {
        if let Some(ref d1) = out_d1 {
            expect_len("out_d1", d1.len(), count * dims.pattern_count)?;
        }
        if let Some(ref d2) = out_d2 {
            expect_len("out_d2", d2.len(), count * dims.pattern_count)?;
        }
    }

    for e in 0..count {
        if parent[e] >= dims.partials_count {
            return Err(EngineError::OutOfRange {
                what: "edge parent buffer index",
                index: parent[e] as i64,
                bound: dims.partials_count,
            });
        }
        let child_kind = dims
            .source_kind(child[e])
            .ok_or(EngineError::OutOfRange {
                what: "edge child buffer index",
                index: child[e] as i64,
                bound: dims.partials_count + dims.compact_count,
            })?;

        let parent_partials = arena.partials.get(parent[e])?.to_vec();
        let parent_scale = arena.scaling.get(parent[e])?.to_vec();
        let (child_tip, child_partials, child_scale) = match child_kind {
            SourceKind::Compact(offset) => (
                Some(arena.compact.get(offset)?.to_vec()),
                None,
                vec![0.0; dims.pattern_count],
            ),
            SourceKind::Partials(idx) => (
                None,
                Some(arena.partials.get(idx)?.to_vec()),
                arena.scaling.get(idx)?.to_vec(),
            ),
        };

        let matrix = arena.matrices.get(prob_idx[e])?.to_vec();
        let d1_matrix = first_deriv_idx
            .map(|idx| arena.matrices.get(idx[e]))
            .transpose()?
            .map(|m| m.to_vec());
        let d2_matrix = second_deriv_idx
            .map(|idx| arena.matrices.get(idx[e]))
            .transpose()?
            .map(|m| m.to_vec());

        let w = &weights[e * dims.rate_count..(e + 1) * dims.rate_count];
        let pi = &frequencies[e * dims.state_count..(e + 1) * dims.state_count];

        for p in 0..dims.pattern_count {
            let (l, l1, l2) = edge_sums(
                dims,
                &arena.compact,
                &parent_partials,
                child_tip.as_deref().map(|t| t[p]),
                child_partials.as_deref(),
                &matrix,
                d1_matrix.as_deref(),
                d2_matrix.as_deref(),
                w,
                pi,
                p,
            );
            let total_scale = parent_scale[p] + child_scale[p];
            out[e * dims.pattern_count + p] = if l <= 0.0 {
                Real::NEG_INFINITY
            } else {
                l.ln() + total_scale
            };
            if let Some(ref mut d1_out) = out_d1 {
                d1_out[e * dims.pattern_count + p] = if l <= 0.0 { Real::NAN } else { l1 / l };
            }
            if let Some(ref mut d2_out) = out_d2 {
                d2_out[e * dims.pattern_count + p] = if l <= 0.0 {
                    Real::NAN
                } else {
                    l2 / l - (l1 / l).powi(2)
                };
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn edge_sums(
    dims: &Dimensions,
    compact: &CompactArena,
    parent_partials: &[Real],
    child_tip: Option<i32>,
    child_partials: Option<&[Real]>,
    matrix: &[Real],
    d1_matrix: Option<&[Real]>,
    d2_matrix: Option<&[Real]>,
    weights: &[Real],
    frequencies: &[Real],
    p: usize,
) -> (Real, Real, Real) {
    let mut l = 0.0;
    let mut l1 = 0.0;
    let mut l2 = 0.0;
    for c in 0..dims.rate_count {
        let offset = p * dims.rate_count * dims.state_padded + c * dims.state_padded;
        let moffset = c * dims.state_padded * dims.state_padded;
        let mut inner = 0.0;
        let mut inner_d1 = 0.0;
        let mut inner_d2 = 0.0;
        for j in 0..dims.state_count {
            let parent_value = parent_partials[offset + j];
            let row = moffset + j * dims.state_padded;
            let child_through = |m: &[Real]| -> Real {
                match (child_tip, child_partials) {
                    (Some(code), None) => {
                        if (code as usize) < dims.state_count {
                            m[row + code as usize]
                        } else {
                            (0..dims.state_count)
                                .map(|k| compact.weight(code, k) * m[row + k])
                                .sum()
                        }
                    }
                    (None, Some(values)) => (0..dims.state_count)
                        .map(|k| m[row + k] * values[offset + k])
                        .sum(),
                    _ => unreachable!("exactly one of child_tip/child_partials is set"),
                }
            };
            inner += frequencies[j] * parent_value * child_through(matrix);
            if let Some(d1) = d1_matrix {
                inner_d1 += frequencies[j] * parent_value * child_through(d1);
            }
            if let Some(d2) = d2_matrix {
                inner_d2 += frequencies[j] * parent_value * child_through(d2);
            }
        }
        l += weights[c] * inner;
        l1 += weights[c] * inner_d1;
        l2 += weights[c] * inner_d2;
    }
    (l, l1, l2)
}

fn expect_len(what: &'static str, got: usize, want: usize) -> EngineResult<()> {
    if got != want {
        return Err(EngineError::OutOfRange {
            what,
            index: got as i64,
            bound: want,
        });
    }
    Ok(())
}
