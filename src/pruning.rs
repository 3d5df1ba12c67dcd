use crate::arena::Arena;
use crate::backend::Backend;
use crate::dims::{Dimensions, SourceKind};
use crate::error::{EngineError, EngineResult};
use crate::Real;

/// One entry of an operation schedule: combine two child buffers, each
/// through its own transition matrix, into a parent partials buffer,
/// optionally accumulating a rescale factor.
#[derive(Debug, Clone, Copy)]
pub struct Operation {
    pub destination_partials: usize,
    /// `Some(index)` writes the destination's scale accumulator on this
    /// call (index must equal `destination_partials`); `None` leaves the
    /// accumulator at whatever it held before.
    pub destination_scaling: Option<usize>,
    pub source1: usize,
    pub source1_matrix: usize,
    pub source2: usize,
    pub source2_matrix: usize,
}

/// Executes `operations` in array order against `arena`. Index-out-of-range
/// faults are immediate and abort the schedule; numerical faults are
/// recorded and the schedule continues, with the worst fault returned at
/// the end.
pub(crate) fn update_partials(
    dims: &Dimensions,
    backend: &dyn Backend,
    arena: &mut Arena,
    operations: &[Operation],
    rescale: bool,
) -> EngineResult<()> {
    let mut worst: Option<EngineError> = None;
    for op in operations {
        match apply_operation(dims, backend, arena, op, rescale) {
            Ok(()) => {}
            Err(err @ EngineError::Numerical(_)) => {
                log::warn!("{err}");
                worst = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    match worst {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn resolve(dims: &Dimensions, index: usize, what: &'static str) -> EngineResult<SourceKind> {
    dims.source_kind(index).ok_or(EngineError::OutOfRange {
        what,
        index: index as i64,
        bound: dims.partials_count + dims.compact_count,
    })
}

fn apply_operation(
    dims: &Dimensions,
    backend: &dyn Backend,
    arena: &mut Arena,
    op: &Operation,
    rescale: bool,
) -> EngineResult<()> {
    if op.destination_partials >= dims.partials_count {
        return Err(EngineError::OutOfRange {
            what: "operation destination_partials",
            index: op.destination_partials as i64,
            bound: dims.partials_count,
        });
    }
    if let Some(idx) = op.destination_scaling {
        if idx != op.destination_partials {
            return Err(EngineError::OutOfRange {
                what: "operation destination_scaling must match destination_partials",
                index: idx as i64,
                bound: dims.partials_count,
            });
        }
    }
    let source1 = resolve(dims, op.source1, "operation source1")?;
    let source2 = resolve(dims, op.source2, "operation source2")?;

    let state_count = dims.state_count;
    let state_padded = dims.state_padded;
    let rate_count = dims.rate_count;
    let pattern_count = dims.pattern_count;

    let matrix1 = arena.matrices.get(op.source1_matrix)?.to_vec();
    let matrix2 = arena.matrices.get(op.source2_matrix)?.to_vec();

    let tip1 = match source1 {
        SourceKind::Compact(offset) => Some(arena.compact.get(offset)?.to_vec()),
        SourceKind::Partials(_) => None,
    };
    let tip2 = match source2 {
        SourceKind::Compact(offset) => Some(arena.compact.get(offset)?.to_vec()),
        SourceKind::Partials(_) => None,
    };
    let partials1 = match source1 {
        SourceKind::Partials(idx) => Some(arena.partials.get(idx)?.to_vec()),
        SourceKind::Compact(_) => None,
    };
    let partials2 = match source2 {
        SourceKind::Partials(idx) => Some(arena.partials.get(idx)?.to_vec()),
        SourceKind::Compact(_) => None,
    };

    let compact = &arena.compact;
    let per_pattern = backend.dispatch(pattern_count, &|p| {
        let mut row = vec![0.0; rate_count * state_padded];
        for c in 0..rate_count {
            let local_offset = c * state_padded;
            let poffset = p * rate_count * state_padded + local_offset;
            let moffset = c * state_padded * state_padded;
            for j in 0..state_count {
                let factor1 = factor(
                    compact,
                    &matrix1,
                    state_padded,
                    moffset,
                    j,
                    state_count,
                    tip1.as_deref().map(|t| t[p]),
                    partials1.as_deref().map(|buf| &buf[poffset..poffset + state_padded]),
                );
                let factor2 = factor(
                    compact,
                    &matrix2,
                    state_padded,
                    moffset,
                    j,
                    state_count,
                    tip2.as_deref().map(|t| t[p]),
                    partials2.as_deref().map(|buf| &buf[poffset..poffset + state_padded]),
                );
                row[local_offset + j] = factor1 * factor2;
            }
        }
        row
    });

    let mut result = vec![0.0; dims.partials_len()];
    let mut non_finite = false;
    for (p, row) in per_pattern.into_iter().enumerate() {
        let poffset = p * rate_count * state_padded;
        if row.iter().any(|v| !v.is_finite()) {
            non_finite = true;
        }
        result[poffset..poffset + rate_count * state_padded].copy_from_slice(&row);
    }

    if non_finite {
        return Err(EngineError::Numerical(format!(
            "pruning destination partials buffer {}",
            op.destination_partials
        )));
    }

    let mut own_log_scale = vec![0.0; pattern_count];
    if rescale {
        for p in 0..pattern_count {
            let scale = pattern_max(&result, dims, p);
            if scale > 0.0 {
                let offset = p * rate_count * state_padded;
                for value in result[offset..offset + rate_count * state_padded].iter_mut() {
                    *value /= scale;
                }
                own_log_scale[p] = scale.ln();
            }
        }
    }

    let source1_scale = scale_of(arena, source1, pattern_count)?;
    let source2_scale = scale_of(arena, source2, pattern_count)?;
    let mut new_accum = vec![0.0; pattern_count];
    for p in 0..pattern_count {
        new_accum[p] = source1_scale[p] + source2_scale[p] + own_log_scale[p];
    }

    arena.partials.get_mut(op.destination_partials)?.copy_from_slice(&result);
    if op.destination_scaling.is_some() {
        arena.scaling.replace(op.destination_partials, new_accum)?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn factor(
    compact: &crate::arena::CompactArena,
    matrix: &[Real],
    state_padded: usize,
    moffset: usize,
    row: usize,
    state_count: usize,
    tip_code: Option<i32>,
    partials: Option<&[Real]>,
) -> Real {
    let row_offset = moffset + row * state_padded;
    match (tip_code, partials) {
        (Some(code), None) => {
            if (code as usize) < state_count {
                matrix[row_offset + code as usize]
            } else {
                (0..state_count)
                    .map(|k| compact.weight(code, k) * matrix[row_offset + k])
                    .sum()
            }
        }
        (None, Some(values)) => (0..state_count).map(|k| matrix[row_offset + k] * values[k]).sum(),
        _ => unreachable!("exactly one of tip_code/partials is set"),
    }
}

fn scale_of(arena: &Arena, source: SourceKind, pattern_count: usize) -> EngineResult<Vec<Real>> {
    match source {
        SourceKind::Compact(_) => Ok(vec![0.0; pattern_count]),
        SourceKind::Partials(idx) => Ok(arena.scaling.get(idx)?.to_vec()),
    }
}

/// `scale[p] = max over (c,j) of partials[d][p,c,j]`.
fn pattern_max(result: &[Real], dims: &Dimensions, p: usize) -> Real {
    let mut max = 0.0_f64;
    for c in 0..dims.rate_count {
        let offset = p * dims.rate_count * dims.state_padded + c * dims.state_padded;
        for j in 0..dims.state_count {
            let v = result[offset + j];
            if v > max {
                max = v;
            }
        }
    }
    max
}
