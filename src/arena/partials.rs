use crate::dims::Dimensions;
use crate::error::{EngineError, EngineResult};
use crate::Real;

/// Pool of `P` partial-likelihood buffers, each a dense
/// `pattern * rate * state_padded` array.
pub(crate) struct PartialsArena {
    buffers: Vec<Vec<Real>>,
    pattern_count: usize,
    rate_count: usize,
    state_count: usize,
    state_padded: usize,
}

impl PartialsArena {
    pub fn new(dims: &Dimensions) -> Self {
        Self {
            buffers: (0..dims.partials_count)
                .map(|_| vec![0.0; dims.partials_len()])
                .collect(),
            pattern_count: dims.pattern_count,
            rate_count: dims.rate_count,
            state_count: dims.state_count,
            state_padded: dims.state_padded,
        }
    }

    fn check(&self, index: usize) -> EngineResult<()> {
        if index >= self.buffers.len() {
            return Err(EngineError::OutOfRange {
                what: "partials buffer index",
                index: index as i64,
                bound: self.buffers.len(),
            });
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> EngineResult<&[Real]> {
        self.check(index)?;
        Ok(&self.buffers[index])
    }

    pub fn get_mut(&mut self, index: usize) -> EngineResult<&mut [Real]> {
        self.check(index)?;
        Ok(&mut self.buffers[index])
    }

    pub fn offset(&self, pattern: usize, category: usize) -> usize {
        pattern * self.rate_count * self.state_padded + category * self.state_padded
    }

    pub fn state_count(&self) -> usize {
        self.state_count
    }

    pub fn state_padded(&self) -> usize {
        self.state_padded
    }

    pub fn rate_count(&self) -> usize {
        self.rate_count
    }

    /// Writes `values` into slot `index`. Accepts either `K*R*S` values
    /// directly, or `K*S` values replicated across all `R` categories, per
    /// the instance's fixed expansion policy.
    pub fn set(&mut self, index: usize, values: &[Real], expand: bool) -> EngineResult<()> {
        self.check(index)?;
        let pattern_count = self.pattern_count;
        let rate_count = self.rate_count;
        let state_count = self.state_count;
        let state_padded = self.state_padded;
        let expected_full = pattern_count * rate_count * state_count;
        let expected_compact = pattern_count * state_count;
        let buffer = &mut self.buffers[index];
        if values.len() == expected_full {
            for p in 0..pattern_count {
                for c in 0..rate_count {
                    let src = (p * rate_count + c) * state_count;
                    let dst = p * rate_count * state_padded + c * state_padded;
                    buffer[dst..dst + state_count].copy_from_slice(&values[src..src + state_count]);
                }
            }
        } else if expand && values.len() == expected_compact {
            for p in 0..pattern_count {
                let src = p * state_count;
                for c in 0..rate_count {
                    let dst = p * rate_count * state_padded + c * state_padded;
                    buffer[dst..dst + state_count].copy_from_slice(&values[src..src + state_count]);
                }
            }
        } else {
            return Err(EngineError::OutOfRange {
                what: "partials input length",
                index: values.len() as i64,
                bound: expected_full,
            });
        }
        Ok(())
    }

    pub fn get_into(&self, index: usize, out: &mut [Real]) -> EngineResult<()> {
        self.check(index)?;
        let pattern_count = self.pattern_count;
        let rate_count = self.rate_count;
        let state_count = self.state_count;
        let state_padded = self.state_padded;
        let expected = pattern_count * rate_count * state_count;
        if out.len() != expected {
            return Err(EngineError::OutOfRange {
                what: "partials output length",
                index: out.len() as i64,
                bound: expected,
            });
        }
        let buffer = &self.buffers[index];
        for p in 0..pattern_count {
            for c in 0..rate_count {
                let src = p * rate_count * state_padded + c * state_padded;
                let dst = (p * rate_count + c) * state_count;
                out[dst..dst + state_count].copy_from_slice(&buffer[src..src + state_count]);
            }
        }
        Ok(())
    }
}

/// Per-partials-buffer log-scale accumulator: one length-`K` vector per
/// partials buffer, summed from the two source accumulators plus the
/// writing operation's own log-scale vector.
pub(crate) struct ScalingArena {
    accumulators: Vec<Vec<Real>>,
}

impl ScalingArena {
    pub fn new(dims: &Dimensions) -> Self {
        Self {
            accumulators: (0..dims.partials_count)
                .map(|_| vec![0.0; dims.pattern_count])
                .collect(),
        }
    }

    fn check(&self, index: usize) -> EngineResult<()> {
        if index >= self.accumulators.len() {
            return Err(EngineError::OutOfRange {
                what: "scaling buffer index",
                index: index as i64,
                bound: self.accumulators.len(),
            });
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> EngineResult<&[Real]> {
        self.check(index)?;
        Ok(&self.accumulators[index])
    }

    pub fn replace(&mut self, index: usize, values: Vec<Real>) -> EngineResult<()> {
        self.check(index)?;
        self.accumulators[index] = values;
        Ok(())
    }
}
