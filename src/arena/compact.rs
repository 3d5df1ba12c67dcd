use crate::dims::Dimensions;
use crate::error::{EngineError, EngineResult};
use crate::Real;

/// Pool of `C` compact tip-state buffers, each a dense length-`K` array of
/// small state codes.
pub(crate) struct CompactArena {
    buffers: Vec<Vec<i32>>,
    pattern_count: usize,
    state_count: usize,
    /// Ambiguity-expansion table, `A * state_count` weights, row-major by
    /// ambiguity code. Row `s` for `s < state_count` is the implicit
    /// one-hot row; rows `s >= state_count` come from
    /// [`set_ambiguity_table`](Self::set_ambiguity_table).
    ambiguity_table: Vec<Real>,
    ambiguity_count: usize,
}

impl CompactArena {
    pub fn new(dims: &Dimensions) -> Self {
        Self {
            buffers: (0..dims.compact_count)
                .map(|_| vec![0; dims.pattern_count])
                .collect(),
            pattern_count: dims.pattern_count,
            state_count: dims.state_count,
            ambiguity_table: Vec::new(),
            ambiguity_count: dims.state_count,
        }
    }

    fn check(&self, index: usize) -> EngineResult<()> {
        if index >= self.buffers.len() {
            return Err(EngineError::OutOfRange {
                what: "compact buffer index",
                index: index as i64,
                bound: self.buffers.len(),
            });
        }
        Ok(())
    }

    pub fn set(&mut self, index: usize, states: &[i32]) -> EngineResult<()> {
        self.check(index)?;
        if states.len() != self.pattern_count {
            return Err(EngineError::OutOfRange {
                what: "tip state input length",
                index: states.len() as i64,
                bound: self.pattern_count,
            });
        }
        for &code in states {
            if code < 0 || code as usize >= self.ambiguity_count {
                return Err(EngineError::OutOfRange {
                    what: "tip state code",
                    index: code as i64,
                    bound: self.ambiguity_count,
                });
            }
        }
        self.buffers[index] = states.to_vec();
        Ok(())
    }

    pub fn get(&self, index: usize) -> EngineResult<&[i32]> {
        self.check(index)?;
        Ok(&self.buffers[index])
    }

    /// Installs the ambiguity-code expansion table; `table.len()` must be a
    /// multiple of `state_count`, and rows beyond `state_count` are the
    /// ambiguity classes. Extends `ambiguity_count` accordingly.
    pub fn set_ambiguity_table(&mut self, table: &[Real]) -> EngineResult<()> {
        if self.state_count == 0 || table.len() % self.state_count != 0 {
            return Err(EngineError::OutOfRange {
                what: "ambiguity table length",
                index: table.len() as i64,
                bound: self.state_count,
            });
        }
        self.ambiguity_count = self.state_count + table.len() / self.state_count;
        self.ambiguity_table = table.to_vec();
        Ok(())
    }

    /// Weight of `code` over concrete state `state`: a one-hot for a
    /// concrete code, or the installed ambiguity row otherwise.
    pub fn weight(&self, code: i32, state: usize) -> Real {
        let code = code as usize;
        if code < self.state_count {
            if code == state {
                1.0
            } else {
                0.0
            }
        } else {
            let row = (code - self.state_count) * self.state_count;
            self.ambiguity_table
                .get(row + state)
                .copied()
                .unwrap_or(0.0)
        }
    }

    pub fn ambiguity_count(&self) -> usize {
        self.ambiguity_count
    }
}
