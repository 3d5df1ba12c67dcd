use crate::dims::Dimensions;
use crate::error::{EngineError, EngineResult};
use crate::Real;

/// Pool of `M` transition-matrix buffers, each a dense
/// `rate * state_padded * state_padded` array, row `j` (destination/parent
/// state), column `k` (source/child state) per category.
pub(crate) struct MatrixArena {
    buffers: Vec<Vec<Real>>,
    rate_count: usize,
    state_padded: usize,
}

impl MatrixArena {
    pub fn new(dims: &Dimensions) -> Self {
        Self {
            buffers: (0..dims.matrix_count)
                .map(|_| vec![0.0; dims.matrix_len()])
                .collect(),
            rate_count: dims.rate_count,
            state_padded: dims.state_padded,
        }
    }

    fn check(&self, index: usize) -> EngineResult<()> {
        if index >= self.buffers.len() {
            return Err(EngineError::OutOfRange {
                what: "matrix buffer index",
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

    pub fn set(&mut self, index: usize, values: &[Real]) -> EngineResult<()> {
        self.check(index)?;
        if values.len() != self.matrix_len() {
            return Err(EngineError::OutOfRange {
                what: "transition matrix input length",
                index: values.len() as i64,
                bound: self.matrix_len(),
            });
        }
        self.buffers[index].copy_from_slice(values);
        Ok(())
    }

    pub fn matrix_len(&self) -> usize {
        self.rate_count * self.state_padded * self.state_padded
    }

    pub fn category_offset(&self, category: usize) -> usize {
        category * self.state_padded * self.state_padded
    }

    pub fn state_padded(&self) -> usize {
        self.state_padded
    }

    /// `M[category][row][col]` for a buffer already fetched with [`get`](Self::get).
    pub fn entry(buffer: &[Real], state_padded: usize, category_offset: usize, row: usize, col: usize) -> Real {
        buffer[category_offset + row * state_padded + col]
    }
}
