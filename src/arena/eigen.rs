use crate::dims::Dimensions;
use crate::error::{EngineError, EngineResult};
use crate::Real;

/// One eigendecomposition triple `(E, E^-1, lambda)` for a substitution
/// model; `E`/`E^-1` are `state_count * state_count`, `lambda` is
/// `state_count` long.
#[derive(Clone)]
pub(crate) struct EigenDecomposition {
    pub e: Vec<Real>,
    pub e_inv: Vec<Real>,
    pub lambda: Vec<Real>,
}

/// Pool of `E` eigendecomposition slots.
pub(crate) struct EigenArena {
    slots: Vec<Option<EigenDecomposition>>,
    state_count: usize,
}

impl EigenArena {
    pub fn new(dims: &Dimensions) -> Self {
        Self {
            slots: vec![None; dims.eigen_count],
            state_count: dims.state_count,
        }
    }

    fn check(&self, index: usize) -> EngineResult<()> {
        if index >= self.slots.len() {
            return Err(EngineError::OutOfRange {
                what: "eigendecomposition index",
                index: index as i64,
                bound: self.slots.len(),
            });
        }
        Ok(())
    }

    pub fn set(&mut self, index: usize, e: &[Real], e_inv: &[Real], lambda: &[Real]) -> EngineResult<()> {
        self.check(index)?;
        let s = self.state_count;
        if e.len() != s * s || e_inv.len() != s * s || lambda.len() != s {
            return Err(EngineError::OutOfRange {
                what: "eigendecomposition component length",
                index: e.len() as i64,
                bound: s * s,
            });
        }
        self.slots[index] = Some(EigenDecomposition {
            e: e.to_vec(),
            e_inv: e_inv.to_vec(),
            lambda: lambda.to_vec(),
        });
        Ok(())
    }

    pub fn get(&self, index: usize) -> EngineResult<&EigenDecomposition> {
        self.check(index)?;
        self.slots[index].as_ref().ok_or(EngineError::OutOfRange {
            what: "uninitialized eigendecomposition slot",
            index: index as i64,
            bound: self.slots.len(),
        })
    }
}
