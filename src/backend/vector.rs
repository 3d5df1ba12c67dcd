use super::{Backend, BackendFactory};
use crate::resource::Capabilities;
use rayon::prelude::*;

/// Vectorized CPU backend: shards pattern-level work across a rayon thread
/// pool, sharding over alignment patterns rather than clustering points.
pub(crate) struct VectorBackend {
    width: usize,
}

impl Backend for VectorBackend {
    fn name(&self) -> &'static str {
        "CPU-vectorized"
    }

    fn vector_width(&self) -> usize {
        self.width
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::SCALAR
            | Capabilities::VECTORIZED
            | Capabilities::DERIVATIVES
            | Capabilities::RESCALING
    }

    fn dispatch(
        &self,
        pattern_count: usize,
        f: &(dyn Fn(usize) -> Vec<crate::Real> + Sync),
    ) -> Vec<Vec<crate::Real>> {
        (0..pattern_count).into_par_iter().map(f).collect()
    }
}

pub(crate) struct VectorFactory;

impl BackendFactory for VectorFactory {
    fn name(&self) -> &'static str {
        "CPU-vectorized"
    }

    fn resource_id(&self) -> usize {
        1
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::SCALAR
            | Capabilities::VECTORIZED
            | Capabilities::DERIVATIVES
            | Capabilities::RESCALING
    }

    fn create(
        &self,
        state_count: usize,
        resource_list: &[usize],
        requirement_flags: Capabilities,
    ) -> Option<Box<dyn Backend>> {
        if !resource_list.is_empty() && !resource_list.contains(&1) {
            return None;
        }
        if !self.capabilities().contains(requirement_flags) {
            return None;
        }
        // Padding to a wide vector width is wasted work on tiny state
        // counts; decline so the scalar factory handles them instead.
        if state_count < 4 {
            return None;
        }
        Some(Box::new(VectorBackend { width: 4 }))
    }
}
