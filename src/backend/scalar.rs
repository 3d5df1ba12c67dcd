use super::{Backend, BackendFactory};
use crate::resource::Capabilities;

/// Scalar CPU backend. Always accepts; never declines.
pub(crate) struct ScalarBackend;

impl Backend for ScalarBackend {
    fn name(&self) -> &'static str {
        "CPU"
    }

    fn vector_width(&self) -> usize {
        1
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::SCALAR | Capabilities::DERIVATIVES | Capabilities::RESCALING
    }

    fn dispatch(
        &self,
        pattern_count: usize,
        f: &(dyn Fn(usize) -> Vec<crate::Real> + Sync),
    ) -> Vec<Vec<crate::Real>> {
        (0..pattern_count).map(f).collect()
    }
}

pub(crate) struct ScalarFactory;

impl BackendFactory for ScalarFactory {
    fn name(&self) -> &'static str {
        "CPU"
    }

    fn resource_id(&self) -> usize {
        0
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::SCALAR | Capabilities::DERIVATIVES | Capabilities::RESCALING
    }

    fn create(
        &self,
        _state_count: usize,
        resource_list: &[usize],
        requirement_flags: Capabilities,
    ) -> Option<Box<dyn Backend>> {
        if !resource_list.is_empty() && !resource_list.contains(&0) {
            return None;
        }
        if !self.capabilities().contains(requirement_flags) {
            return None;
        }
        Some(Box::new(ScalarBackend))
    }
}
