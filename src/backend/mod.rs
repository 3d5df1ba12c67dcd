mod scalar;
#[cfg(feature = "simd")]
mod vector;

use crate::resource::Capabilities;

/// A constructed compute backend bound to one resource.
pub(crate) trait Backend: Send {
    fn name(&self) -> &'static str;
    fn vector_width(&self) -> usize;
    fn capabilities(&self) -> Capabilities;
    /// Evaluates `f` once per pattern index in `[0, pattern_count)` and
    /// collects the per-pattern results in index order. Scalar backends run
    /// serially; the `simd` backend shards the range across a rayon thread
    /// pool. `f` must be pure in the pattern index — no cross-pattern
    /// ordering side effects are guaranteed.
    fn dispatch(
        &self,
        pattern_count: usize,
        f: &(dyn Fn(usize) -> Vec<crate::Real> + Sync),
    ) -> Vec<Vec<crate::Real>>;
}

/// A factory tried, in order, by the registry on `create_instance`.
pub(crate) trait BackendFactory: Send + Sync {
    fn name(&self) -> &'static str;
    fn resource_id(&self) -> usize;
    fn capabilities(&self) -> Capabilities;
    /// Returns `None` (declines) if this factory cannot serve the request:
    /// a pinned `resource_list` that excludes this factory's resource, a
    /// `requirement_flags` bit this factory can't satisfy, or an
    /// unsupported state count.
    fn create(
        &self,
        state_count: usize,
        resource_list: &[usize],
        requirement_flags: Capabilities,
    ) -> Option<Box<dyn Backend>>;
}

/// Default factory chain: accelerators first, then vectorized CPU, then
/// scalar CPU last. No accelerator factory ships in-tree.
pub(crate) fn default_factory_chain() -> Vec<Box<dyn BackendFactory>> {
    let mut chain: Vec<Box<dyn BackendFactory>> = Vec::new();
    #[cfg(feature = "simd")]
    chain.push(Box::new(vector::VectorFactory));
    chain.push(Box::new(scalar::ScalarFactory));
    chain
}
