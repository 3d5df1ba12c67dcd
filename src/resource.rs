bitflags::bitflags! {
    /// Capability bits advertised by a backend factory and requested by a
    /// client as `preferenceFlags`/`requirementFlags`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        /// Scalar double-precision evaluation, always available.
        const SCALAR        = 0b0000_0001;
        /// Data-parallel evaluation across patterns (the `simd` feature).
        const VECTORIZED    = 0b0000_0010;
        /// First/second derivative support in the transition-matrix builder
        /// and edge-likelihood integrator.
        const DERIVATIVES   = 0b0000_0100;
        /// Dynamic rescaling support.
        const RESCALING     = 0b0000_1000;
        /// Accelerator device (never set by an in-tree factory).
        const ACCELERATOR   = 0b0001_0000;
    }
}

/// One compute resource a backend factory can bind to.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: usize,
    pub name: &'static str,
    pub description: &'static str,
    pub flags: Capabilities,
    pub memory_bytes: Option<u64>,
}

/// Enumerates the resources the in-tree backend factories can bind to.
/// Resource 0 (scalar CPU) is always present; resource 1 (vectorized CPU)
/// is present only when the `simd` feature is enabled.
pub fn resource_list() -> Vec<Resource> {
    let mut resources = vec![Resource {
        id: 0,
        name: "CPU",
        description: "scalar double-precision CPU backend",
        flags: Capabilities::SCALAR | Capabilities::DERIVATIVES | Capabilities::RESCALING,
        memory_bytes: None,
    }];
    #[cfg(feature = "simd")]
    resources.push(Resource {
        id: 1,
        name: "CPU-vectorized",
        description: "data-parallel CPU backend (pattern-sharded via rayon)",
        flags: Capabilities::SCALAR
            | Capabilities::VECTORIZED
            | Capabilities::DERIVATIVES
            | Capabilities::RESCALING,
        memory_bytes: None,
    });
    resources
}
