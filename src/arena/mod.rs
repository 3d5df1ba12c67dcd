mod compact;
mod eigen;
mod matrices;
mod partials;

pub(crate) use compact::CompactArena;
pub(crate) use eigen::{EigenArena, EigenDecomposition};
pub(crate) use matrices::MatrixArena;
pub(crate) use partials::{PartialsArena, ScalingArena};

use crate::dims::Dimensions;

/// Per-instance collection of typed buffer pools, one-shot allocated at
/// instance creation.
pub(crate) struct Arena {
    pub partials: PartialsArena,
    pub scaling: ScalingArena,
    pub compact: CompactArena,
    pub matrices: MatrixArena,
    pub eigen: EigenArena,
}

impl Arena {
    pub fn new(dims: &Dimensions) -> Self {
        Self {
            partials: PartialsArena::new(dims),
            scaling: ScalingArena::new(dims),
            compact: CompactArena::new(dims),
            matrices: MatrixArena::new(dims),
            eigen: EigenArena::new(dims),
        }
    }
}
