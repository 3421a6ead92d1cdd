//! Leg fusion: meta-fusion trees, hard-fusion descriptors and layouts, and
//! the machinery that reshapes blocks into matrices and aligns fused legs
//! whose sector tables differ.

pub(crate) mod hard;
pub(crate) mod mask;
pub(crate) mod merge;
mod tree;

pub use hard::{FusedLeg, FusedSector, FusionCombo, HardFusion, SectorTable};
pub(crate) use mask::union_hard_fusion;
pub use tree::FusionTree;
pub(crate) use tree::{native_axes, native_ranges};
