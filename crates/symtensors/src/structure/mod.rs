//! Structure registry: block keys, block layouts and leg descriptors.

mod block;
mod leg;
mod registry;

pub use block::BlockKey;
pub use leg::Leg;
pub(crate) use leg::merge_tables;
pub use registry::Structure;
