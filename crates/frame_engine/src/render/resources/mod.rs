//! GPU memory resources: aligned layouts, uniform arenas and scoped buffers

pub mod arena;
pub mod buffer;
pub mod layout;

pub use arena::UniformArena;
pub use buffer::DeviceBuffer;
pub use layout::{aligned_stride, AlignedLayout};
