//! Per-frame GPU resource management
//!
//! Uniform data for N frames in flight lives in two persistently mapped
//! arenas (pass and object constants). A [`FrameSlotRotator`] hands out the
//! slot the CPU may write this tick, the [`ObjectTable`] propagates changed
//! transforms into every slot, and the [`DrawBinder`] points each draw at
//! the right byte range through dynamic offsets.
//!
//! [`FrameResources`] bundles all of it behind four calls:
//! `on_frame_begin`, `update_object_transform`, `update_pass_constants` and
//! `record_draws`.

pub mod backend;
pub mod backends;
pub mod binder;
pub mod error;
pub mod frame;
pub mod frame_resources;
pub mod resources;
pub mod scene;

pub use backend::{
    BufferUsage, DeviceError, DeviceLimits, DeviceResult, DrawRecorder, GraphicsDevice, IndexFormat, UniformSlot,
};
pub use binder::{DrawBinder, DrawStats, UniformRange};
pub use error::{ErrorKind, FrameResourceError, FrameResult};
pub use frame::{FrameContext, FrameSlotRotator, OrbitCamera, PassConstants, PassParameters};
pub use frame_resources::{FrameResources, FrameStats};
pub use resources::{AlignedLayout, DeviceBuffer, UniformArena};
pub use scene::{
    DirtyState, GeometryLayout, MeshGeometry, MeshHandle, ObjectConstants, ObjectTable, RenderItem, SubmeshGeometry,
};
