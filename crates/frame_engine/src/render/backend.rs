//! Device-facing contracts consumed by the frame resource core
//!
//! The core never talks to a graphics API directly. Buffers are allocated,
//! mapped and released through [`GraphicsDevice`]; binding and draw commands
//! go through [`DrawRecorder`]. Implementations live under
//! [`crate::render::backends`].

use std::fmt::Debug;
use std::ptr::NonNull;

use ash::vk;
use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// How a buffer will be consumed by the device
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Read through uniform (constant) buffer bindings
        const UNIFORM = 1;
        /// Bound as a vertex buffer
        const VERTEX = 1 << 1;
        /// Bound as an index buffer
        const INDEX = 1 << 2;
        /// Source of copy operations
        const TRANSFER_SRC = 1 << 3;
    }
}

/// Device errors
#[derive(Error, Debug)]
pub enum DeviceError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Vulkan(vk::Result),

    /// Memory allocation failed
    #[error("Out of device memory: {requested} bytes requested")]
    OutOfMemory {
        /// Number of bytes that were requested
        requested: u64,
    },

    /// No host-visible, host-coherent memory type matched the buffer
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// The handle does not name a live buffer on this device
    #[error("Unknown buffer handle")]
    UnknownBuffer,

    /// The buffer is already mapped
    #[error("Buffer is already mapped")]
    AlreadyMapped,

    /// A dynamic offset does not fit the API's 32-bit offset type
    #[error("Dynamic offset {offset} exceeds the 32-bit offset range")]
    OffsetOverflow {
        /// The rejected offset
        offset: u64,
    },
}

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Hardware limits the core needs for sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Required alignment of dynamic uniform offsets, 0 when unconstrained
    pub min_uniform_buffer_offset_alignment: u64,
}

/// Index element width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// 16-bit indices
    U16,
    /// 32-bit indices
    U32,
}

impl IndexFormat {
    /// Size of one index in bytes
    pub const fn size_bytes(self) -> u64 {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

/// Uniform binding slots used by the shapes pipeline
///
/// Each slot is its own descriptor set holding a single dynamic uniform
/// buffer, so a draw only has to supply a new byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformSlot {
    /// Per-pass constants (set 0)
    Pass,
    /// Per-object constants (set 1)
    Object,
}

impl UniformSlot {
    /// Descriptor set index in the pipeline layout
    pub const fn set_index(self) -> u32 {
        match self {
            Self::Pass => 0,
            Self::Object => 1,
        }
    }
}

/// Buffer allocation, persistent mapping and fence queries
///
/// Methods take `&self` so a device can be shared (`Arc`) by every resource
/// that must release itself on drop.
pub trait GraphicsDevice {
    /// Opaque buffer handle
    type Buffer: Copy + Eq + Debug;
    /// Opaque completion token for a submission
    type Fence: Copy + Debug;

    /// Hardware limits
    fn limits(&self) -> DeviceLimits;

    /// Allocate a host-visible, host-coherent buffer of `size` bytes
    fn allocate_coherent_buffer(&self, size: u64, usage: BufferUsage) -> DeviceResult<Self::Buffer>;

    /// Map the whole buffer for host access
    ///
    /// The returned pointer stays valid for the full buffer size until
    /// [`GraphicsDevice::unmap`] or [`GraphicsDevice::destroy_buffer`].
    fn map_persistent(&self, buffer: Self::Buffer) -> DeviceResult<NonNull<u8>>;

    /// Release a mapping obtained from [`GraphicsDevice::map_persistent`]
    fn unmap(&self, buffer: Self::Buffer);

    /// Free a buffer and its memory
    fn destroy_buffer(&self, buffer: Self::Buffer);

    /// Non-blocking completion query
    fn is_fence_signaled(&self, fence: Self::Fence) -> DeviceResult<bool>;

    /// Block until the submission behind `fence` has finished executing
    fn wait_for_fence(&self, fence: Self::Fence) -> DeviceResult<()>;
}

/// Command recording surface used by the draw-time binder
pub trait DrawRecorder {
    /// Buffer handle type understood by the recorder
    type Buffer: Copy;

    /// Bind `range` bytes of `buffer` starting at `offset` to a uniform slot
    fn bind_uniform_range(
        &mut self,
        slot: UniformSlot,
        buffer: Self::Buffer,
        offset: u64,
        range: u64,
    ) -> DeviceResult<()>;

    /// Bind the shared vertex buffer
    fn bind_vertex_buffer(&mut self, buffer: Self::Buffer, offset: u64);

    /// Bind the shared index buffer
    fn bind_index_buffer(&mut self, buffer: Self::Buffer, offset: u64, format: IndexFormat);

    /// Issue one indexed draw
    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32);
}
