//! Frame resource errors

use ash::vk;
use thiserror::Error;

use crate::render::backend::DeviceError;

/// Coarse classification of a [`FrameResourceError`]
///
/// None of these are retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid sizing or layout detected at startup
    Configuration,
    /// Device memory or reserved capacity ran out
    ResourceExhaustion,
    /// The caller broke a precondition (bad index, stale frame)
    Programmer,
    /// The device failed for a reason outside the caller's control
    Device,
}

/// Errors raised by the frame resource core
#[derive(Error, Debug)]
pub enum FrameResourceError {
    /// Alignment must be zero or a power of two
    #[error("Uniform alignment {alignment} is not a power of two")]
    InvalidAlignment {
        /// The rejected alignment
        alignment: u64,
    },

    /// Uniform elements cannot be empty
    #[error("Uniform element size must be non-zero")]
    ZeroElementSize,

    /// At least one frame slot is required
    #[error("Frame slot count must be at least 1")]
    ZeroFrameSlots,

    /// At least one element per slot is required
    #[error("Arena element count must be at least 1")]
    ZeroCapacity,

    /// The arena byte size does not fit in 64 bits
    #[error("Arena size overflows: {stride} bytes x {elements} elements x {slots} slots")]
    SizeOverflow {
        /// Element stride
        stride: u64,
        /// Elements per slot
        elements: usize,
        /// Frame slots
        slots: usize,
    },

    /// A value is larger than the arena element it is written into
    #[error("Value of {size} bytes does not fit a {stride}-byte element")]
    ElementTooLarge {
        /// Size of the value
        size: u64,
        /// Element stride
        stride: u64,
    },

    /// The pipeline's per-object range disagrees with the arena stride
    #[error("Pipeline expects a {reflected}-byte object range but the arena stride is {stride}")]
    StrideMismatch {
        /// Range reported by pipeline reflection
        reflected: u64,
        /// Stride computed for the arena
        stride: u64,
    },

    /// Pass and object arenas were built with different slot counts
    #[error("Pass arena has {pass} frame slots but object arena has {object}")]
    SlotCountMismatch {
        /// Slots in the pass arena
        pass: usize,
        /// Slots in the object arena
        object: usize,
    },

    /// Object index outside the reserved element range
    #[error("Object index {index} is outside the arena capacity of {capacity}")]
    ObjectIndexOutOfRange {
        /// The rejected index
        index: usize,
        /// Elements reserved per slot
        capacity: usize,
    },

    /// Frame index outside the slot range
    #[error("Frame index {index} is outside the {count} frame slots")]
    FrameIndexOutOfRange {
        /// The rejected index
        index: usize,
        /// Number of frame slots
        count: usize,
    },

    /// A raw byte offset does not land on an element boundary
    #[error("Offset {offset} is not a multiple of the {stride}-byte stride")]
    MisalignedOffset {
        /// The rejected offset
        offset: u64,
        /// Element stride
        stride: u64,
    },

    /// A raw byte offset lies past the end of the arena
    #[error("Offset {offset} lies outside the {total}-byte arena")]
    OffsetOutOfRange {
        /// The rejected offset
        offset: u64,
        /// Arena size in bytes
        total: u64,
    },

    /// Index is within capacity but no render item owns it
    #[error("Object index {index} has no registered render item")]
    UnregisteredObject {
        /// The rejected index
        index: usize,
    },

    /// Every reserved object index is taken
    #[error("Object table is full ({capacity} objects)")]
    CapacityExceeded {
        /// Elements reserved per slot
        capacity: usize,
    },

    /// A frame context from an earlier tick was used
    #[error("Frame context {stale} is stale, current frame is {current}")]
    StaleFrameContext {
        /// Frame number carried by the context
        stale: u64,
        /// Frame number of the active tick
        current: u64,
    },

    /// Mesh handle not registered
    #[error("Unknown mesh handle {0}")]
    UnknownMesh(usize),

    /// Vertex or index totals of a geometry layout overflow 32 bits
    #[error("Geometry layout overflows when appending submesh '{0}'")]
    GeometryOverflow(String),

    /// Submesh name not present in the geometry
    #[error("Unknown submesh '{0}'")]
    UnknownSubmesh(String),

    /// Failure reported by the device
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
}

impl FrameResourceError {
    /// Classify the error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAlignment { .. }
            | Self::ZeroElementSize
            | Self::ZeroFrameSlots
            | Self::ZeroCapacity
            | Self::SizeOverflow { .. }
            | Self::ElementTooLarge { .. }
            | Self::StrideMismatch { .. }
            | Self::SlotCountMismatch { .. }
            | Self::GeometryOverflow(_)
            | Self::UnknownSubmesh(_) => ErrorKind::Configuration,
            Self::CapacityExceeded { .. } => ErrorKind::ResourceExhaustion,
            Self::Device(error) => device_error_kind(error),
            Self::ObjectIndexOutOfRange { .. }
            | Self::FrameIndexOutOfRange { .. }
            | Self::MisalignedOffset { .. }
            | Self::OffsetOutOfRange { .. }
            | Self::UnregisteredObject { .. }
            | Self::StaleFrameContext { .. }
            | Self::UnknownMesh(_) => ErrorKind::Programmer,
        }
    }
}

const fn device_error_kind(error: &DeviceError) -> ErrorKind {
    match error {
        DeviceError::OutOfMemory { .. }
        | DeviceError::NoSuitableMemoryType
        | DeviceError::Vulkan(
            vk::Result::ERROR_OUT_OF_HOST_MEMORY
            | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY
            | vk::Result::ERROR_MEMORY_MAP_FAILED
            | vk::Result::ERROR_TOO_MANY_OBJECTS,
        ) => ErrorKind::ResourceExhaustion,
        DeviceError::UnknownBuffer | DeviceError::AlreadyMapped | DeviceError::OffsetOverflow { .. } => {
            ErrorKind::Programmer
        }
        DeviceError::Vulkan(_) => ErrorKind::Device,
    }
}

/// Result type for frame resource operations
pub type FrameResult<T> = Result<T, FrameResourceError>;
