//! Aligned element layout for uniform arenas

use crate::render::error::{FrameResourceError, FrameResult};

/// Round `element_size` up to the next multiple of `alignment`
///
/// An alignment of 0 means the device imposes no constraint. `alignment`
/// must otherwise be a power of two; [`AlignedLayout::new`] checks that.
pub const fn aligned_stride(element_size: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        element_size
    } else {
        (element_size + alignment - 1) & !(alignment - 1)
    }
}

/// Size, alignment and resulting stride of one uniform element
///
/// Computed once per uniform kind before its arena is sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignedLayout {
    element_size: u64,
    alignment: u64,
    stride: u64,
}

impl AlignedLayout {
    /// Compute the layout for an element of `element_size` bytes
    pub fn new(element_size: u64, alignment: u64) -> FrameResult<Self> {
        if element_size == 0 {
            return Err(FrameResourceError::ZeroElementSize);
        }
        if alignment != 0 && !alignment.is_power_of_two() {
            return Err(FrameResourceError::InvalidAlignment { alignment });
        }

        Ok(Self {
            element_size,
            alignment,
            stride: aligned_stride(element_size, alignment),
        })
    }

    /// Layout for one `T`
    pub fn of<T>(alignment: u64) -> FrameResult<Self> {
        Self::new(std::mem::size_of::<T>() as u64, alignment)
    }

    /// Logical element size in bytes
    pub const fn element_size(&self) -> u64 {
        self.element_size
    }

    /// Hardware alignment the stride honours
    pub const fn alignment(&self) -> u64 {
        self.alignment
    }

    /// Distance between consecutive elements
    pub const fn stride(&self) -> u64 {
        self.stride
    }
}
