//! Persistent-mapped uniform arena
//!
//! One coherent device buffer per uniform kind, mapped once for the arena's
//! whole life and split into `frame_slot_count` equal slots of
//! `element_count` aligned elements:
//!
//! ```text
//! | slot 0: e0 e1 .. eN-1 | slot 1: e0 e1 .. eN-1 | slot 2: ... |
//!   ^ slot_offset(1) = 1 * frame_slot_stride
//!                           ^ element_offset(1, 1) = slot_offset(1) + 1 * stride
//! ```
//!
//! The mapping is never exposed. Callers go through index-based accessors
//! that bounds-check before touching memory, so an out-of-range index can
//! never spill into a neighbouring object's element.

#![allow(unsafe_code)]

use std::ptr::NonNull;
use std::sync::Arc;

use bytemuck::Pod;

use crate::render::backend::{BufferUsage, GraphicsDevice};
use crate::render::error::{FrameResourceError, FrameResult};
use crate::render::resources::layout::AlignedLayout;

/// Coherent uniform memory partitioned into frame slots
pub struct UniformArena<D: GraphicsDevice> {
    device: Arc<D>,
    buffer: D::Buffer,
    mapped: NonNull<u8>,
    layout: AlignedLayout,
    element_count: usize,
    frame_slot_count: usize,
    frame_slot_stride: u64,
    total_bytes: u64,
    label: &'static str,
}

impl<D: GraphicsDevice> UniformArena<D> {
    /// Allocate and map `layout.stride() * element_count * frame_slot_count` bytes
    ///
    /// All-or-nothing: if mapping fails the buffer is released before the
    /// error is returned.
    pub fn new(
        device: Arc<D>,
        label: &'static str,
        layout: AlignedLayout,
        element_count: usize,
        frame_slot_count: usize,
    ) -> FrameResult<Self> {
        if element_count == 0 {
            return Err(FrameResourceError::ZeroCapacity);
        }
        if frame_slot_count == 0 {
            return Err(FrameResourceError::ZeroFrameSlots);
        }

        let overflow = || FrameResourceError::SizeOverflow {
            stride: layout.stride(),
            elements: element_count,
            slots: frame_slot_count,
        };
        let frame_slot_stride = layout
            .stride()
            .checked_mul(element_count as u64)
            .ok_or_else(overflow)?;
        let total_bytes = frame_slot_stride
            .checked_mul(frame_slot_count as u64)
            .ok_or_else(overflow)?;

        let buffer = device.allocate_coherent_buffer(total_bytes, BufferUsage::UNIFORM)?;
        let mapped = match device.map_persistent(buffer) {
            Ok(mapped) => mapped,
            Err(e) => {
                device.destroy_buffer(buffer);
                return Err(e.into());
            }
        };

        log::debug!(
            "Created {label} arena: {total_bytes} bytes ({frame_slot_count} slots x {element_count} elements x {} byte stride)",
            layout.stride()
        );

        Ok(Self {
            device,
            buffer,
            mapped,
            layout,
            element_count,
            frame_slot_count,
            frame_slot_stride,
            total_bytes,
            label,
        })
    }

    /// Device buffer handle for descriptor binding
    pub fn buffer(&self) -> D::Buffer {
        self.buffer
    }

    /// Element layout
    pub fn layout(&self) -> AlignedLayout {
        self.layout
    }

    /// Distance between consecutive elements
    pub fn stride(&self) -> u64 {
        self.layout.stride()
    }

    /// Elements reserved per frame slot
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Number of frame slots
    pub fn frame_slot_count(&self) -> usize {
        self.frame_slot_count
    }

    /// Bytes per frame slot
    pub fn frame_slot_stride(&self) -> u64 {
        self.frame_slot_stride
    }

    /// Size of the whole buffer
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Byte offset of a frame slot
    pub fn slot_offset(&self, frame_index: usize) -> FrameResult<u64> {
        if frame_index >= self.frame_slot_count {
            return Err(FrameResourceError::FrameIndexOutOfRange {
                index: frame_index,
                count: self.frame_slot_count,
            });
        }
        Ok(frame_index as u64 * self.frame_slot_stride)
    }

    /// Byte offset of one element inside a frame slot
    pub fn element_offset(&self, frame_index: usize, element_index: usize) -> FrameResult<u64> {
        if element_index >= self.element_count {
            return Err(FrameResourceError::ObjectIndexOutOfRange {
                index: element_index,
                capacity: self.element_count,
            });
        }
        Ok(self.slot_offset(frame_index)? + element_index as u64 * self.layout.stride())
    }

    /// Copy `value` into one element of one frame slot
    pub fn write<T: Pod>(&mut self, frame_index: usize, element_index: usize, value: &T) -> FrameResult<()> {
        let bytes = bytemuck::bytes_of(value);
        self.check_fits(bytes.len())?;
        let offset = self.element_offset(frame_index, element_index)?;

        // SAFETY: offset + len <= total_bytes (offset is an element boundary
        // and len <= stride), and the mapping covers total_bytes for as long
        // as self is alive.
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.mapped.as_ptr().add(offset as usize),
                bytes.len(),
            );
        }
        Ok(())
    }

    /// Copy `value` into every element of every slot
    pub fn fill<T: Pod>(&mut self, value: &T) -> FrameResult<()> {
        for frame_index in 0..self.frame_slot_count {
            for element_index in 0..self.element_count {
                self.write(frame_index, element_index, value)?;
            }
        }
        Ok(())
    }

    /// Read back one element
    pub fn read<T: Pod>(&self, frame_index: usize, element_index: usize) -> FrameResult<T> {
        let offset = self.element_offset(frame_index, element_index)?;
        self.read_at(offset)
    }

    /// Read the element a dynamic offset points at
    ///
    /// Mirrors what the device sees when a range is bound at `offset`.
    pub fn read_at<T: Pod>(&self, offset: u64) -> FrameResult<T> {
        let size = std::mem::size_of::<T>();
        self.check_fits(size)?;

        let stride = self.layout.stride();
        if offset % stride != 0 {
            return Err(FrameResourceError::MisalignedOffset { offset, stride });
        }
        if offset >= self.total_bytes {
            return Err(FrameResourceError::OffsetOutOfRange {
                offset,
                total: self.total_bytes,
            });
        }

        // SAFETY: offset is an element boundary inside the mapping and
        // size <= stride, so the slice stays within total_bytes.
        let bytes = unsafe {
            std::slice::from_raw_parts(self.mapped.as_ptr().add(offset as usize), size)
        };
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    fn check_fits(&self, size: usize) -> FrameResult<()> {
        let size = size as u64;
        if size > self.layout.stride() {
            return Err(FrameResourceError::ElementTooLarge {
                size,
                stride: self.layout.stride(),
            });
        }
        Ok(())
    }
}

impl<D: GraphicsDevice> Drop for UniformArena<D> {
    fn drop(&mut self) {
        log::debug!("Releasing {} arena ({} bytes)", self.label, self.total_bytes);
        self.device.unmap(self.buffer);
        self.device.destroy_buffer(self.buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::host::HostDevice;
    use crate::render::backend::DeviceError;

    fn arena(device: &Arc<HostDevice>, stride: u64, elements: usize, slots: usize) -> UniformArena<HostDevice> {
        let layout = AlignedLayout::new(stride, stride).expect("layout");
        UniformArena::new(device.clone(), "test", layout, elements, slots).expect("arena")
    }

    #[test]
    fn test_sizing_and_offsets() {
        let device = Arc::new(HostDevice::new(256));
        let arena = arena(&device, 256, 44, 3);

        assert_eq!(arena.total_bytes(), 33_792);
        assert_eq!(arena.frame_slot_stride(), 256 * 44);
        assert_eq!(arena.slot_offset(1).expect("slot"), 11_264);
        assert_eq!(arena.element_offset(2, 10).expect("offset"), 2 * 256 * 44 + 10 * 256);
        assert_eq!(device.allocated_bytes(), 33_792);
    }

    #[test]
    fn test_out_of_range_indices_are_rejected() {
        let device = Arc::new(HostDevice::new(256));
        let mut arena = arena(&device, 256, 4, 2);

        assert!(matches!(
            arena.write(0, 4, &[1.0f32; 16]),
            Err(FrameResourceError::ObjectIndexOutOfRange { index: 4, capacity: 4 })
        ));
        assert!(matches!(
            arena.write(2, 0, &[1.0f32; 16]),
            Err(FrameResourceError::FrameIndexOutOfRange { index: 2, count: 2 })
        ));
        // Neighbouring element untouched
        let neighbour: [f32; 16] = arena.read(1, 3).expect("read");
        assert_eq!(neighbour, [0.0; 16]);
    }

    #[test]
    fn test_write_then_read_each_slot_independently() {
        let device = Arc::new(HostDevice::new(64));
        let mut arena = arena(&device, 64, 2, 3);

        arena.write(1, 1, &[7u32; 16]).expect("write");

        let written: [u32; 16] = arena.read(1, 1).expect("read");
        let other_slot: [u32; 16] = arena.read(0, 1).expect("read");
        let other_element: [u32; 16] = arena.read(1, 0).expect("read");
        assert_eq!(written, [7; 16]);
        assert_eq!(other_slot, [0; 16]);
        assert_eq!(other_element, [0; 16]);
    }

    #[test]
    fn test_read_at_validates_offsets() {
        let device = Arc::new(HostDevice::new(256));
        let mut arena = arena(&device, 256, 2, 2);
        arena.fill(&5u32).expect("fill");

        assert_eq!(arena.read_at::<u32>(768).expect("last element"), 5);
        assert!(matches!(
            arena.read_at::<u32>(100),
            Err(FrameResourceError::MisalignedOffset { offset: 100, stride: 256 })
        ));
        assert!(matches!(
            arena.read_at::<u32>(1024),
            Err(FrameResourceError::OffsetOutOfRange { offset: 1024, total: 1024 })
        ));
    }

    #[test]
    fn test_oversized_value_is_rejected() {
        let device = Arc::new(HostDevice::new(0));
        let layout = AlignedLayout::new(16, 0).expect("layout");
        let mut arena = UniformArena::new(device, "small", layout, 1, 1).expect("arena");

        assert!(matches!(
            arena.write(0, 0, &[0u8; 32]),
            Err(FrameResourceError::ElementTooLarge { size: 32, stride: 16 })
        ));
    }

    #[test]
    fn test_drop_releases_memory() {
        let device = Arc::new(HostDevice::new(256));
        {
            let _arena = arena(&device, 256, 8, 3);
            assert_eq!(device.buffer_count(), 1);
        }
        assert_eq!(device.buffer_count(), 0);
        assert_eq!(device.allocated_bytes(), 0);
    }

    #[test]
    fn test_allocation_failure_is_all_or_nothing() {
        let device = Arc::new(HostDevice::new(256).with_memory_budget(1024));
        let layout = AlignedLayout::new(64, 256).expect("layout");
        let result = UniformArena::new(device.clone(), "huge", layout, 44, 3);

        assert!(matches!(
            result,
            Err(FrameResourceError::Device(DeviceError::OutOfMemory { requested: 33_792 }))
        ));
        assert_eq!(device.buffer_count(), 0);
    }

    #[test]
    fn test_zero_sizes_are_configuration_errors() {
        let device = Arc::new(HostDevice::new(256));
        let layout = AlignedLayout::new(64, 256).expect("layout");
        assert!(matches!(
            UniformArena::new(device.clone(), "empty", layout, 0, 3),
            Err(FrameResourceError::ZeroCapacity)
        ));
        assert!(matches!(
            UniformArena::new(device, "slotless", layout, 4, 0),
            Err(FrameResourceError::ZeroFrameSlots)
        ));
    }
}
