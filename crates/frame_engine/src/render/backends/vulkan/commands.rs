//! Vulkan [`DrawRecorder`]
//!
//! Records into a command buffer that is already in the recording state,
//! inside a render pass, with the shapes pipeline bound.

#![allow(unsafe_code)]

use ash::{vk, Device};

use crate::render::backend::{DeviceError, DeviceResult, DrawRecorder, IndexFormat, UniformSlot};
use crate::render::backends::vulkan::descriptor_set::FrameDescriptorSets;

/// Draw recording on one command buffer
pub struct VulkanDrawRecorder<'a> {
    device: &'a Device,
    command_buffer: vk::CommandBuffer,
    pipeline_layout: vk::PipelineLayout,
    descriptor_sets: &'a FrameDescriptorSets,
}

impl<'a> VulkanDrawRecorder<'a> {
    /// Record into `command_buffer` using the sets in `descriptor_sets`
    pub fn new(
        device: &'a Device,
        command_buffer: vk::CommandBuffer,
        pipeline_layout: vk::PipelineLayout,
        descriptor_sets: &'a FrameDescriptorSets,
    ) -> Self {
        Self {
            device,
            command_buffer,
            pipeline_layout,
            descriptor_sets,
        }
    }
}

/// Vulkan index type of an index format
pub fn vk_index_type(format: IndexFormat) -> vk::IndexType {
    match format {
        IndexFormat::U16 => vk::IndexType::UINT16,
        IndexFormat::U32 => vk::IndexType::UINT32,
    }
}

/// Dynamic offsets are 32-bit in Vulkan
pub fn dynamic_offset(offset: u64) -> DeviceResult<u32> {
    u32::try_from(offset).map_err(|_| DeviceError::OffsetOverflow { offset })
}

impl DrawRecorder for VulkanDrawRecorder<'_> {
    type Buffer = vk::Buffer;

    fn bind_uniform_range(
        &mut self,
        slot: UniformSlot,
        buffer: Self::Buffer,
        offset: u64,
        _range: u64,
    ) -> DeviceResult<()> {
        // The range is fixed when the set is written; only the offset varies
        if buffer != self.descriptor_sets.buffer(slot) {
            return Err(DeviceError::UnknownBuffer);
        }
        let offsets = [dynamic_offset(offset)?];

        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                slot.set_index(),
                &[self.descriptor_sets.set(slot)],
                &offsets,
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: Self::Buffer, offset: u64) {
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(self.command_buffer, 0, &[buffer], &[offset]);
        }
    }

    fn bind_index_buffer(&mut self, buffer: Self::Buffer, offset: u64, format: IndexFormat) {
        unsafe {
            self.device
                .cmd_bind_index_buffer(self.command_buffer, buffer, offset, vk_index_type(format));
        }
    }

    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32) {
        unsafe {
            self.device
                .cmd_draw_indexed(self.command_buffer, index_count, 1, start_index, base_vertex, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_offset_range() {
        assert_eq!(dynamic_offset(25_088).expect("offset"), 25_088);
        assert_eq!(dynamic_offset(u64::from(u32::MAX)).expect("offset"), u32::MAX);
        assert!(matches!(
            dynamic_offset(u64::from(u32::MAX) + 1),
            Err(DeviceError::OffsetOverflow { offset }) if offset == 1 << 32
        ));
    }

    #[test]
    fn test_index_types() {
        assert_eq!(vk_index_type(IndexFormat::U16), vk::IndexType::UINT16);
        assert_eq!(vk_index_type(IndexFormat::U32), vk::IndexType::UINT32);
    }
}
