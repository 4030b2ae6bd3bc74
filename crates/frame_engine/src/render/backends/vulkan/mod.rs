//! Vulkan backend
//!
//! Implements the device contracts on top of `ash`. Instance, device,
//! swapchain and pipeline creation stay with the application.

pub mod commands;
pub mod descriptor_set;
pub mod device;

pub use commands::VulkanDrawRecorder;
pub use descriptor_set::{
    BufferResource, DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, FrameDescriptorSets,
    ResourceDescriptor, TextureResource,
};
pub use device::VulkanDevice;
