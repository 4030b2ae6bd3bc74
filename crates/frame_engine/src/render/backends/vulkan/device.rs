//! Vulkan implementation of [`GraphicsDevice`]
//!
//! Every buffer gets its own dedicated host-visible, host-coherent
//! allocation. The arenas allocate exactly two buffers for their whole life,
//! so a sub-allocator would buy nothing here.

#![allow(unsafe_code)]

use std::collections::HashMap;
use std::ptr::NonNull;

use ash::{vk, Device, Instance};
use parking_lot::Mutex;

use crate::render::backend::{BufferUsage, DeviceError, DeviceLimits, DeviceResult, GraphicsDevice};

struct Allocation {
    memory: vk::DeviceMemory,
    mapped: bool,
}

/// Buffer allocation and fence queries on a logical device
///
/// Does not own the `ash::Device`; the caller destroys it after every
/// resource created through this wrapper is gone.
pub struct VulkanDevice {
    device: Device,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    limits: DeviceLimits,
    allocations: Mutex<HashMap<vk::Buffer, Allocation>>,
}

impl VulkanDevice {
    /// Wrap a logical device created on `physical_device`
    pub fn new(instance: &Instance, physical_device: vk::PhysicalDevice, device: Device) -> Self {
        let (memory_properties, properties) = unsafe {
            (
                instance.get_physical_device_memory_properties(physical_device),
                instance.get_physical_device_properties(physical_device),
            )
        };
        let alignment = properties.limits.min_uniform_buffer_offset_alignment;
        log::debug!(
            "Vulkan device: {} memory types, minUniformBufferOffsetAlignment = {alignment}",
            memory_properties.memory_type_count
        );

        Self {
            device,
            memory_properties,
            limits: DeviceLimits {
                min_uniform_buffer_offset_alignment: alignment,
            },
            allocations: Mutex::new(HashMap::new()),
        }
    }

    /// Underlying logical device
    pub fn handle(&self) -> &Device {
        &self.device
    }
}

/// Translate usage flags
pub fn vk_buffer_usage(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    if usage.contains(BufferUsage::UNIFORM) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsage::VERTEX) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsage::INDEX) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsage::TRANSFER_SRC) {
        flags |= vk::BufferUsageFlags::TRANSFER_SRC;
    }
    flags
}

/// Find memory type with required properties
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> DeviceResult<u32> {
    (0..memory_properties.memory_type_count)
        .find(|&i| {
            (type_filter & (1 << i)) != 0
                && memory_properties.memory_types[i as usize].property_flags.contains(properties)
        })
        .ok_or(DeviceError::NoSuitableMemoryType)
}

impl GraphicsDevice for VulkanDevice {
    type Buffer = vk::Buffer;
    type Fence = vk::Fence;

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn allocate_coherent_buffer(&self, size: u64, usage: BufferUsage) -> DeviceResult<Self::Buffer> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(vk_buffer_usage(usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { self.device.create_buffer(&buffer_info, None) }.map_err(DeviceError::Vulkan)?;
        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let memory_type_index = match find_memory_type(
            &self.memory_properties,
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { self.device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(match e {
                    vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
                        DeviceError::OutOfMemory { requested: requirements.size }
                    }
                    other => DeviceError::Vulkan(other),
                });
            }
        };

        if let Err(e) = unsafe { self.device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                self.device.destroy_buffer(buffer, None);
                self.device.free_memory(memory, None);
            }
            return Err(DeviceError::Vulkan(e));
        }

        self.allocations.lock().insert(buffer, Allocation { memory, mapped: false });
        log::trace!("Vulkan buffer {buffer:?}: {size} bytes, {usage:?}, memory type {memory_type_index}");
        Ok(buffer)
    }

    fn map_persistent(&self, buffer: Self::Buffer) -> DeviceResult<NonNull<u8>> {
        let mut allocations = self.allocations.lock();
        let allocation = allocations.get_mut(&buffer).ok_or(DeviceError::UnknownBuffer)?;
        if allocation.mapped {
            return Err(DeviceError::AlreadyMapped);
        }

        let ptr = unsafe {
            self.device
                .map_memory(allocation.memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
        }
        .map_err(DeviceError::Vulkan)?;

        let ptr = NonNull::new(ptr.cast::<u8>()).ok_or(DeviceError::Vulkan(vk::Result::ERROR_MEMORY_MAP_FAILED))?;
        allocation.mapped = true;
        Ok(ptr)
    }

    fn unmap(&self, buffer: Self::Buffer) {
        if let Some(allocation) = self.allocations.lock().get_mut(&buffer) {
            if allocation.mapped {
                unsafe { self.device.unmap_memory(allocation.memory) };
                allocation.mapped = false;
            }
        }
    }

    fn destroy_buffer(&self, buffer: Self::Buffer) {
        match self.allocations.lock().remove(&buffer) {
            Some(allocation) => unsafe {
                if allocation.mapped {
                    self.device.unmap_memory(allocation.memory);
                }
                self.device.destroy_buffer(buffer, None);
                self.device.free_memory(allocation.memory, None);
            },
            None => log::warn!("Destroying unknown Vulkan buffer {buffer:?}"),
        }
    }

    fn is_fence_signaled(&self, fence: Self::Fence) -> DeviceResult<bool> {
        unsafe { self.device.get_fence_status(fence) }.map_err(DeviceError::Vulkan)
    }

    fn wait_for_fence(&self, fence: Self::Fence) -> DeviceResult<()> {
        unsafe { self.device.wait_for_fences(&[fence], true, u64::MAX) }.map_err(DeviceError::Vulkan)
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        let allocations = self.allocations.get_mut();
        if !allocations.is_empty() {
            log::warn!("Vulkan device wrapper dropped with {} live buffers", allocations.len());
        }
        for (buffer, allocation) in allocations.drain() {
            unsafe {
                if allocation.mapped {
                    self.device.unmap_memory(allocation.memory);
                }
                self.device.destroy_buffer(buffer, None);
                self.device.free_memory(allocation.memory, None);
            }
        }
    }
}
