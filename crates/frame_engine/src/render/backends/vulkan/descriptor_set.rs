//! Vulkan descriptor set layouts, pools and writes
//!
//! The shapes pipeline uses two sets, each holding a single
//! `UNIFORM_BUFFER_DYNAMIC` binding: set 0 for pass constants and set 1 for
//! object constants. Each set is written once with the arena buffer and the
//! element range; per-draw selection happens through dynamic offsets.

#![allow(unsafe_code)]

use ash::{vk, Device};

use crate::render::backend::{DeviceError, DeviceResult, UniformSlot};
use crate::render::error::FrameResult;
use crate::render::frame_resources::FrameResources;
use crate::render::backends::vulkan::device::VulkanDevice;

/// Descriptor set layout builder for creating reusable layouts
#[derive(Debug, Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Create a new descriptor set layout builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a uniform buffer binding selected by a dynamic offset at bind time
    #[must_use]
    pub fn add_dynamic_uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add_binding(binding, vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, stage_flags)
    }

    /// Add a combined image sampler binding
    #[must_use]
    pub fn add_combined_image_sampler(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add_binding(binding, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, stage_flags)
    }

    fn add_binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
    ) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Bindings added so far
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }

    /// Build the descriptor set layout
    pub fn build(self, device: &Device) -> DeviceResult<DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);

        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }
            .map_err(DeviceError::Vulkan)?;

        Ok(DescriptorSetLayout {
            layout,
            device: device.clone(),
            bindings: self.bindings,
        })
    }
}

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Device,
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayout {
    /// Get the Vulkan descriptor set layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Get the bindings used in this layout
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Descriptor pool for allocating descriptor sets
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: Device,
}

impl DescriptorPool {
    /// Create a pool holding `max_sets` sets drawn from `pool_sizes`
    pub fn new(device: &Device, max_sets: u32, pool_sizes: &[vk::DescriptorPoolSize]) -> DeviceResult<Self> {
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);

        let pool = unsafe { device.create_descriptor_pool(&pool_info, None) }.map_err(DeviceError::Vulkan)?;

        Ok(Self {
            pool,
            device: device.clone(),
        })
    }

    /// Allocate descriptor sets from this pool
    pub fn allocate_descriptor_sets(
        &self,
        layouts: &[vk::DescriptorSetLayout],
    ) -> DeviceResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        unsafe { self.device.allocate_descriptor_sets(&alloc_info) }.map_err(DeviceError::Vulkan)
    }

    /// Get the pool handle
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Buffer range written into a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferResource {
    /// Source buffer
    pub buffer: vk::Buffer,
    /// Base offset; dynamic offsets are added to it at bind time
    pub offset: u64,
    /// Bytes visible to the shader
    pub range: u64,
    /// Written as `UNIFORM_BUFFER_DYNAMIC` rather than `UNIFORM_BUFFER`
    pub dynamic: bool,
}

/// Sampled image written into a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureResource {
    /// Image view
    pub image_view: vk::ImageView,
    /// Sampler
    pub sampler: vk::Sampler,
    /// Layout the image is in when sampled
    pub layout: vk::ImageLayout,
}

/// A resource bound to one descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceDescriptor {
    /// Uniform buffer range
    Buffer(BufferResource),
    /// Combined image sampler
    Texture(TextureResource),
}

impl ResourceDescriptor {
    /// Vulkan descriptor type of the resource
    pub fn descriptor_type(&self) -> vk::DescriptorType {
        match self {
            Self::Buffer(BufferResource { dynamic: true, .. }) => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            Self::Buffer(_) => vk::DescriptorType::UNIFORM_BUFFER,
            Self::Texture(_) => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        }
    }
}

/// Point `(binding, resource)` pairs of `set` at their resources
pub fn write_descriptor_set(device: &Device, set: vk::DescriptorSet, resources: &[(u32, ResourceDescriptor)]) {
    let buffer_infos: Vec<[vk::DescriptorBufferInfo; 1]> = resources
        .iter()
        .map(|(_, resource)| match resource {
            ResourceDescriptor::Buffer(b) => [vk::DescriptorBufferInfo {
                buffer: b.buffer,
                offset: b.offset,
                range: b.range,
            }],
            ResourceDescriptor::Texture(_) => [vk::DescriptorBufferInfo::default()],
        })
        .collect();
    let image_infos: Vec<[vk::DescriptorImageInfo; 1]> = resources
        .iter()
        .map(|(_, resource)| match resource {
            ResourceDescriptor::Texture(t) => [vk::DescriptorImageInfo {
                sampler: t.sampler,
                image_view: t.image_view,
                image_layout: t.layout,
            }],
            ResourceDescriptor::Buffer(_) => [vk::DescriptorImageInfo::default()],
        })
        .collect();

    let writes: Vec<vk::WriteDescriptorSet> = resources
        .iter()
        .enumerate()
        .map(|(i, (binding, resource))| {
            let write = vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(*binding)
                .dst_array_element(0)
                .descriptor_type(resource.descriptor_type());
            match resource {
                ResourceDescriptor::Buffer(_) => write.buffer_info(&buffer_infos[i]).build(),
                ResourceDescriptor::Texture(_) => write.image_info(&image_infos[i]).build(),
            }
        })
        .collect();

    unsafe { device.update_descriptor_sets(&writes, &[]) };
}

/// The two dynamic uniform sets of the shapes pipeline
///
/// Field order is drop order: the pool goes before the layouts its sets
/// were allocated with.
pub struct FrameDescriptorSets {
    pass_set: vk::DescriptorSet,
    object_set: vk::DescriptorSet,
    pass_buffer: vk::Buffer,
    object_buffer: vk::Buffer,
    _pool: DescriptorPool,
    pass_layout: DescriptorSetLayout,
    object_layout: DescriptorSetLayout,
}

impl FrameDescriptorSets {
    /// Create layouts, allocate both sets and point them at the arenas
    pub fn new(device: &Device, resources: &FrameResources<VulkanDevice>) -> FrameResult<Self> {
        let stages = vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT;
        let pass_layout = DescriptorSetLayoutBuilder::new()
            .add_dynamic_uniform_buffer(0, stages)
            .build(device)?;
        let object_layout = DescriptorSetLayoutBuilder::new()
            .add_dynamic_uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
            .build(device)?;

        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            descriptor_count: 2,
        }];
        let pool = DescriptorPool::new(device, 2, &pool_sizes)?;
        let sets = pool.allocate_descriptor_sets(&[pass_layout.handle(), object_layout.handle()])?;
        let (pass_set, object_set) = match sets.as_slice() {
            [pass, object] => (*pass, *object),
            _ => return Err(DeviceError::Vulkan(vk::Result::ERROR_OUT_OF_POOL_MEMORY).into()),
        };

        let pass_buffer = resources.pass_arena().buffer();
        let object_buffer = resources.object_arena().buffer();
        let pass_range = resources.binder().pass_range(0)?;
        let object_range = resources.binder().object_range(0, 0)?;

        write_descriptor_set(
            device,
            pass_set,
            &[(0, ResourceDescriptor::Buffer(BufferResource {
                buffer: pass_buffer,
                offset: 0,
                range: pass_range.range,
                dynamic: true,
            }))],
        );
        write_descriptor_set(
            device,
            object_set,
            &[(0, ResourceDescriptor::Buffer(BufferResource {
                buffer: object_buffer,
                offset: 0,
                range: object_range.range,
                dynamic: true,
            }))],
        );

        log::debug!(
            "Descriptor sets written: pass range {} bytes, object range {} bytes",
            pass_range.range,
            object_range.range
        );

        Ok(Self {
            pass_set,
            object_set,
            pass_buffer,
            object_buffer,
            _pool: pool,
            pass_layout,
            object_layout,
        })
    }

    /// Set bound for a uniform slot
    pub fn set(&self, slot: UniformSlot) -> vk::DescriptorSet {
        match slot {
            UniformSlot::Pass => self.pass_set,
            UniformSlot::Object => self.object_set,
        }
    }

    /// Buffer a slot's set was written with
    pub fn buffer(&self, slot: UniformSlot) -> vk::Buffer {
        match slot {
            UniformSlot::Pass => self.pass_buffer,
            UniformSlot::Object => self.object_buffer,
        }
    }

    /// Layouts in set order, for pipeline layout creation
    pub fn layouts(&self) -> [vk::DescriptorSetLayout; 2] {
        [self.pass_layout.handle(), self.object_layout.handle()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_bindings() {
        let builder = DescriptorSetLayoutBuilder::new()
            .add_dynamic_uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
            .add_combined_image_sampler(1, vk::ShaderStageFlags::FRAGMENT);

        let bindings = builder.bindings();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC);
        assert_eq!(bindings[1].binding, 1);
        assert_eq!(bindings[1].stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_resource_descriptor_types() {
        let buffer = BufferResource {
            buffer: vk::Buffer::null(),
            offset: 0,
            range: 256,
            dynamic: true,
        };
        assert_eq!(
            ResourceDescriptor::Buffer(buffer).descriptor_type(),
            vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC
        );
        assert_eq!(
            ResourceDescriptor::Buffer(BufferResource { dynamic: false, ..buffer }).descriptor_type(),
            vk::DescriptorType::UNIFORM_BUFFER
        );

        let texture = TextureResource {
            image_view: vk::ImageView::null(),
            sampler: vk::Sampler::null(),
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        };
        assert_eq!(
            ResourceDescriptor::Texture(texture).descriptor_type(),
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        );
    }
}
