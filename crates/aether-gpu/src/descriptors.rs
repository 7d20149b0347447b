//! Descriptor set management.

use crate::error::{GpuError, Result};
use crate::memory::FrameUniforms;
use ash::vk;

/// Descriptor set layout builder.
pub struct DescriptorSetLayoutBuilder<'a> {
    bindings: Vec<vk::DescriptorSetLayoutBinding<'a>>,
}

impl<'a> DescriptorSetLayoutBuilder<'a> {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// Add a binding.
    pub fn binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
    ) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(1)
                .stage_flags(stage_flags),
        );
        self
    }

    /// Add a uniform buffer binding.
    pub fn uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.binding(binding, vk::DescriptorType::UNIFORM_BUFFER, stage_flags)
    }

    /// Add a combined image sampler binding.
    pub fn combined_image_sampler(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.binding(
            binding,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            stage_flags,
        )
    }

    /// Build the descriptor set layout.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn build(self, device: &ash::Device) -> Result<vk::DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&self.bindings);

        device
            .create_descriptor_set_layout(&layout_info, None)
            .map_err(GpuError::for_op("vkCreateDescriptorSetLayout"))
    }
}

impl Default for DescriptorSetLayoutBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Descriptor pool for allocating descriptor sets.
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    /// Create a new descriptor pool.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(
        device: &ash::Device,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> Result<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);

        let pool = device
            .create_descriptor_pool(&create_info, None)
            .map_err(GpuError::for_op("vkCreateDescriptorPool"))?;
        Ok(Self { pool })
    }

    /// Allocate one set per layout entry.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn allocate(
        &self,
        device: &ash::Device,
        layouts: &[vk::DescriptorSetLayout],
    ) -> Result<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        device
            .allocate_descriptor_sets(&alloc_info)
            .map_err(GpuError::for_op("vkAllocateDescriptorSets"))
    }

    /// Destroy the pool, freeing all sets allocated from it.
    ///
    /// # Safety
    /// The device must be valid and the pool must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_descriptor_pool(self.pool, None);
    }
}

/// Per-frame descriptor sets for the uniform-buffer + sampled-texture layout.
///
/// One layout shared by all frame slots, one pool sized for exactly
/// `frames_in_flight` sets, one set per slot. Binding 0 is the slot's
/// uniform buffer (vertex stage), binding 1 the combined image sampler
/// (fragment stage).
pub struct FrameDescriptors {
    layout: vk::DescriptorSetLayout,
    pool: DescriptorPool,
    sets: Vec<vk::DescriptorSet>,
}

impl FrameDescriptors {
    /// Create the layout, pool, and per-slot sets.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device, frames_in_flight: usize) -> Result<Self> {
        let layout = DescriptorSetLayoutBuilder::new()
            .uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
            .combined_image_sampler(1, vk::ShaderStageFlags::FRAGMENT)
            .build(device)?;

        let pool_sizes = [
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(frames_in_flight as u32),
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(frames_in_flight as u32),
        ];

        let pool = DescriptorPool::new(device, frames_in_flight as u32, &pool_sizes)?;

        let layouts: Vec<_> = (0..frames_in_flight).map(|_| layout).collect();
        let sets = pool.allocate(device, &layouts)?;

        Ok(Self { layout, pool, sets })
    }

    /// The shared set layout (for pipeline layout creation).
    pub fn layout(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// The descriptor set for a frame slot.
    pub fn set(&self, frame_index: usize) -> vk::DescriptorSet {
        self.sets[frame_index]
    }

    /// Number of per-slot sets.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether no sets were allocated.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Rewrite both bindings of every frame slot's set.
    ///
    /// A texture change must refresh all slots, not just the current one,
    /// because any slot may be selected for the next frame.
    ///
    /// # Safety
    /// The device, uniform buffers, image view, and sampler must be valid,
    /// and no referencing frame may be in flight.
    pub unsafe fn write_all(
        &self,
        device: &ash::Device,
        uniforms: &FrameUniforms,
        texture_view: vk::ImageView,
        sampler: vk::Sampler,
    ) {
        let image_info = vk::DescriptorImageInfo::default()
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .image_view(texture_view)
            .sampler(sampler);

        for (i, &set) in self.sets.iter().enumerate() {
            let buffer_info = vk::DescriptorBufferInfo::default()
                .buffer(uniforms.buffer(i))
                .offset(0)
                .range(uniforms.slot_size());

            let writes = [
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(std::slice::from_ref(&buffer_info)),
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(1)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(std::slice::from_ref(&image_info)),
            ];

            device.update_descriptor_sets(&writes, &[]);
        }
    }

    /// Destroy the pool and layout.
    ///
    /// # Safety
    /// The device must be valid and no set may be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        self.pool.destroy(device);
        device.destroy_descriptor_set_layout(self.layout, None);
    }
}
