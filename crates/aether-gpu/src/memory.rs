//! GPU memory management.
//!
//! Single point of buffer/image allocation. Every allocation follows the
//! same protocol: create the object, query its memory requirements, resolve
//! a compatible memory type through the device context, allocate, bind.
//! Buffer+memory and image+memory are owned as single values and released
//! together.

use crate::command::CommandPool;
use crate::context::DeviceContext;
use crate::error::{GpuError, Result};
use ash::vk;
use std::sync::Arc;

/// A GPU buffer paired with its backing allocation.
///
/// Created bound; destroyed as a unit via [`MemoryManager::destroy_buffer`].
pub struct GpuBuffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
}

/// A GPU image paired with its backing allocation.
pub struct GpuImage {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub format: vk::Format,
    pub extent: vk::Extent3D,
}

/// Owner of device memory, buffers, images, and the upload path.
///
/// Mutated only from the single rendering thread; the frame renderer and
/// resource loaders hold it by reference.
pub struct MemoryManager {
    device: Arc<ash::Device>,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    transfer_queue: vk::Queue,
    transfer_pool: CommandPool,
}

impl MemoryManager {
    /// Create a memory manager for the given device context.
    ///
    /// Builds the transient command pool used by the single-time command
    /// helper on the transfer family.
    pub fn new(gpu: &DeviceContext) -> Result<Self> {
        let transfer_pool =
            unsafe { CommandPool::transient(gpu.device(), gpu.queue_families().transfer) }?;

        Ok(Self {
            device: gpu.device_arc(),
            memory_properties: *gpu.memory_properties(),
            transfer_queue: gpu.transfer_queue(),
            transfer_pool,
        })
    }

    /// Get the device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub(crate) fn transfer_queue(&self) -> vk::Queue {
        self.transfer_queue
    }

    pub(crate) fn transfer_pool(&self) -> &CommandPool {
        &self.transfer_pool
    }

    /// Resolve a memory type index for an allocation.
    fn memory_type_for(
        &self,
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<u32> {
        crate::context::find_memory_type(&self.memory_properties, type_bits, properties).ok_or(
            GpuError::NoCompatibleMemoryType {
                type_bits,
                properties,
            },
        )
    }

    /// Allocate a bound buffer.
    ///
    /// Fails with the surfaced creation/allocation error when no compatible
    /// memory type exists or any call returns non-success; never retried.
    pub fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<GpuBuffer> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            self.device
                .create_buffer(&buffer_info, None)
                .map_err(GpuError::for_op("vkCreateBuffer"))?
        };

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let memory = match self.allocate(&requirements, properties) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        unsafe {
            if let Err(e) = self.device.bind_buffer_memory(buffer, memory, 0) {
                self.device.destroy_buffer(buffer, None);
                self.device.free_memory(memory, None);
                return Err(GpuError::for_op("vkBindBufferMemory")(e));
            }
        }

        Ok(GpuBuffer {
            buffer,
            memory,
            size,
        })
    }

    /// Destroy a buffer and its memory together.
    pub fn destroy_buffer(&self, buffer: GpuBuffer) {
        unsafe {
            self.device.destroy_buffer(buffer.buffer, None);
            self.device.free_memory(buffer.memory, None);
        }
    }

    /// Allocate a bound image.
    pub fn create_image(
        &self,
        create_info: &vk::ImageCreateInfo,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<GpuImage> {
        let image = unsafe {
            self.device
                .create_image(create_info, None)
                .map_err(GpuError::for_op("vkCreateImage"))?
        };

        let requirements = unsafe { self.device.get_image_memory_requirements(image) };

        let memory = match self.allocate(&requirements, properties) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        unsafe {
            if let Err(e) = self.device.bind_image_memory(image, memory, 0) {
                self.device.destroy_image(image, None);
                self.device.free_memory(memory, None);
                return Err(GpuError::for_op("vkBindImageMemory")(e));
            }
        }

        Ok(GpuImage {
            image,
            memory,
            format: create_info.format,
            extent: create_info.extent,
        })
    }

    /// Destroy an image and its memory together.
    pub fn destroy_image(&self, image: GpuImage) {
        unsafe {
            self.device.destroy_image(image.image, None);
            self.device.free_memory(image.memory, None);
        }
    }

    fn allocate(
        &self,
        requirements: &vk::MemoryRequirements,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<vk::DeviceMemory> {
        let memory_type = self.memory_type_for(requirements.memory_type_bits, properties)?;

        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);

        unsafe {
            self.device
                .allocate_memory(&alloc_info, None)
                .map_err(GpuError::for_op("vkAllocateMemory"))
        }
    }

    /// Map a host-visible buffer's whole range.
    ///
    /// # Safety
    /// The buffer must be host-visible and not currently mapped.
    pub(crate) unsafe fn map(&self, buffer: &GpuBuffer) -> Result<*mut u8> {
        let ptr = self
            .device
            .map_memory(buffer.memory, 0, buffer.size, vk::MemoryMapFlags::empty())
            .map_err(GpuError::for_op("vkMapMemory"))?;
        Ok(ptr.cast())
    }

    /// Unmap a previously mapped buffer.
    ///
    /// # Safety
    /// The buffer must be mapped.
    pub(crate) unsafe fn unmap(&self, buffer: &GpuBuffer) {
        self.device.unmap_memory(buffer.memory);
    }

    /// Destroy the transfer pool.
    ///
    /// Call after all uploads are complete and before the device context is
    /// dropped.
    ///
    /// # Safety
    /// No single-time commands may be in flight.
    pub unsafe fn destroy(&self) {
        self.transfer_pool.destroy(&self.device);
    }
}

/// Per-frame uniform buffers, persistently mapped for the process lifetime.
///
/// One host-visible, host-coherent buffer per frame-in-flight slot. Each is
/// mapped once at creation so a per-frame update is a plain memory copy;
/// memory is unmapped only at destruction.
pub struct FrameUniforms {
    buffers: Vec<GpuBuffer>,
    mapped: Vec<*mut u8>,
    size: vk::DeviceSize,
}

impl FrameUniforms {
    /// Create and map one uniform buffer per frame slot.
    pub fn new(memory: &MemoryManager, frames_in_flight: usize, size: vk::DeviceSize) -> Result<Self> {
        let mut buffers = Vec::with_capacity(frames_in_flight);
        let mut mapped = Vec::with_capacity(frames_in_flight);

        for _ in 0..frames_in_flight {
            let buffer = memory.create_buffer(
                size,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            )?;
            let ptr = unsafe { memory.map(&buffer) }?;

            buffers.push(buffer);
            mapped.push(ptr);
        }

        Ok(Self {
            buffers,
            mapped,
            size,
        })
    }

    /// Number of per-frame buffers.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether no buffers were created.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Byte size of each buffer.
    pub fn slot_size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Raw buffer handle for a frame slot (for descriptor writes).
    pub fn buffer(&self, frame_index: usize) -> vk::Buffer {
        self.buffers[frame_index].buffer
    }

    /// Copy `data` into the slot's mapped memory.
    ///
    /// The caller must have waited on the slot's in-flight fence; that wait
    /// is the only synchronization between this write and GPU reads.
    pub fn write(&self, frame_index: usize, data: &[u8]) -> Result<()> {
        if data.len() as vk::DeviceSize > self.size {
            return Err(GpuError::InvalidState(
                "Uniform data larger than buffer".to_string(),
            ));
        }

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.mapped[frame_index], data.len());
        }
        Ok(())
    }

    /// Unmap and destroy all buffers.
    ///
    /// # Safety
    /// No frame may still be reading the buffers.
    pub unsafe fn destroy(self, memory: &MemoryManager) {
        for buffer in self.buffers {
            memory.unmap(&buffer);
            memory.destroy_buffer(buffer);
        }
    }
}
