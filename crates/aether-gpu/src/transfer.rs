//! CPU-to-GPU upload path and image layout transitions.
//!
//! The upload protocol: stage the payload in a host-visible buffer, record a
//! one-time command buffer copying staging into the device-local
//! destination, submit on the transfer queue, and block until that queue is
//! idle before freeing the staging buffer. Non-pipelined but safe; batching
//! multiple copies into one command buffer preserves the same ordering
//! contract.

use crate::command::execute_single_time_commands;
use crate::error::{GpuError, Result};
use crate::memory::{GpuBuffer, GpuImage, MemoryManager};
use ash::vk;

/// Source/destination masks and stages for one supported layout transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionMasks {
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

/// Look up barrier masks for an image layout transition.
///
/// The table is intentionally exhaustive over the transitions this engine
/// performs; any other pair is a programming error, not a runtime
/// condition.
pub fn transition_masks(
    from: vk::ImageLayout,
    to: vk::ImageLayout,
) -> Result<TransitionMasks> {
    if from == vk::ImageLayout::UNDEFINED && to == vk::ImageLayout::TRANSFER_DST_OPTIMAL {
        return Ok(TransitionMasks {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        });
    }

    if from == vk::ImageLayout::TRANSFER_DST_OPTIMAL
        && to == vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
    {
        return Ok(TransitionMasks {
            src_access: vk::AccessFlags::TRANSFER_WRITE,
            dst_access: vk::AccessFlags::SHADER_READ,
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        });
    }

    Err(GpuError::UnsupportedLayoutTransition { from, to })
}

impl MemoryManager {
    /// Create a host-visible staging buffer filled with `data`.
    fn create_staging_buffer(&self, data: &[u8]) -> Result<GpuBuffer> {
        let staging = self.create_buffer(
            data.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        unsafe {
            let ptr = self.map(&staging)?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, data.len());
            self.unmap(&staging);
        }

        Ok(staging)
    }

    /// Record a full-size buffer-to-buffer copy and wait for it.
    pub fn copy_buffer(
        &self,
        src: &GpuBuffer,
        dst: &GpuBuffer,
        size: vk::DeviceSize,
    ) -> Result<()> {
        let device = self.device();
        unsafe {
            execute_single_time_commands(device, self.transfer_pool(), self.transfer_queue(), |cmd| {
                let region = vk::BufferCopy::default().size(size);
                device.cmd_copy_buffer(cmd, src.buffer, dst.buffer, &[region]);
            })
        }
    }

    /// Create a device-local buffer and upload `data` into it via staging.
    ///
    /// `usage` needs only the final usage bits; TRANSFER_DST is added here.
    pub fn create_device_local_buffer(
        &self,
        data: &[u8],
        usage: vk::BufferUsageFlags,
    ) -> Result<GpuBuffer> {
        let size = data.len() as vk::DeviceSize;
        let staging = self.create_staging_buffer(data)?;

        let buffer = match self.create_buffer(
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ) {
            Ok(buffer) => buffer,
            Err(e) => {
                self.destroy_buffer(staging);
                return Err(e);
            }
        };

        let copied = self.copy_buffer(&staging, &buffer, size);
        self.destroy_buffer(staging);

        match copied {
            Ok(()) => Ok(buffer),
            Err(e) => {
                self.destroy_buffer(buffer);
                Err(e)
            }
        }
    }

    /// Upload `data` into a device-local image.
    ///
    /// Performs the two bracketing layout transitions around the
    /// buffer-to-image copy: undefined to transfer-destination before, then
    /// transfer-destination to shader-read-only after. The image is left
    /// ready for sampling.
    pub fn upload_image(
        &self,
        image: &GpuImage,
        data: &[u8],
        width: u32,
        height: u32,
    ) -> Result<()> {
        let staging = self.create_staging_buffer(data)?;

        let result = (|| {
            self.transition_image_layout(
                image,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            )?;
            self.copy_buffer_to_image(&staging, image, width, height)?;
            self.transition_image_layout(
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )
        })();

        self.destroy_buffer(staging);
        result
    }

    /// Record a pipeline barrier switching the image between layouts.
    ///
    /// Only the transitions in [`transition_masks`] are supported; an
    /// unrecognized pair fails before any command is recorded.
    pub fn transition_image_layout(
        &self,
        image: &GpuImage,
        from: vk::ImageLayout,
        to: vk::ImageLayout,
    ) -> Result<()> {
        let masks = transition_masks(from, to)?;
        let device = self.device();

        unsafe {
            execute_single_time_commands(device, self.transfer_pool(), self.transfer_queue(), |cmd| {
                let barrier = vk::ImageMemoryBarrier::default()
                    .old_layout(from)
                    .new_layout(to)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(image.image)
                    .subresource_range(
                        vk::ImageSubresourceRange::default()
                            .aspect_mask(vk::ImageAspectFlags::COLOR)
                            .base_mip_level(0)
                            .level_count(1)
                            .base_array_layer(0)
                            .layer_count(1),
                    )
                    .src_access_mask(masks.src_access)
                    .dst_access_mask(masks.dst_access);

                device.cmd_pipeline_barrier(
                    cmd,
                    masks.src_stage,
                    masks.dst_stage,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[barrier],
                );
            })
        }
    }

    /// Record a tightly packed buffer-to-image copy and wait for it.
    ///
    /// The image must already be in transfer-destination layout.
    pub fn copy_buffer_to_image(
        &self,
        buffer: &GpuBuffer,
        image: &GpuImage,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let device = self.device();

        unsafe {
            execute_single_time_commands(device, self.transfer_pool(), self.transfer_queue(), |cmd| {
                let region = vk::BufferImageCopy::default()
                    .buffer_offset(0)
                    .buffer_row_length(0)
                    .buffer_image_height(0)
                    .image_subresource(
                        vk::ImageSubresourceLayers::default()
                            .aspect_mask(vk::ImageAspectFlags::COLOR)
                            .mip_level(0)
                            .base_array_layer(0)
                            .layer_count(1),
                    )
                    .image_offset(vk::Offset3D::default())
                    .image_extent(vk::Extent3D {
                        width,
                        height,
                        depth: 1,
                    });

                device.cmd_copy_buffer_to_image(
                    cmd,
                    buffer.buffer,
                    image.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );
            })
        }
    }

    /// Read a device-local buffer back to host memory.
    ///
    /// Copies into a transient host-visible buffer via the single-time
    /// protocol, then maps and copies out. The source buffer must carry
    /// TRANSFER_SRC usage.
    pub fn read_back_buffer(&self, src: &GpuBuffer, size: vk::DeviceSize) -> Result<Vec<u8>> {
        let readback = self.create_buffer(
            size,
            vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        let result = (|| {
            self.copy_buffer(src, &readback, size)?;

            let mut data = vec![0u8; size as usize];
            unsafe {
                let ptr = self.map(&readback)?;
                std::ptr::copy_nonoverlapping(ptr, data.as_mut_ptr(), size as usize);
                self.unmap(&readback);
            }
            Ok(data)
        })();

        self.destroy_buffer(readback);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_to_transfer_dst_supported() {
        let masks = transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )
        .unwrap();

        assert_eq!(masks.src_access, vk::AccessFlags::empty());
        assert_eq!(masks.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(masks.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::TRANSFER);
    }

    #[test]
    fn transfer_dst_to_shader_read_supported() {
        let masks = transition_masks(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();

        assert_eq!(masks.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(masks.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(masks.src_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn unknown_transitions_rejected() {
        let pairs = [
            (
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::ImageLayout::UNDEFINED,
            ),
            (
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ),
            (
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            ),
        ];

        for (from, to) in pairs {
            let err = transition_masks(from, to).unwrap_err();
            assert!(matches!(
                err,
                GpuError::UnsupportedLayoutTransition { .. }
            ));
        }
    }
}
