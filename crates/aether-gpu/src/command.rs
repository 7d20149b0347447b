//! Command pool and submission helpers.

use crate::error::{GpuError, Result};
use ash::vk;

/// Command pool bound to one queue family.
pub struct CommandPool {
    pool: vk::CommandPool,
    queue_family: u32,
}

impl CommandPool {
    /// Create a pool for long-lived, individually resettable command
    /// buffers (per-frame recording).
    ///
    /// # Safety
    /// The device must be valid and the queue family must exist.
    pub unsafe fn primary(device: &ash::Device, queue_family: u32) -> Result<Self> {
        Self::with_flags(
            device,
            queue_family,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )
    }

    /// Create a transient pool for short-lived one-shot command buffers
    /// (uploads, layout transitions).
    ///
    /// # Safety
    /// The device must be valid and the queue family must exist.
    pub unsafe fn transient(device: &ash::Device, queue_family: u32) -> Result<Self> {
        Self::with_flags(
            device,
            queue_family,
            vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )
    }

    unsafe fn with_flags(
        device: &ash::Device,
        queue_family: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> Result<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(flags);

        let pool = device
            .create_command_pool(&create_info, None)
            .map_err(GpuError::for_op("vkCreateCommandPool"))?;

        Ok(Self { pool, queue_family })
    }

    /// Get the raw pool handle.
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Get the queue family index.
    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// Allocate primary command buffers from this pool.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn allocate(&self, device: &ash::Device, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        let buffers = device
            .allocate_command_buffers(&alloc_info)
            .map_err(GpuError::for_op("vkAllocateCommandBuffers"))?;
        Ok(buffers)
    }

    /// Destroy the command pool.
    ///
    /// # Safety
    /// The device must be valid and the pool must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_command_pool(self.pool, None);
    }
}

/// Submit command buffers to a queue with semaphore/fence plumbing.
///
/// # Safety
/// All handles must be valid.
pub unsafe fn submit_command_buffers(
    device: &ash::Device,
    queue: vk::Queue,
    command_buffers: &[vk::CommandBuffer],
    wait_semaphores: &[vk::Semaphore],
    wait_stages: &[vk::PipelineStageFlags],
    signal_semaphores: &[vk::Semaphore],
    fence: vk::Fence,
) -> Result<()> {
    let submit_info = vk::SubmitInfo::default()
        .command_buffers(command_buffers)
        .wait_semaphores(wait_semaphores)
        .wait_dst_stage_mask(wait_stages)
        .signal_semaphores(signal_semaphores);

    device.queue_submit(queue, &[submit_info], fence)?;
    Ok(())
}

/// Record and run a one-shot command buffer, blocking until it completes.
///
/// Allocates from `pool`, records via `f`, submits on `queue`, then waits
/// for that same queue to go idle before freeing the buffer. The full stall
/// guarantees anything the commands read (staging memory) can be freed
/// immediately afterwards. A fence pool would allow overlap here; the stall
/// is the chosen correctness-first behavior.
///
/// # Safety
/// All handles must be valid, and `queue` must belong to the pool's family.
pub unsafe fn execute_single_time_commands<F>(
    device: &ash::Device,
    pool: &CommandPool,
    queue: vk::Queue,
    f: F,
) -> Result<()>
where
    F: FnOnce(vk::CommandBuffer),
{
    let cmd = pool.allocate(device, 1)?[0];

    let begin_info = vk::CommandBufferBeginInfo::default()
        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
    device.begin_command_buffer(cmd, &begin_info)?;
    f(cmd);
    device.end_command_buffer(cmd)?;

    let cmd_buffers = [cmd];
    let submit_info = vk::SubmitInfo::default().command_buffers(&cmd_buffers);
    device.queue_submit(queue, &[submit_info], vk::Fence::null())?;
    // Wait on the queue the work was submitted to
    device.queue_wait_idle(queue)?;

    device.free_command_buffers(pool.handle(), &cmd_buffers);

    Ok(())
}
