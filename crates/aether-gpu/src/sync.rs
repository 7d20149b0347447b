//! Frame-in-flight synchronization.

use crate::command::CommandPool;
use crate::error::{GpuError, Result};
use ash::vk;

/// Create a semaphore.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    device
        .create_semaphore(&create_info, None)
        .map_err(GpuError::for_op("vkCreateSemaphore"))
}

/// Create a fence, optionally pre-signaled.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    device
        .create_fence(&create_info, None)
        .map_err(GpuError::for_op("vkCreateFence"))
}

/// Wait for a fence to be signaled.
///
/// # Safety
/// The device and fence must be valid.
pub unsafe fn wait_for_fence(device: &ash::Device, fence: vk::Fence, timeout_ns: u64) -> Result<()> {
    device.wait_for_fences(&[fence], true, timeout_ns)?;
    Ok(())
}

/// Reset a fence to the unsignaled state.
///
/// # Safety
/// The device and fence must be valid.
pub unsafe fn reset_fence(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    device.reset_fences(&[fence])?;
    Ok(())
}

/// One frame-in-flight slot.
///
/// Owns the command buffer re-recorded each time the slot comes around, the
/// semaphore the GPU waits on before color writes, the semaphore presented
/// frames wait on, and the fence the CPU must observe signaled before
/// touching the command buffer or the slot's uniform buffer again.
pub struct FrameSlot {
    /// Command buffer re-recorded every time this slot is reused.
    pub command_buffer: vk::CommandBuffer,
    /// Signaled by acquire when the swapchain image is ready.
    pub image_available: vk::Semaphore,
    /// Signaled by the graphics submission; present waits on it.
    pub render_finished: vk::Semaphore,
    /// Signaled when the slot's last submission completes on the GPU.
    pub in_flight: vk::Fence,
}

impl FrameSlot {
    /// Create a slot with its command buffer allocated from `pool`.
    ///
    /// The fence starts signaled so the first wait does not block.
    ///
    /// # Safety
    /// The device and pool must be valid.
    unsafe fn new(device: &ash::Device, pool: &CommandPool) -> Result<Self> {
        Ok(Self {
            command_buffer: pool.allocate(device, 1)?[0],
            image_available: create_semaphore(device)?,
            render_finished: create_semaphore(device)?,
            in_flight: create_fence(device, true)?,
        })
    }

    /// Block until this slot's previous submission has completed.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn wait(&self, device: &ash::Device) -> Result<()> {
        wait_for_fence(device, self.in_flight, u64::MAX)
    }

    /// Reset the fence for the next submission.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn reset(&self, device: &ash::Device) -> Result<()> {
        reset_fence(device, self.in_flight)
    }

    /// Destroy the slot's synchronization primitives.
    ///
    /// The command buffer is reclaimed with its pool.
    ///
    /// # Safety
    /// The device must be valid and the slot must not be in use.
    unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_semaphore(self.image_available, None);
        device.destroy_semaphore(self.render_finished, None);
        device.destroy_fence(self.in_flight, None);
    }
}

/// Ring of frame slots bounding CPU-ahead-of-GPU distance.
///
/// With F slots, the fence wait at the top of the frame loop permits at
/// most F-1 frames of CPU/GPU overlap.
pub struct FrameSlots {
    slots: Vec<FrameSlot>,
    current: usize,
}

impl FrameSlots {
    /// Create `frames_in_flight` slots with command buffers from `pool`.
    ///
    /// # Safety
    /// The device and pool must be valid.
    pub unsafe fn new(
        device: &ash::Device,
        pool: &CommandPool,
        frames_in_flight: usize,
    ) -> Result<Self> {
        let mut slots = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            slots.push(FrameSlot::new(device, pool)?);
        }

        Ok(Self { slots, current: 0 })
    }

    /// The current slot.
    pub fn current(&self) -> &FrameSlot {
        &self.slots[self.current]
    }

    /// Index of the current slot.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether there are no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Advance to the next slot, wrapping modulo the slot count.
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
    }

    /// Wait for every slot's in-flight submission.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn wait_all(&self, device: &ash::Device) -> Result<()> {
        for slot in &self.slots {
            slot.wait(device)?;
        }
        Ok(())
    }

    /// Destroy all slots' synchronization primitives.
    ///
    /// # Safety
    /// The device must be valid and no slot may be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        for slot in &self.slots {
            slot.destroy(device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots_with(count: usize) -> FrameSlots {
        let slots = (0..count)
            .map(|_| FrameSlot {
                command_buffer: vk::CommandBuffer::null(),
                image_available: vk::Semaphore::null(),
                render_finished: vk::Semaphore::null(),
                in_flight: vk::Fence::null(),
            })
            .collect();
        FrameSlots { slots, current: 0 }
    }

    #[test]
    fn advance_wraps_modulo_slot_count() {
        let mut slots = slots_with(2);
        assert_eq!(slots.current_index(), 0);

        slots.advance();
        assert_eq!(slots.current_index(), 1);

        slots.advance();
        assert_eq!(slots.current_index(), 0);

        // F+1 advances land back on slot 1
        slots.advance();
        assert_eq!(slots.current_index(), 1);
    }

    #[test]
    fn three_slots_cycle() {
        let mut slots = slots_with(3);
        let seen: Vec<usize> = (0..7)
            .map(|_| {
                let i = slots.current_index();
                slots.advance();
                i
            })
            .collect();
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0]);
    }
}
