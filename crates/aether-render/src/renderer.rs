//! The frame renderer: pipeline objects, frame slots, and the draw loop.

use aether_gpu::command::{submit_command_buffers, CommandPool};
use aether_gpu::context::DeviceContext;
use aether_gpu::descriptors::FrameDescriptors;
use aether_gpu::memory::{FrameUniforms, MemoryManager};
use aether_gpu::pipeline::{
    create_framebuffers, create_render_pass, GraphicsPipeline, GraphicsPipelineConfig,
};
use aether_gpu::surface::SurfaceContext;
use aether_gpu::swapchain::{AcquireResult, Swapchain};
use aether_gpu::sync::FrameSlots;
use aether_gpu::Result;
use ash::vk;

use crate::mesh::{Drawable, GeometryBuffers};
use crate::uniforms::SceneUniforms;
use crate::vertex::Vertex;

/// Number of frames the CPU may record ahead of the GPU.
///
/// The single definition; every per-frame array (command buffers, uniform
/// buffers, descriptor sets) is sized from it.
pub const FRAMES_IN_FLIGHT: usize = 2;

/// Outcome of one `draw_frame` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was submitted and presented.
    Rendered,
    /// The surface was stale; the swapchain was resynchronized and this
    /// tick drew nothing.
    SkippedStale,
}

/// Owns the render pass, pipeline, framebuffers, and per-frame slots, and
/// drives the acquire/record/submit/present loop.
///
/// Borrows the device context, surface, swapchain, and memory manager per
/// call; all of them must outlive the renderer.
pub struct FrameRenderer {
    render_pass: vk::RenderPass,
    pipeline: GraphicsPipeline,
    framebuffers: Vec<vk::Framebuffer>,
    graphics_pool: CommandPool,
    slots: FrameSlots,
    uniforms: FrameUniforms,
    descriptors: FrameDescriptors,
    extent: vk::Extent2D,
}

impl FrameRenderer {
    /// Create the renderer for the given swapchain.
    ///
    /// `vertex_shader` and `fragment_shader` are validated SPIR-V words.
    /// [`FrameRenderer::set_texture`] must be called before the first
    /// `draw_frame` so the sampler binding of every descriptor set is
    /// written.
    pub fn new(
        gpu: &DeviceContext,
        swapchain: &Swapchain,
        memory: &MemoryManager,
        vertex_shader: Vec<u32>,
        fragment_shader: Vec<u32>,
    ) -> Result<Self> {
        let device = gpu.device();

        unsafe {
            let render_pass = create_render_pass(device, swapchain.format)?;

            let descriptors = FrameDescriptors::new(device, FRAMES_IN_FLIGHT)?;

            let config = GraphicsPipelineConfig {
                vertex_shader,
                fragment_shader,
                vertex_bindings: vec![Vertex::binding_description()],
                vertex_attributes: Vertex::attribute_descriptions().to_vec(),
                ..Default::default()
            };
            let pipeline =
                GraphicsPipeline::new(device, &config, render_pass, &[descriptors.layout()])?;

            let framebuffers =
                create_framebuffers(device, render_pass, &swapchain.image_views, swapchain.extent)?;

            let graphics_pool = CommandPool::primary(device, gpu.queue_families().graphics)?;
            let slots = FrameSlots::new(device, &graphics_pool, FRAMES_IN_FLIGHT)?;

            let uniforms = FrameUniforms::new(memory, FRAMES_IN_FLIGHT, SceneUniforms::SIZE)?;

            tracing::info!(
                "Renderer created: {} framebuffers, {} frames in flight",
                framebuffers.len(),
                FRAMES_IN_FLIGHT
            );

            Ok(Self {
                render_pass,
                pipeline,
                framebuffers,
                graphics_pool,
                slots,
                uniforms,
                descriptors,
                extent: swapchain.extent,
            })
        }
    }

    /// Current render extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Number of frame slots.
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Point every frame slot's sampler binding at a texture.
    ///
    /// Rewrites both bindings of all slots' sets, because any slot may be
    /// selected for the next frame. Blocks on all in-flight fences first so
    /// no referencing submission is still executing.
    pub fn set_texture(
        &self,
        gpu: &DeviceContext,
        texture_view: vk::ImageView,
        sampler: vk::Sampler,
    ) -> Result<()> {
        let device = gpu.device();
        unsafe {
            self.slots.wait_all(device)?;
            self.descriptors
                .write_all(device, &self.uniforms, texture_view, sampler);
        }
        Ok(())
    }

    /// Draw one frame.
    ///
    /// Waits on the current slot's fence, acquires an image, re-records the
    /// slot's command buffer over `drawables`, updates the slot's uniform
    /// buffer from `scene`, submits, and presents. A stale surface at
    /// acquire resynchronizes the swapchain (and framebuffers) and skips
    /// the tick; a stale result at present resynchronizes for the *next*
    /// acquire, since the shown frame used the old images either way.
    ///
    /// `drawable_size` is the window's current drawable size, consulted
    /// only during resynchronization.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_frame(
        &mut self,
        gpu: &DeviceContext,
        surface: &SurfaceContext,
        swapchain: &mut Swapchain,
        geometry: &GeometryBuffers,
        drawables: &[Drawable],
        scene: &SceneUniforms,
        drawable_size: (u32, u32),
    ) -> Result<FrameOutcome> {
        let device = gpu.device();

        // 1. Block until the GPU has released this slot's resources
        unsafe {
            self.slots.current().wait(device)?;
        }

        // 2. Acquire; a stale surface means resynchronize and skip this tick
        let acquired = unsafe {
            swapchain.acquire_next_image(
                &surface.swapchain_loader,
                self.slots.current().image_available,
                u64::MAX,
            )?
        };
        let (image_index, suboptimal) = match acquired {
            AcquireResult::Acquired { index, suboptimal } => (index, suboptimal),
            AcquireResult::OutOfDate => {
                self.resync_swapchain(gpu, surface, swapchain, drawable_size)?;
                return Ok(FrameOutcome::SkippedStale);
            }
        };

        // Reset the fence only after a successful acquire, so a skipped
        // tick leaves the slot immediately reusable
        unsafe {
            self.slots.current().reset(device)?;
        }

        let slot_index = self.slots.current_index();
        let command_buffer = self.slots.current().command_buffer;

        // 3. Re-record this slot's command buffer
        unsafe {
            device.reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())?;
            self.record_commands(device, command_buffer, image_index, slot_index, geometry, drawables)?;
        }

        // 4. Update this slot's persistently mapped uniform buffer
        self.uniforms.write(slot_index, scene.as_bytes())?;

        // 5. Submit: wait for the image at color output, signal
        //    render-finished and this slot's fence
        let wait_semaphores = [self.slots.current().image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.slots.current().render_finished];
        let command_buffers = [command_buffer];

        unsafe {
            submit_command_buffers(
                device,
                gpu.graphics_queue(),
                &command_buffers,
                &wait_semaphores,
                &wait_stages,
                &signal_semaphores,
                self.slots.current().in_flight,
            )?;
        }

        // 6. Present; staleness here affects the next acquire, not this one
        let present_stale = unsafe {
            swapchain.present(
                &surface.swapchain_loader,
                gpu.present_queue(),
                image_index,
                &signal_semaphores,
            )?
        };

        if present_stale || suboptimal {
            self.resync_swapchain(gpu, surface, swapchain, drawable_size)?;
        }

        // 7. Advance the slot ring
        self.slots.advance();

        Ok(FrameOutcome::Rendered)
    }

    /// Handle an explicit resize event.
    pub fn handle_resize(
        &mut self,
        gpu: &DeviceContext,
        surface: &SurfaceContext,
        swapchain: &mut Swapchain,
        drawable_size: (u32, u32),
    ) -> Result<()> {
        self.resync_swapchain(gpu, surface, swapchain, drawable_size)
    }

    /// Stop-the-world swapchain rebuild plus all image-count-sized state.
    ///
    /// The pipeline is kept: the recreated pass is assumed render-pass
    /// compatible (same format selection against unchanged formats), which
    /// is not re-verified.
    fn resync_swapchain(
        &mut self,
        gpu: &DeviceContext,
        surface: &SurfaceContext,
        swapchain: &mut Swapchain,
        drawable_size: (u32, u32),
    ) -> Result<()> {
        let device = gpu.device();

        unsafe {
            surface.recreate_swapchain(gpu, swapchain, drawable_size.0, drawable_size.1)?;

            for framebuffer in self.framebuffers.drain(..) {
                device.destroy_framebuffer(framebuffer, None);
            }
            self.framebuffers = create_framebuffers(
                device,
                self.render_pass,
                &swapchain.image_views,
                swapchain.extent,
            )?;
        }

        self.extent = swapchain.extent;
        Ok(())
    }

    /// Record the render pass for one frame.
    ///
    /// # Safety
    /// The command buffer must be reset and not in use by the GPU.
    unsafe fn record_commands(
        &self,
        device: &ash::Device,
        command_buffer: vk::CommandBuffer,
        image_index: u32,
        slot_index: usize,
        geometry: &GeometryBuffers,
        drawables: &[Drawable],
    ) -> Result<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        device.begin_command_buffer(command_buffer, &begin_info)?;

        let clear_color = vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
        };

        let render_pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass)
            .framebuffer(self.framebuffers[image_index as usize])
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: self.extent,
            })
            .clear_values(std::slice::from_ref(&clear_color));

        device.cmd_begin_render_pass(command_buffer, &render_pass_info, vk::SubpassContents::INLINE);
        device.cmd_bind_pipeline(
            command_buffer,
            vk::PipelineBindPoint::GRAPHICS,
            self.pipeline.pipeline,
        );

        // Dynamic viewport/scissor from the current extent
        let viewport = vk::Viewport::default()
            .x(0.0)
            .y(0.0)
            .width(self.extent.width as f32)
            .height(self.extent.height as f32)
            .min_depth(0.0)
            .max_depth(1.0);
        device.cmd_set_viewport(command_buffer, 0, &[viewport]);

        let scissor = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent: self.extent,
        };
        device.cmd_set_scissor(command_buffer, 0, &[scissor]);

        device.cmd_bind_descriptor_sets(
            command_buffer,
            vk::PipelineBindPoint::GRAPHICS,
            self.pipeline.layout,
            0,
            &[self.descriptors.set(slot_index)],
            &[],
        );

        for drawable in drawables {
            device.cmd_bind_vertex_buffers(
                command_buffer,
                0,
                &[geometry.vertex_buffer()],
                &[drawable.vertex_offset],
            );
            device.cmd_bind_index_buffer(
                command_buffer,
                geometry.index_buffer(),
                drawable.index_offset,
                vk::IndexType::UINT16,
            );
            device.cmd_draw_indexed(command_buffer, drawable.index_count, 1, 0, 0, 0);
        }

        device.cmd_end_render_pass(command_buffer);
        device.end_command_buffer(command_buffer)?;

        Ok(())
    }

    /// Destroy all renderer-owned resources.
    ///
    /// Waits for the device to go idle first; call before the memory
    /// manager and device context are torn down.
    pub fn destroy(self, gpu: &DeviceContext, memory: &MemoryManager) -> Result<()> {
        gpu.wait_idle()?;
        let device = gpu.device();

        unsafe {
            for framebuffer in &self.framebuffers {
                device.destroy_framebuffer(*framebuffer, None);
            }
            self.pipeline.destroy(device);
            device.destroy_render_pass(self.render_pass, None);
            self.descriptors.destroy(device);
            self.slots.destroy(device);
            self.graphics_pool.destroy(device);
            self.uniforms.destroy(memory);
        }

        Ok(())
    }
}
