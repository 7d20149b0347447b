//! Presentable surface management.
//!
//! Wraps the Vulkan surface and the extension loaders needed to build and
//! recreate swapchains for it.

use crate::context::DeviceContext;
use crate::error::Result;
use crate::swapchain::{calculate_extent, select_present_mode, select_surface_format, Swapchain};
use ash::vk;

/// Surface context for windowed rendering.
///
/// Created together with the [`DeviceContext`]; must be destroyed before the
/// device context is dropped.
pub struct SurfaceContext {
    /// The Vulkan surface handle.
    pub surface: vk::SurfaceKHR,
    /// Surface extension loader.
    pub surface_loader: ash::khr::surface::Instance,
    /// Swapchain extension loader.
    pub swapchain_loader: ash::khr::swapchain::Device,
}

impl SurfaceContext {
    pub(crate) fn new(
        surface: vk::SurfaceKHR,
        surface_loader: ash::khr::surface::Instance,
        swapchain_loader: ash::khr::swapchain::Device,
    ) -> Self {
        Self {
            surface,
            surface_loader,
            swapchain_loader,
        }
    }

    /// Query surface capabilities, formats, and present modes.
    pub fn capabilities(&self, gpu: &DeviceContext) -> Result<SurfaceCapabilities> {
        unsafe {
            let caps = self
                .surface_loader
                .get_physical_device_surface_capabilities(gpu.physical_device(), self.surface)?;

            let formats = self
                .surface_loader
                .get_physical_device_surface_formats(gpu.physical_device(), self.surface)?;

            let present_modes = self
                .surface_loader
                .get_physical_device_surface_present_modes(gpu.physical_device(), self.surface)?;

            Ok(SurfaceCapabilities {
                capabilities: caps,
                formats,
                present_modes,
            })
        }
    }

    /// Create a swapchain for this surface.
    ///
    /// `width` and `height` are the current drawable size, used only when
    /// the surface capabilities leave the extent up to the window.
    ///
    /// # Safety
    /// The device context must be valid.
    pub unsafe fn create_swapchain(
        &self,
        gpu: &DeviceContext,
        width: u32,
        height: u32,
    ) -> Result<Swapchain> {
        let caps = self.capabilities(gpu)?;

        let surface_format = select_surface_format(&caps.formats);
        let present_mode = select_present_mode(&caps.present_modes);
        let extent = calculate_extent(&caps.capabilities, width, height);

        Swapchain::new(
            gpu.device(),
            &self.swapchain_loader,
            self.surface,
            &caps.capabilities,
            surface_format,
            present_mode,
            extent,
            gpu.queue_families(),
        )
    }

    /// Tear down and rebuild the swapchain.
    ///
    /// Synchronous stop-the-world operation: blocks until the device is
    /// idle, destroys the old views and swapchain, then re-runs creation
    /// against fresh capabilities. Callers must regenerate any state sized
    /// by image count (framebuffers) afterwards.
    ///
    /// # Safety
    /// The device context must be valid.
    pub unsafe fn recreate_swapchain(
        &self,
        gpu: &DeviceContext,
        swapchain: &mut Swapchain,
        width: u32,
        height: u32,
    ) -> Result<()> {
        gpu.wait_idle()?;
        swapchain.destroy(gpu.device(), &self.swapchain_loader);

        *swapchain = self.create_swapchain(gpu, width, height)?;

        tracing::info!(
            "Swapchain recreated: {}x{} ({} images)",
            swapchain.extent.width,
            swapchain.extent.height,
            swapchain.images.len()
        );

        Ok(())
    }

    /// Destroy the surface.
    ///
    /// # Safety
    /// The surface must not be in use and no swapchain may still reference it.
    pub unsafe fn destroy(&self) {
        self.surface_loader.destroy_surface(self.surface, None);
    }
}

/// Surface capabilities query result.
pub struct SurfaceCapabilities {
    /// Raw surface capabilities.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}
