//! Device context: logical device, queues, and memory-type lookup.

use crate::error::{GpuError, Result};
use crate::instance::{create_instance, required_device_extensions, select_physical_device};
use crate::surface::SurfaceContext;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CStr;
use std::sync::Arc;

/// Queue family indices resolved at device creation.
///
/// Graphics and present may share an index; transfer falls back to the
/// graphics family when no dedicated transfer family exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
    pub transfer: u32,
}

impl QueueFamilyIndices {
    /// Whether graphics and present use distinct families.
    pub fn split_present(&self) -> bool {
        self.graphics != self.present
    }
}

/// Owns the logical device, its queues, and the instance they came from.
///
/// Created once per process; destroyed last, after every dependent object
/// (buffers, images, pools, swapchain, surface).
pub struct DeviceContext {
    // Entry must be kept alive for the lifetime of the context
    #[allow(dead_code)]
    entry: ash::Entry,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: Arc<ash::Device>,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    limits: vk::PhysicalDeviceLimits,
    families: QueueFamilyIndices,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    transfer_queue: vk::Queue,
}

impl DeviceContext {
    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get a shared handle to the device for long-lived owners.
    pub fn device_arc(&self) -> Arc<ash::Device> {
        self.device.clone()
    }

    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get the physical device limits.
    pub fn limits(&self) -> &vk::PhysicalDeviceLimits {
        &self.limits
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the present queue.
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Get the transfer queue.
    pub fn transfer_queue(&self) -> vk::Queue {
        self.transfer_queue
    }

    /// Get the resolved queue family indices.
    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.families
    }

    /// Get the cached physical device memory properties.
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// Resolve a memory type index for an allocation.
    ///
    /// Returns the first memory type whose bit is set in `type_bits` and
    /// whose property flags are a superset of `properties`.
    pub fn memory_type_for(
        &self,
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<u32> {
        find_memory_type(&self.memory_properties, type_bits, properties).ok_or(
            GpuError::NoCompatibleMemoryType {
                type_bits,
                properties,
            },
        )
    }

    /// Wait for the device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

/// Builder for creating a device context and its surface.
pub struct DeviceContextBuilder {
    app_name: String,
    enable_validation: bool,
}

impl Default for DeviceContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "Aether".to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl DeviceContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Build the device context and the surface tied to `window`.
    ///
    /// Follows the strict initialization order: instance, surface, physical
    /// device selection, logical device. The surface context must be
    /// destroyed before the device context is dropped.
    pub fn build<W>(self, window: &W) -> Result<(DeviceContext, SurfaceContext)>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GpuError::InvalidState(format!("Failed to load Vulkan: {e}")))?;

        let instance = unsafe { create_instance(&entry, &self.app_name, self.enable_validation) }?;

        let surface = unsafe { create_raw_surface(&entry, &instance, window) }?;
        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

        let physical_device =
            unsafe { select_physical_device(&instance, &surface_loader, surface) }?;

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let device_name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };
        tracing::info!("Selected GPU: {}", device_name.to_string_lossy());

        let families =
            unsafe { find_queue_families(&instance, &surface_loader, surface, physical_device) }?;

        let (device, graphics_queue, present_queue, transfer_queue) =
            unsafe { create_device(&instance, physical_device, &families) }?;

        let device = Arc::new(device);
        let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);

        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        let context = DeviceContext {
            entry,
            instance,
            physical_device,
            device,
            memory_properties,
            limits: properties.limits,
            families,
            graphics_queue,
            present_queue,
            transfer_queue,
        };

        let surface_context = SurfaceContext::new(surface, surface_loader, swapchain_loader);

        Ok((context, surface_context))
    }
}

/// Linear scan of the reported memory types.
///
/// Returns the first index whose bit is set in `type_bits` and whose
/// property flags contain all of `required`.
pub fn find_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    properties.memory_types[..properties.memory_type_count as usize]
        .iter()
        .enumerate()
        .find(|(i, ty)| type_bits & (1 << i) != 0 && ty.property_flags.contains(required))
        .map(|(i, _)| i as u32)
}

/// Find queue families for graphics, presentation, and transfer.
///
/// A dedicated transfer family (no graphics) is preferred; otherwise
/// transfers share the graphics family.
///
/// # Safety
/// The instance, surface loader, surface, and physical device must be valid.
unsafe fn find_queue_families(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
) -> Result<QueueFamilyIndices> {
    let queue_families = instance.get_physical_device_queue_family_properties(physical_device);

    let mut graphics_family = None;
    let mut present_family = None;
    let mut transfer_family = None;

    for (i, family) in queue_families.iter().enumerate() {
        let i = i as u32;

        if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && graphics_family.is_none() {
            graphics_family = Some(i);
        }

        if family.queue_flags.contains(vk::QueueFlags::TRANSFER)
            && !family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            && transfer_family.is_none()
        {
            transfer_family = Some(i);
        }

        if present_family.is_none()
            && surface_loader.get_physical_device_surface_support(physical_device, i, surface)?
        {
            present_family = Some(i);
        }
    }

    let graphics = graphics_family.ok_or(GpuError::MissingQueueFamily("graphics"))?;
    let present = present_family.ok_or(GpuError::MissingQueueFamily("present"))?;
    let transfer = transfer_family.unwrap_or(graphics);

    Ok(QueueFamilyIndices {
        graphics,
        present,
        transfer,
    })
}

/// Create the logical device and retrieve one queue per family.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    families: &QueueFamilyIndices,
) -> Result<(ash::Device, vk::Queue, vk::Queue, vk::Queue)> {
    let mut unique_families = std::collections::BTreeSet::new();
    unique_families.insert(families.graphics);
    unique_families.insert(families.present);
    unique_families.insert(families.transfer);

    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
        .iter()
        .map(|&family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(std::slice::from_ref(&queue_priority))
        })
        .collect();

    let extensions = required_device_extensions();
    let extension_names: Vec<*const i8> = extensions.iter().map(|ext| ext.as_ptr()).collect();

    let features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true);

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_features(&features);

    let device = instance
        .create_device(physical_device, &device_create_info, None)
        .map_err(GpuError::for_op("vkCreateDevice"))?;

    let graphics_queue = device.get_device_queue(families.graphics, 0);
    let present_queue = device.get_device_queue(families.present, 0);
    let transfer_queue = device.get_device_queue(families.transfer, 0);

    Ok((device, graphics_queue, present_queue, transfer_queue))
}

/// Create a raw Vulkan surface from window handles.
///
/// # Safety
/// The window handles must remain valid for the surface lifetime.
unsafe fn create_raw_surface<W>(
    entry: &ash::Entry,
    instance: &ash::Instance,
    window: &W,
) -> Result<vk::SurfaceKHR>
where
    W: HasDisplayHandle + HasWindowHandle,
{
    let display = window
        .display_handle()
        .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?;
    let window_handle = window
        .window_handle()
        .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get window handle: {e}")))?;

    ash_window::create_surface(
        entry,
        instance,
        display.as_raw(),
        window_handle.as_raw(),
        None,
    )
    .map_err(|e| GpuError::SurfaceCreation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(types: &[(vk::MemoryPropertyFlags, u32)]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (i, (flags, heap)) in types.iter().enumerate() {
            props.memory_types[i] = vk::MemoryType {
                property_flags: *flags,
                heap_index: *heap,
            };
        }
        props
    }

    #[test]
    fn memory_type_first_match_wins() {
        let props = memory_properties(&[
            (vk::MemoryPropertyFlags::DEVICE_LOCAL, 0),
            (
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                1,
            ),
            (
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                1,
            ),
        ]);

        let index = find_memory_type(
            &props,
            0b111,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        );
        assert_eq!(index, Some(1));
    }

    #[test]
    fn memory_type_respects_type_bits() {
        let props = memory_properties(&[
            (vk::MemoryPropertyFlags::DEVICE_LOCAL, 0),
            (vk::MemoryPropertyFlags::DEVICE_LOCAL, 0),
        ]);

        // Only type 1 allowed by the filter
        let index = find_memory_type(&props, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL);
        assert_eq!(index, Some(1));
    }

    #[test]
    fn memory_type_requires_flag_superset() {
        let props = memory_properties(&[
            (vk::MemoryPropertyFlags::HOST_VISIBLE, 0),
            (
                vk::MemoryPropertyFlags::HOST_VISIBLE
                    | vk::MemoryPropertyFlags::HOST_COHERENT
                    | vk::MemoryPropertyFlags::HOST_CACHED,
                0,
            ),
        ]);

        // Type 0 is host-visible but not coherent; type 1 is a superset
        let index = find_memory_type(
            &props,
            0b11,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        );
        assert_eq!(index, Some(1));
    }

    #[test]
    fn memory_type_none_satisfiable() {
        let props = memory_properties(&[(vk::MemoryPropertyFlags::DEVICE_LOCAL, 0)]);

        let index = find_memory_type(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert_eq!(index, None);
    }

    #[test]
    fn split_present_detection() {
        let shared = QueueFamilyIndices {
            graphics: 0,
            present: 0,
            transfer: 1,
        };
        assert!(!shared.split_present());

        let split = QueueFamilyIndices {
            graphics: 0,
            present: 2,
            transfer: 0,
        };
        assert!(split.split_present());
    }
}
