//! Texture decode-and-upload.

use std::path::Path;

use aether_gpu::context::DeviceContext;
use aether_gpu::memory::{GpuImage, MemoryManager};
use aether_gpu::swapchain::create_image_view;
use aether_gpu::GpuError;
use ash::vk;

use crate::error::{AssetError, Result};

/// A sampled texture: device-local image, its memory, and a view.
///
/// Cleanup is the owner's responsibility and must happen before device
/// teardown; there is no destructor coupling to the device lifetime.
pub struct TextureResource {
    pub image: GpuImage,
    pub view: vk::ImageView,
    pub width: u32,
    pub height: u32,
}

impl TextureResource {
    /// Destroy the view, image, and memory together.
    ///
    /// # Safety
    /// No in-flight frame may still sample this texture.
    pub unsafe fn destroy(self, gpu: &DeviceContext, memory: &MemoryManager) {
        gpu.device().destroy_image_view(self.view, None);
        memory.destroy_image(self.image);
    }
}

/// Decode an image file and upload it as a shader-readable texture.
///
/// The file is decoded to flat RGBA bytes, staged, copied into a new
/// device-local image bracketed by the undefined-to-transfer-destination
/// and transfer-destination-to-shader-read-only transitions, and wrapped
/// in an image view. The decode buffer and staging buffer are freed before
/// returning.
pub fn load_texture(
    gpu: &DeviceContext,
    memory: &MemoryManager,
    path: &Path,
) -> Result<TextureResource> {
    let decoded = image::open(path)
        .map_err(|e| AssetError::TextureLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
        .to_rgba8();

    let (width, height) = decoded.dimensions();
    let pixels = decoded.into_raw();

    tracing::info!("Loaded texture {} ({}x{})", path.display(), width, height);

    upload_rgba(gpu, memory, &pixels, width, height).map_err(AssetError::from)
}

/// Upload raw RGBA8 pixels as a sampled texture.
pub fn upload_rgba(
    gpu: &DeviceContext,
    memory: &MemoryManager,
    pixels: &[u8],
    width: u32,
    height: u32,
) -> aether_gpu::Result<TextureResource> {
    let image_info = vk::ImageCreateInfo::default()
        .image_type(vk::ImageType::TYPE_2D)
        .extent(vk::Extent3D {
            width,
            height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .format(vk::Format::R8G8B8A8_SRGB)
        .tiling(vk::ImageTiling::OPTIMAL)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .samples(vk::SampleCountFlags::TYPE_1);

    let image = memory.create_image(&image_info, vk::MemoryPropertyFlags::DEVICE_LOCAL)?;

    if let Err(e) = memory.upload_image(&image, pixels, width, height) {
        memory.destroy_image(image);
        return Err(e);
    }

    let view = match unsafe {
        create_image_view(gpu.device(), image.image, vk::Format::R8G8B8A8_SRGB)
    } {
        Ok(view) => view,
        Err(e) => {
            memory.destroy_image(image);
            return Err(e);
        }
    };

    Ok(TextureResource {
        image,
        view,
        width,
        height,
    })
}

/// Create the standard texture sampler.
///
/// Linear filtering, repeat addressing, anisotropy at the device-reported
/// maximum (device selection guarantees anisotropic sampling support).
pub fn create_texture_sampler(gpu: &DeviceContext) -> aether_gpu::Result<vk::Sampler> {
    let sampler_info = vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(true)
        .max_anisotropy(gpu.limits().max_sampler_anisotropy)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR);

    unsafe {
        gpu.device()
            .create_sampler(&sampler_info, None)
            .map_err(GpuError::for_op("vkCreateSampler"))
    }
}
