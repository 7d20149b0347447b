//! GPU error types.

use ash::vk;
use thiserror::Error;

/// GPU-related errors.
///
/// Setup errors (missing queue families, unsupported extensions, failed
/// object creation) are fatal and abort initialization. Transient
/// presentation conditions are not errors and are surfaced as data by the
/// swapchain acquire/present paths instead.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// No suitable GPU found.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// A required queue family is absent on the selected device.
    #[error("Missing required queue family: {0}")]
    MissingQueueFamily(&'static str),

    /// Required extension not supported.
    #[error("Required extension not supported: {0}")]
    ExtensionNotSupported(String),

    /// No device memory type satisfies the requested type bits and flags.
    #[error("No compatible memory type (type bits {type_bits:#b})")]
    NoCompatibleMemoryType {
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    },

    /// A resource creation call returned non-success.
    #[error("Resource creation failed: {op}: {source}")]
    CreationFailed {
        op: &'static str,
        source: vk::Result,
    },

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// Shader bytecode is empty or not a whole number of SPIR-V words.
    #[error("Invalid bytecode size: {0}")]
    InvalidBytecodeSize(usize),

    /// Shader module creation failed.
    #[error("Shader compilation failed: {0}")]
    ShaderCompilation(String),

    /// Pipeline creation failed.
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// The image layout transition table has no entry for this pair.
    /// Indicates an incomplete transition table, not a runtime condition.
    #[error("Unsupported layout transition: {from:?} -> {to:?}")]
    UnsupportedLayoutTransition {
        from: vk::ImageLayout,
        to: vk::ImageLayout,
    },

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl GpuError {
    /// Wrap a creation-call result, tagging it with the failing operation.
    pub fn for_op(op: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |source| Self::CreationFailed { op, source }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;
