//! Vulkan resource and frame-lifecycle layer for the Aether engine.
//!
//! This crate provides:
//! - Instance, device, and queue management
//! - Surface and swapchain handling with stale-state recreation
//! - Manual buffer/image allocation with paired-ownership handles
//! - The staging upload protocol and image layout transitions
//! - Descriptor, command, and frame-in-flight synchronization primitives

pub mod command;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod transfer;

pub use context::{find_memory_type, DeviceContext, DeviceContextBuilder, QueueFamilyIndices};
pub use descriptors::{DescriptorPool, DescriptorSetLayoutBuilder, FrameDescriptors};
pub use error::{GpuError, Result};
pub use memory::{FrameUniforms, GpuBuffer, GpuImage, MemoryManager};
pub use pipeline::{create_framebuffers, create_render_pass, GraphicsPipeline, GraphicsPipelineConfig};
pub use surface::{SurfaceCapabilities, SurfaceContext};
pub use swapchain::{AcquireResult, Swapchain};
pub use sync::{create_fence, create_semaphore, FrameSlot, FrameSlots};
pub use transfer::{transition_masks, TransitionMasks};
