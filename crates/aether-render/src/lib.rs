//! Frame rendering for the Aether engine.
//!
//! Owns the render pass, graphics pipeline, framebuffers, and the
//! frames-in-flight loop that keeps the CPU from overwriting GPU-resident
//! data a previous frame still reads.

pub mod mesh;
pub mod renderer;
pub mod uniforms;
pub mod vertex;

pub use mesh::{pack_meshes, Drawable, GeometryBuffers, Mesh};
pub use renderer::{FrameOutcome, FrameRenderer, FRAMES_IN_FLIGHT};
pub use uniforms::{vulkan_projection, SceneUniforms};
pub use vertex::Vertex;
