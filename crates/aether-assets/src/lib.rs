//! Resource loading for the Aether engine.
//!
//! Texture decode-and-upload built on the GPU crate's staging protocol,
//! a weak-reference texture cache, and shader bytecode file loading.

pub mod cache;
pub mod error;
pub mod manager;
pub mod shaders;
pub mod texture;

pub use cache::TextureCache;
pub use error::{AssetError, Result};
pub use manager::ResourceManager;
pub use shaders::load_shader_words;
pub use texture::{create_texture_sampler, load_texture, upload_rgba, TextureResource};
