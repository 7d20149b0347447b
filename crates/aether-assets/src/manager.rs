//! Resource manager orchestrating texture loads against the cache.

use std::path::Path;
use std::sync::Arc;

use aether_gpu::context::DeviceContext;
use aether_gpu::memory::MemoryManager;

use crate::cache::TextureCache;
use crate::error::Result;
use crate::texture::{load_texture, TextureResource};

/// Loads textures through the Memory Manager and caches them by path.
///
/// The cache holds weak handles: repeated loads of the same path reuse the
/// live texture only while some owner keeps it alive, otherwise the file is
/// decoded and uploaded again. Callers own the returned `Arc`s and must
/// destroy the textures before device teardown.
#[derive(Default)]
pub struct ResourceManager {
    textures: TextureCache,
}

impl ResourceManager {
    /// Create a resource manager with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a texture, reusing a live cached copy when possible.
    pub fn load_texture(
        &mut self,
        gpu: &DeviceContext,
        memory: &MemoryManager,
        path: &Path,
    ) -> Result<Arc<TextureResource>> {
        if let Some(texture) = self.textures.get(path) {
            tracing::debug!("Texture cache hit: {}", path.display());
            return Ok(texture);
        }

        let texture = Arc::new(load_texture(gpu, memory, path)?);
        self.textures.insert(path.to_path_buf(), &texture);

        Ok(texture)
    }
}
