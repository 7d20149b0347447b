//! Weak-reference texture cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use crate::texture::TextureResource;

/// Cache mapping texture paths to non-owning handles.
///
/// A lookup upgrades the stored [`Weak`]; it never extends the texture's
/// lifetime. Entries whose last owner dropped are evicted lazily on the
/// next lookup for that path, so a reload after all owners are gone decodes
/// the file again.
#[derive(Default)]
pub struct TextureCache {
    entries: HashMap<PathBuf, Weak<TextureResource>>,
}

impl TextureCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a texture, returning it only while some owner keeps it alive.
    pub fn get(&mut self, path: &Path) -> Option<Arc<TextureResource>> {
        match self.entries.get(path) {
            Some(weak) => match weak.upgrade() {
                Some(texture) => Some(texture),
                None => {
                    self.entries.remove(path);
                    None
                }
            },
            None => None,
        }
    }

    /// Record a loaded texture without taking ownership.
    pub fn insert(&mut self, path: PathBuf, texture: &Arc<TextureResource>) {
        self.entries.insert(path, Arc::downgrade(texture));
    }

    /// Number of entries, counting expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_gpu::memory::GpuImage;
    use ash::vk;

    fn dummy_texture() -> Arc<TextureResource> {
        Arc::new(TextureResource {
            image: GpuImage {
                image: vk::Image::null(),
                memory: vk::DeviceMemory::null(),
                format: vk::Format::R8G8B8A8_SRGB,
                extent: vk::Extent3D {
                    width: 1,
                    height: 1,
                    depth: 1,
                },
            },
            view: vk::ImageView::null(),
            width: 1,
            height: 1,
        })
    }

    #[test]
    fn hit_while_owner_alive() {
        let mut cache = TextureCache::new();
        let path = PathBuf::from("tex/stone.png");

        let texture = dummy_texture();
        cache.insert(path.clone(), &texture);

        let hit = cache.get(&path).expect("owner still alive");
        assert!(Arc::ptr_eq(&hit, &texture));
    }

    #[test]
    fn caching_does_not_extend_lifetime() {
        let mut cache = TextureCache::new();
        let path = PathBuf::from("tex/stone.png");

        let texture = dummy_texture();
        cache.insert(path.clone(), &texture);
        assert_eq!(Arc::strong_count(&texture), 1);

        drop(texture);
        assert!(cache.get(&path).is_none());
    }

    #[test]
    fn expired_entries_evicted_on_lookup() {
        let mut cache = TextureCache::new();
        let path = PathBuf::from("tex/stone.png");

        let texture = dummy_texture();
        cache.insert(path.clone(), &texture);
        drop(texture);

        assert_eq!(cache.len(), 1);
        assert!(cache.get(&path).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn unknown_path_misses() {
        let mut cache = TextureCache::new();
        assert!(cache.get(Path::new("tex/missing.png")).is_none());
    }
}
