use crate::id::ImageId;
use ahash::RandomState;
use lru::LruCache;
use std::num::NonZeroUsize;

/// Least-recently-used map from image identity to the backend texture that
/// was uploaded for it.
pub struct ImageCache<T> {
    textures: LruCache<ImageId, T, RandomState>,
}

impl<T: Clone> ImageCache<T> {
    pub fn new(size: NonZeroUsize) -> Self {
        Self {
            textures: LruCache::with_hasher(size, RandomState::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub(crate) fn get_texture(&mut self, id: &ImageId) -> Option<T> {
        self.textures.get(id).cloned()
    }

    pub(crate) fn insert_texture(&mut self, id: ImageId, texture: T) {
        self.textures.put(id, texture);
    }

    pub fn clear(&mut self) {
        self.textures.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used_texture() {
        let mut cache = ImageCache::new(NonZeroUsize::new(2).unwrap());
        cache.insert_texture(ImageId(1), "a");
        cache.insert_texture(ImageId(2), "b");
        assert_eq!(cache.get_texture(&ImageId(1)), Some("a"));
        cache.insert_texture(ImageId(3), "c");
        assert_eq!(cache.get_texture(&ImageId(2)), None);
        assert_eq!(cache.len(), 2);
    }
}
