use std::sync::Arc;

use crate::error::CanvasError;
use crate::id::ImageId;

/// An immutable raster image in premultiplied ARGB words.
///
/// Cloning is cheap; clones share pixels and identity, so they hit the same
/// texture cache entry.
#[derive(Debug, Clone)]
pub struct Image {
    id: ImageId,
    width: u32,
    height: u32,
    pixels: Arc<[u32]>,
}

impl Image {
    /// Creates an image from premultiplied `0xAARRGGBB` words, row-major.
    pub fn from_argb_pre(width: u32, height: u32, pixels: Vec<u32>) -> Result<Self, CanvasError> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(CanvasError::InvalidTexture(format!(
                "{width}x{height} image needs {expected} pixels, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            id: ImageId::next(),
            width,
            height,
            pixels: pixels.into(),
        })
    }

    /// Creates an image from BGRA bytes with premultiplied alpha (the layout
    /// of `PUT_ARGBPRE_BUF` payloads).
    pub fn from_bgra_pre_bytes(width: u32, height: u32, bytes: &[u8]) -> Result<Self, CanvasError> {
        if bytes.len() != width as usize * height as usize * 4 {
            return Err(CanvasError::InvalidTexture(format!(
                "{width}x{height} BGRA buffer needs {} bytes, got {}",
                width as usize * height as usize * 4,
                bytes.len()
            )));
        }
        let pixels = bytes
            .chunks_exact(4)
            .map(|px| u32::from_le_bytes([px[0], px[1], px[2], px[3]]))
            .collect();
        Self::from_argb_pre(width, height, pixels)
    }

    /// A uniformly colored image.
    pub fn solid(width: u32, height: u32, color: crate::Color) -> Self {
        let word = color.to_argb_pre();
        Self {
            id: ImageId::next(),
            width,
            height,
            pixels: vec![word; width as usize * height as usize].into(),
        }
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;

    #[test]
    fn from_argb_pre_rejects_mismatched_lengths() {
        assert!(Image::from_argb_pre(2, 2, vec![0; 3]).is_err());
    }

    #[test]
    fn bgra_bytes_decode_to_argb_words() {
        let image = Image::from_bgra_pre_bytes(1, 1, &[0x10, 0x20, 0x30, 0xFF]).unwrap();
        assert_eq!(image.pixels(), &[0xFF30_2010]);
    }

    #[test]
    fn clones_share_identity() {
        let image = Image::solid(2, 1, Color::WHITE);
        let clone = image.clone();
        assert_eq!(image.id(), clone.id());
        assert_ne!(image.id(), Image::solid(2, 1, Color::WHITE).id());
    }
}
