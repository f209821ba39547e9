//! Graphics-device abstraction the canvas renders through.
//!
//! A [`Backend`] allocates render targets and textures and implements the
//! image filters the compositor chains together. A [`Graphics`] is a drawing
//! context bound to one [`RenderTarget`]. Two devices ship with the crate:
//! [`soft::SoftBackend`] rasterizes on the CPU and [`gpu::GpuBackend`] runs
//! on wgpu.

use lyon::math::{Box2D, Transform};
use lyon::path::Path;

use crate::effect::{BlendMode, CompositeMode, ImageData};
use crate::error::CanvasError;
use crate::geometry::IRect;
use crate::paint::Paint;
use crate::shape::FillRule;
use crate::stroke::Stroke;
use crate::Color;

pub mod gpu;
pub mod soft;

/// An allocatable device with filter primitives.
pub trait Backend {
    /// A sampleable image. Cloning shares the underlying storage.
    type Texture: Clone;
    type Target: RenderTarget<Texture = Self::Texture>;
    type Graphics: Graphics<Texture = Self::Texture>;

    /// Allocates a transparent render target.
    fn create_render_target(&mut self, width: u32, height: u32) -> Result<Self::Target, CanvasError>;

    /// Binds a drawing context to `target`. `None` means the target's
    /// content was lost and it cannot be drawn into any more.
    fn create_graphics(&mut self, target: &Self::Target) -> Option<Self::Graphics>;

    /// Uploads premultiplied ARGB pixels, row-major.
    fn create_texture(&mut self, width: u32, height: u32, argb_pre: &[u32]) -> Result<Self::Texture, CanvasError>;

    /// Blends `top` over `bottom` with `mode`.
    ///
    /// The result covers the union of both inputs, cut down to `clip` when
    /// one is given. Pixels outside an input read as transparent.
    fn blend(
        &mut self,
        top: &ImageData<Self::Texture>,
        bottom: &ImageData<Self::Texture>,
        mode: BlendMode,
        clip: Option<IRect>,
    ) -> Result<ImageData<Self::Texture>, CanvasError>;

    /// Gaussian blur; the result grows by the radius on every side.
    fn gaussian_blur(
        &mut self,
        input: &ImageData<Self::Texture>,
        radius: f32,
    ) -> Result<ImageData<Self::Texture>, CanvasError>;

    /// Blurred alpha of `input` tinted with `color`, same bounds rule as
    /// [`Backend::gaussian_blur`].
    fn shadow(
        &mut self,
        input: &ImageData<Self::Texture>,
        radius: f32,
        color: Color,
    ) -> Result<ImageData<Self::Texture>, CanvasError>;
}

/// A texture that can be drawn into.
pub trait RenderTarget {
    type Texture;

    fn content_width(&self) -> u32;
    fn content_height(&self) -> u32;

    /// True when the device may discard the target's content between
    /// frames.
    fn is_volatile(&self) -> bool;

    /// True once the content has been discarded.
    fn is_lost(&self) -> bool;

    /// A sampleable view of the target.
    fn texture(&self) -> Self::Texture;

    /// Reads the whole target as premultiplied ARGB, row-major.
    fn read_pixels(&self, out: &mut Vec<u32>) -> Result<(), CanvasError>;
}

/// A drawing context with an affine transform and a single extra alpha.
pub trait Graphics {
    type Texture;

    fn transform(&self) -> Transform;
    fn set_transform(&mut self, transform: Transform);
    fn set_extra_alpha(&mut self, alpha: f32);
    fn set_composite_mode(&mut self, mode: CompositeMode);
    fn set_paint(&mut self, paint: &Paint);

    fn fill_path(&mut self, path: &Path, rule: FillRule);
    fn stroke_path(&mut self, path: &Path, stroke: &Stroke);
    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32);

    /// Draws the `src` region of `texture` into `dst` (user space).
    fn draw_texture(&mut self, texture: &Self::Texture, dst: Box2D, src: Box2D);

    /// Zeroes `width x height` pixels from the origin, ignoring the
    /// transform.
    fn clear(&mut self, width: u32, height: u32) {
        let transform = self.transform();
        self.set_transform(Transform::identity());
        self.set_composite_mode(CompositeMode::Clear);
        self.fill_rect(0.0, 0.0, width as f32, height as f32);
        self.set_composite_mode(CompositeMode::SrcOver);
        self.set_transform(transform);
    }
}
