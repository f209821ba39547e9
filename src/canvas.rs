//! The canvas node: replays command streams into a persistent render buffer.
//!
//! A [`Canvas`] owns three render buffers. The primary buffer holds the
//! canvas content and survives across frames (and reallocation). A shared
//! temporary buffer receives draws that still have to be clipped or
//! blended. The clip mask holds the intersection of every pushed clip path.

use std::num::NonZeroUsize;
#[cfg(feature = "render_metrics")]
use std::time::Instant;

use lyon::math::{point, Box2D, Transform};
use lyon::path::Path;
use tracing::{debug, error, trace, warn};

use crate::backend::{Backend, Graphics, RenderTarget};
use crate::cache::ImageCache;
use crate::effect::{BlendMode, CompositeMode, Effect, ImageData};
use crate::error::CanvasError;
use crate::geometry::{transform_from_components, IRect};
use crate::image::Image;
use crate::ops::{execute_op, ExecMode, OpResources, RenderOp, TextSupport};
use crate::shape::FillRule;
use crate::state::RenderState;
use crate::stream::{Command, CommandBuffer};
use crate::text::TextShaper;
use crate::util::decide_target_sizing;
use crate::Color;

mod buffer;
mod clip;
mod composite;
mod effects;
mod interpret;
#[cfg(feature = "render_metrics")]
mod metrics;

use buffer::{InitPolicy, RenderBuffer};
use clip::ClipStack;
#[cfg(feature = "render_metrics")]
pub use metrics::FrameMetrics;

/// Canvas tuning knobs.
///
/// ```
/// use std::num::NonZeroUsize;
/// use deferred_canvas::CanvasConfig;
///
/// let config = CanvasConfig::default()
///     .with_image_cache_capacity(NonZeroUsize::new(8).unwrap())
///     .with_volatile_snapshots(false);
/// assert_eq!(config.image_cache_capacity.get(), 8);
/// ```
#[derive(Debug, Clone)]
pub struct CanvasConfig {
    /// Number of image textures kept alive between frames.
    pub image_cache_capacity: NonZeroUsize,
    /// Whether content of volatile primary targets is read back after each
    /// frame so it can be restored when the device discards it.
    pub snapshot_volatile_targets: bool,
}

const DEFAULT_IMAGE_CACHE_CAPACITY: usize = 64;

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            image_cache_capacity: NonZeroUsize::new(DEFAULT_IMAGE_CACHE_CAPACITY)
                .unwrap_or(NonZeroUsize::MIN),
            snapshot_volatile_targets: true,
        }
    }
}

impl CanvasConfig {
    pub fn with_image_cache_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.image_cache_capacity = capacity;
        self
    }

    pub fn with_volatile_snapshots(mut self, enabled: bool) -> Self {
        self.snapshot_volatile_targets = enabled;
        self
    }
}

/// Which of the canvas-owned buffers an operation reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BufferId {
    Canvas,
    Temp,
    Clip,
}

/// A retained canvas bound to one [`Backend`].
///
/// # Examples
///
/// ```
/// use deferred_canvas::{Canvas, Color, CommandWriter, SoftBackend};
///
/// let mut canvas = Canvas::new(SoftBackend::new());
/// canvas.update_bounds(4.0, 4.0);
///
/// let mut writer = CommandWriter::new();
/// writer.set_fill_paint(Color::rgb(255, 0, 0));
/// writer.fill_rect(0.0, 0.0, 2.0, 2.0);
/// canvas.update_rendering(writer.finish());
///
/// let pixels = canvas.render_to_pixels().unwrap();
/// assert_eq!(pixels[0], 0xFFFF_0000);
/// assert_eq!(pixels[3], 0);
/// ```
pub struct Canvas<B: Backend> {
    backend: B,
    config: CanvasConfig,
    state: RenderState,
    images: ImageCache<B::Texture>,
    text: TextSupport,

    cv: RenderBuffer<B>,
    temp: RenderBuffer<B>,
    clip: ClipStack<B>,

    width: u32,
    height: u32,
    pending: Option<CommandBuffer>,
    needs_redraw: bool,

    #[cfg(feature = "render_metrics")]
    frame_metrics: FrameMetrics,
    #[cfg(feature = "render_metrics")]
    last_frame_metrics: Option<FrameMetrics>,
}

impl<B: Backend> Canvas<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, CanvasConfig::default())
    }

    pub fn with_config(backend: B, config: CanvasConfig) -> Self {
        Self {
            backend,
            images: ImageCache::new(config.image_cache_capacity),
            config,
            state: RenderState::default(),
            text: TextSupport::default(),
            cv: RenderBuffer::new("canvas", InitPolicy::Preserve),
            temp: RenderBuffer::new("temp", InitPolicy::Clear),
            clip: ClipStack::new(),
            width: 0,
            height: 0,
            pending: None,
            needs_redraw: false,
            #[cfg(feature = "render_metrics")]
            frame_metrics: FrameMetrics::default(),
            #[cfg(feature = "render_metrics")]
            last_frame_metrics: None,
        }
    }

    /// Installs the shaper used by text operations.
    pub fn set_text_shaper(&mut self, shaper: impl TextShaper + 'static) {
        self.text.set_shaper(Box::new(shaper));
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The render state as left by the last replayed command.
    pub fn state(&self) -> &RenderState {
        &self.state
    }

    /// Canvas size in whole pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of clip paths currently pushed.
    pub fn clip_depth(&self) -> usize {
        self.clip.depth()
    }

    /// Resizes the canvas. Fractional sizes round up; non-positive sizes
    /// release every render target on the next render.
    pub fn update_bounds(&mut self, width: f32, height: f32) {
        let to_pixels = |v: f32| if v.is_finite() && v > 0.0 { v.ceil() as u32 } else { 0 };
        let (width, height) = (to_pixels(width), to_pixels(height));
        if (width, height) != (self.width, self.height) {
            debug!(width, height, "canvas bounds updated");
            self.width = width;
            self.height = height;
            self.needs_redraw = true;
        }
    }

    /// Hands over newly recorded commands. Buffers handed over before the
    /// next render are replayed in order.
    pub fn update_rendering(&mut self, buffer: CommandBuffer) {
        if buffer.is_empty() {
            return;
        }
        match self.pending.as_mut() {
            Some(pending) => pending.append(buffer),
            None => self.pending = Some(buffer),
        }
        self.needs_redraw = true;
    }

    /// True when a size change or new commands have not been rendered yet.
    pub fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    /// Replays pending commands and draws the canvas content at the origin
    /// of `frame`.
    pub fn render(&mut self, frame: &mut B::Graphics) -> Result<(), CanvasError> {
        self.render_content(Some(frame))
    }

    /// Replays pending commands and returns the canvas content as
    /// premultiplied ARGB, `width * height` words row-major.
    pub fn render_to_pixels(&mut self) -> Result<Vec<u32>, CanvasError> {
        self.render_content(None)?;
        let (width, height) = (self.width as usize, self.height as usize);
        let Some(target) = self.cv.target() else {
            return Ok(Vec::new());
        };
        let mut pixels = Vec::new();
        target.read_pixels(&mut pixels)?;
        let stride = target.content_width() as usize;
        if stride == width {
            pixels.truncate(width * height);
            return Ok(pixels);
        }
        Ok(pixels
            .chunks_exact(stride)
            .take(height)
            .flat_map(|row| row[..width].iter().copied())
            .collect())
    }

    #[cfg(feature = "render_metrics")]
    pub fn last_frame_metrics(&self) -> Option<FrameMetrics> {
        self.last_frame_metrics
    }

    fn render_content(&mut self, frame: Option<&mut B::Graphics>) -> Result<(), CanvasError> {
        self.needs_redraw = false;
        if self.width == 0 || self.height == 0 {
            if self.cv.is_allocated() {
                debug!("canvas is empty, releasing render targets");
            }
            self.cv.dispose();
            self.temp.dispose();
            self.clip.dispose_mask();
            return Ok(());
        }

        #[cfg(feature = "render_metrics")]
        let started_at = Instant::now();
        #[cfg(feature = "render_metrics")]
        {
            self.frame_metrics = FrameMetrics::default();
        }

        let result = self.render_frame(frame);
        // Contexts never outlive a frame; lost targets are detected on the
        // next validation.
        self.cv.release_graphics();
        self.temp.release_graphics();
        self.clip.release_graphics();

        #[cfg(feature = "render_metrics")]
        {
            self.frame_metrics.elapsed = started_at.elapsed();
            self.last_frame_metrics = Some(self.frame_metrics);
        }
        result
    }

    fn render_frame(&mut self, frame: Option<&mut B::Graphics>) -> Result<(), CanvasError> {
        let (width, height) = (self.width, self.height);
        let reallocated = self.cv.validate(&mut self.backend, width, height)?;
        self.count_reallocation(reallocated);

        if let Some(buffer) = self.pending.take() {
            if let Err(error) = self.render_stream(buffer) {
                if error.is_stream_corruption() {
                    error!(%error, "aborting canvas render on corrupt command stream");
                }
                return Err(error);
            }
        }

        if let Some(frame) = frame {
            let texture = self.cv.texture()?;
            let area = Box2D::new(point(0.0, 0.0), point(width as f32, height as f32));
            frame.draw_texture(&texture, area, area);
        }
        self.cv
            .save(self.config.snapshot_volatile_targets)
    }

    fn buffer_mut(&mut self, id: BufferId) -> &mut RenderBuffer<B> {
        match id {
            BufferId::Canvas => &mut self.cv,
            BufferId::Temp => &mut self.temp,
            BufferId::Clip => self.clip.mask_mut(),
        }
    }

    /// The whole-canvas device rectangle.
    fn device_clip(&self) -> IRect {
        IRect::from_size(self.width, self.height)
    }

    #[cfg(feature = "render_metrics")]
    fn count_reallocation(&mut self, reallocated: bool) {
        if reallocated {
            self.frame_metrics.reallocations += 1;
        }
    }

    #[cfg(not(feature = "render_metrics"))]
    fn count_reallocation(&mut self, _reallocated: bool) {}
}

impl<B: Backend> std::fmt::Debug for Canvas<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("clip_depth", &self.clip.depth())
            .field("pending", &self.pending.as_ref().map(CommandBuffer::byte_len))
            .field("needs_redraw", &self.needs_redraw)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::soft::SoftBackend;
    use crate::stream::CommandWriter;

    #[test]
    fn bounds_round_up_and_request_redraw() {
        let mut canvas = Canvas::new(SoftBackend::new());
        assert!(!canvas.needs_redraw());
        canvas.update_bounds(10.2, 3.0);
        assert_eq!(canvas.size(), (11, 3));
        assert!(canvas.needs_redraw());
        canvas.render_to_pixels().unwrap();
        assert!(!canvas.needs_redraw());
        canvas.update_bounds(10.5, 3.0);
        assert!(!canvas.needs_redraw());
    }

    #[test]
    fn empty_buffers_do_not_request_redraw() {
        let mut canvas = Canvas::new(SoftBackend::new());
        canvas.update_rendering(CommandWriter::new().finish());
        assert!(!canvas.needs_redraw());
    }

    #[test]
    fn degenerate_size_releases_targets() {
        let mut canvas = Canvas::new(SoftBackend::new());
        canvas.update_bounds(8.0, 8.0);
        canvas.render_to_pixels().unwrap();
        assert_eq!(canvas.backend().live_targets(), 1);
        canvas.update_bounds(0.0, 8.0);
        assert!(canvas.render_to_pixels().unwrap().is_empty());
        assert_eq!(canvas.backend().live_targets(), 0);
    }

    #[test]
    fn shrinking_reuses_the_target_and_crops_pixels() {
        let mut canvas = Canvas::new(SoftBackend::new());
        canvas.update_bounds(8.0, 8.0);
        let mut writer = CommandWriter::new();
        writer.fill_rect(0.0, 0.0, 8.0, 8.0);
        canvas.update_rendering(writer.finish());
        canvas.render_to_pixels().unwrap();
        canvas.update_bounds(3.0, 2.0);
        let pixels = canvas.render_to_pixels().unwrap();
        assert_eq!(pixels, vec![0xFF00_0000; 6]);
        assert_eq!(canvas.backend().allocations(), 1);
    }

    #[test]
    fn render_blits_content_into_the_frame() {
        let mut canvas = Canvas::new(SoftBackend::new());
        canvas.update_bounds(2.0, 2.0);
        let mut writer = CommandWriter::new();
        writer.set_fill_paint(Color::WHITE).fill_rect(0.0, 0.0, 1.0, 1.0);
        canvas.update_rendering(writer.finish());

        let frame_target = canvas.backend_mut().create_render_target(4, 4).unwrap();
        let mut frame = canvas.backend_mut().create_graphics(&frame_target).unwrap();
        frame.set_transform(Transform::translation(2.0, 2.0));
        canvas.render(&mut frame).unwrap();

        let mut pixels = Vec::new();
        frame_target.read_pixels(&mut pixels).unwrap();
        assert_eq!(pixels[2 * 4 + 2], 0xFFFF_FFFF);
        assert_eq!(pixels[0], 0);
    }
}
