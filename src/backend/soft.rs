//! CPU reference device built on tiny-skia.
//!
//! Every surface is a premultiplied RGBA [`Pixmap`]. Blending runs the
//! per-pixel reference formula from [`BlendMode::blend_premultiplied`], so
//! the results are deterministic and match what the GPU shaders compute.
//!
//! Targets can be created volatile; [`SoftBackend::simulate_device_loss`]
//! then discards their content the way some GPU drivers do between frames.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use lyon::math::{Box2D, Transform};
use lyon::path::{Path, PathEvent};
use tiny_skia::{
    FilterQuality, GradientStop as SkiaStop, LinearGradient, Pattern, Pixmap, PathBuilder,
    RadialGradient, Rect, Shader, SpreadMode,
};
use tracing::debug;

use super::{Backend, Graphics, RenderTarget};
use crate::effect::{blur_sigma, BlendMode, CompositeMode, ImageData};
use crate::error::CanvasError;
use crate::geometry::{classify, IRect, TransformKind};
use crate::paint::{CycleMethod, GradientStop, Paint};
use crate::shape::FillRule;
use crate::stroke::{LineCap, LineJoin, Stroke};
use crate::Color;

#[derive(Debug, Default)]
struct DeviceStats {
    allocations: Cell<usize>,
    live_targets: Cell<usize>,
    epoch: Cell<u64>,
}

/// CPU rasterizing backend.
#[derive(Debug, Default)]
pub struct SoftBackend {
    volatile_targets: bool,
    stats: Rc<DeviceStats>,
}

impl SoftBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks every target allocated from now on as volatile.
    pub fn with_volatile_targets(mut self, volatile: bool) -> Self {
        self.volatile_targets = volatile;
        self
    }

    /// Render targets allocated so far.
    pub fn allocations(&self) -> usize {
        self.stats.allocations.get()
    }

    /// Render targets currently alive.
    pub fn live_targets(&self) -> usize {
        self.stats.live_targets.get()
    }

    /// Discards the content of every volatile target alive right now.
    pub fn simulate_device_loss(&mut self) {
        self.stats.epoch.set(self.stats.epoch.get() + 1);
        debug!(epoch = self.stats.epoch.get(), "simulated device loss");
    }
}

/// A shared pixmap. Targets hand out clones of their own storage.
#[derive(Debug, Clone)]
pub struct SoftTexture {
    pixmap: Rc<RefCell<Pixmap>>,
}

impl SoftTexture {
    fn new(pixmap: Pixmap) -> Self {
        Self {
            pixmap: Rc::new(RefCell::new(pixmap)),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixmap.borrow().width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.borrow().height()
    }

    /// Copies the pixels out as premultiplied ARGB words.
    pub fn to_argb_pre(&self) -> Vec<u32> {
        self.pixmap
            .borrow()
            .data()
            .chunks_exact(4)
            .map(|px| u32::from_be_bytes([px[3], px[0], px[1], px[2]]))
            .collect()
    }
}

#[derive(Debug)]
pub struct SoftTarget {
    texture: SoftTexture,
    volatile: bool,
    epoch: u64,
    stats: Rc<DeviceStats>,
}

impl Drop for SoftTarget {
    fn drop(&mut self) {
        self.stats
            .live_targets
            .set(self.stats.live_targets.get().saturating_sub(1));
    }
}

impl RenderTarget for SoftTarget {
    type Texture = SoftTexture;

    fn content_width(&self) -> u32 {
        self.texture.width()
    }

    fn content_height(&self) -> u32 {
        self.texture.height()
    }

    fn is_volatile(&self) -> bool {
        self.volatile
    }

    fn is_lost(&self) -> bool {
        self.volatile && self.epoch != self.stats.epoch.get()
    }

    fn texture(&self) -> SoftTexture {
        if self.is_lost() {
            // Discarded storage reads back as transparent.
            self.texture.pixmap.borrow_mut().fill(tiny_skia::Color::TRANSPARENT);
        }
        self.texture.clone()
    }

    fn read_pixels(&self, out: &mut Vec<u32>) -> Result<(), CanvasError> {
        out.clear();
        out.extend(self.texture().to_argb_pre());
        Ok(())
    }
}

fn alloc_pixmap(width: u32, height: u32) -> Result<Pixmap, CanvasError> {
    Pixmap::new(width.max(1), height.max(1))
        .ok_or(CanvasError::TargetAllocation { width, height })
}

impl Backend for SoftBackend {
    type Texture = SoftTexture;
    type Target = SoftTarget;
    type Graphics = SoftGraphics;

    fn create_render_target(&mut self, width: u32, height: u32) -> Result<SoftTarget, CanvasError> {
        if width == 0 || height == 0 {
            return Err(CanvasError::TargetAllocation { width, height });
        }
        let pixmap = alloc_pixmap(width, height)?;
        self.stats.allocations.set(self.stats.allocations.get() + 1);
        self.stats.live_targets.set(self.stats.live_targets.get() + 1);
        Ok(SoftTarget {
            texture: SoftTexture::new(pixmap),
            volatile: self.volatile_targets,
            epoch: self.stats.epoch.get(),
            stats: Rc::clone(&self.stats),
        })
    }

    fn create_graphics(&mut self, target: &SoftTarget) -> Option<SoftGraphics> {
        if target.is_lost() {
            return None;
        }
        Some(SoftGraphics::new(target.texture.clone()))
    }

    fn create_texture(&mut self, width: u32, height: u32, argb_pre: &[u32]) -> Result<SoftTexture, CanvasError> {
        if argb_pre.len() != width as usize * height as usize {
            return Err(CanvasError::InvalidTexture(format!(
                "{width}x{height} texture needs {} pixels, got {}",
                width as usize * height as usize,
                argb_pre.len()
            )));
        }
        let mut pixmap = alloc_pixmap(width, height)?;
        for (dst, word) in pixmap.data_mut().chunks_exact_mut(4).zip(argb_pre) {
            let [a, r, g, b] = word.to_be_bytes();
            dst.copy_from_slice(&[r.min(a), g.min(a), b.min(a), a]);
        }
        Ok(SoftTexture::new(pixmap))
    }

    fn blend(
        &mut self,
        top: &ImageData<SoftTexture>,
        bottom: &ImageData<SoftTexture>,
        mode: BlendMode,
        clip: Option<IRect>,
    ) -> Result<ImageData<SoftTexture>, CanvasError> {
        let mut bounds = top.bounds.union(&bottom.bounds);
        if let Some(clip) = clip {
            bounds = bounds.intersect(&clip);
        }
        let mut out = alloc_pixmap(bounds.width.max(0) as u32, bounds.height.max(0) as u32)?;
        if !bounds.is_empty() {
            let top_pixels = top.texture.pixmap.borrow();
            let bottom_pixels = bottom.texture.pixmap.borrow();
            let stride = out.width() as usize;
            let data = out.data_mut();
            for y in 0..bounds.height {
                for x in 0..bounds.width {
                    let (dx, dy) = (bounds.x + x, bounds.y + y);
                    let t = sample(&top_pixels, &top.bounds, dx, dy);
                    let b = sample(&bottom_pixels, &bottom.bounds, dx, dy);
                    let blended = mode.blend_premultiplied(t, b);
                    let offset = (y as usize * stride + x as usize) * 4;
                    store(&mut data[offset..offset + 4], blended);
                }
            }
        }
        Ok(ImageData::new(SoftTexture::new(out), bounds))
    }

    fn gaussian_blur(
        &mut self,
        input: &ImageData<SoftTexture>,
        radius: f32,
    ) -> Result<ImageData<SoftTexture>, CanvasError> {
        blur(input, radius, None)
    }

    fn shadow(
        &mut self,
        input: &ImageData<SoftTexture>,
        radius: f32,
        color: Color,
    ) -> Result<ImageData<SoftTexture>, CanvasError> {
        blur(input, radius, Some(color))
    }
}

/// Premultiplied RGBA in `[0, 1]` at device pixel `(x, y)`, transparent
/// outside `bounds` or the pixmap.
fn sample(pixmap: &Pixmap, bounds: &IRect, x: i32, y: i32) -> [f32; 4] {
    if x < bounds.x || y < bounds.y || x >= bounds.right() || y >= bounds.bottom() {
        return [0.0; 4];
    }
    match pixmap.pixel((x - bounds.x) as u32, (y - bounds.y) as u32) {
        Some(px) => [
            px.red() as f32 / 255.0,
            px.green() as f32 / 255.0,
            px.blue() as f32 / 255.0,
            px.alpha() as f32 / 255.0,
        ],
        None => [0.0; 4],
    }
}

fn store(dst: &mut [u8], rgba: [f32; 4]) {
    let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    let a = to_byte(rgba[3]);
    dst.copy_from_slice(&[
        to_byte(rgba[0]).min(a),
        to_byte(rgba[1]).min(a),
        to_byte(rgba[2]).min(a),
        a,
    ]);
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> Vec<u32> {
    let r = radius as i32;
    let denom = 2.0 * (sigma as f64) * (sigma as f64);
    let weights: Vec<f64> = (-r..=r).map(|i| (-(i * i) as f64 / denom).exp()).collect();
    let sum: f64 = weights.iter().sum();
    let mut kernel: Vec<u32> = weights
        .iter()
        .map(|w| ((w / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();
    // Put the rounding error on the center tap so the kernel sums to one.
    let total: i64 = kernel.iter().map(|&w| w as i64).sum();
    let mid = kernel.len() / 2;
    kernel[mid] = (kernel[mid] as i64 + 65536 - total).clamp(0, 65536) as u32;
    kernel
}

/// Separable gaussian over a transparent-padded copy of `input`. With a
/// tint, only the alpha channel is blurred and the color is applied after.
fn blur(
    input: &ImageData<SoftTexture>,
    radius: f32,
    tint: Option<Color>,
) -> Result<ImageData<SoftTexture>, CanvasError> {
    let pad = radius.max(0.0).ceil() as u32;
    let bounds = input.bounds.outset(pad as i32);
    let (w, h) = (bounds.width.max(0) as usize, bounds.height.max(0) as usize);
    let mut out = alloc_pixmap(w as u32, h as u32)?;
    if w == 0 || h == 0 {
        return Ok(ImageData::new(SoftTexture::new(out), bounds));
    }

    let mut src = vec![[0u32; 4]; w * h];
    {
        let pixmap = input.texture.pixmap.borrow();
        for y in 0..input.bounds.height.max(0) as u32 {
            for x in 0..input.bounds.width.max(0) as u32 {
                if let Some(px) = pixmap.pixel(x, y) {
                    let channels = match tint {
                        Some(_) => [0, 0, 0, px.alpha() as u32],
                        None => [
                            px.red() as u32,
                            px.green() as u32,
                            px.blue() as u32,
                            px.alpha() as u32,
                        ],
                    };
                    src[(y + pad) as usize * w + (x + pad) as usize] = channels;
                }
            }
        }
    }

    let kernel = gaussian_kernel_q16(pad, blur_sigma(radius));
    let r = pad as i32;
    let mut tmp = vec![[0u32; 4]; w * h];
    for y in 0..h {
        for x in 0..w as i32 {
            let mut acc = [0u64; 4];
            for (ki, &kw) in kernel.iter().enumerate() {
                let sx = x + ki as i32 - r;
                if sx < 0 || sx >= w as i32 {
                    continue;
                }
                let px = src[y * w + sx as usize];
                for c in 0..4 {
                    acc[c] += kw as u64 * px[c] as u64;
                }
            }
            tmp[y * w + x as usize] = acc.map(q16_to_channel);
        }
    }

    let tint = tint.map(|color| color.premultiplied());
    let data = out.data_mut();
    for y in 0..h as i32 {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in kernel.iter().enumerate() {
                let sy = y + ki as i32 - r;
                if sy < 0 || sy >= h as i32 {
                    continue;
                }
                let px = tmp[sy as usize * w + x];
                for c in 0..4 {
                    acc[c] += kw as u64 * px[c] as u64;
                }
            }
            let blurred = acc.map(q16_to_channel);
            let rgba = match tint {
                Some(color) => {
                    let coverage = blurred[3];
                    color.map(|c| (c as u32 * coverage + 127) / 255)
                }
                None => blurred,
            };
            let offset = (y as usize * w + x) * 4;
            let a = rgba[3].min(255) as u8;
            data[offset..offset + 4].copy_from_slice(&[
                (rgba[0].min(255) as u8).min(a),
                (rgba[1].min(255) as u8).min(a),
                (rgba[2].min(255) as u8).min(a),
                a,
            ]);
        }
    }
    Ok(ImageData::new(SoftTexture::new(out), bounds))
}

fn q16_to_channel(acc: u64) -> u32 {
    ((acc + 32768) >> 16).min(255) as u32
}

// ── Drawing context ──────────────────────────────────────────────────────────

/// Drawing context over a [`SoftTarget`].
#[derive(Debug)]
pub struct SoftGraphics {
    target: SoftTexture,
    transform: Transform,
    alpha: f32,
    mode: CompositeMode,
    paint: Paint,
}

impl SoftGraphics {
    fn new(target: SoftTexture) -> Self {
        Self {
            target,
            transform: Transform::identity(),
            alpha: 1.0,
            mode: CompositeMode::SrcOver,
            paint: Paint::default(),
        }
    }

    fn skia_transform(&self) -> tiny_skia::Transform {
        to_skia_transform(&self.transform)
    }

    fn skia_paint(&self) -> tiny_skia::Paint<'static> {
        let mut paint = tiny_skia::Paint {
            shader: shader_for(&self.paint, self.alpha),
            anti_alias: true,
            ..Default::default()
        };
        paint.blend_mode = skia_blend_mode(self.mode);
        paint
    }

    /// Copies whole pixels when the blit is an unscaled, pixel-aligned
    /// replacement. Returns false when the general path must be used.
    fn try_copy_pixels(&self, source: &Pixmap, dst: &Box2D, src: &Box2D) -> bool {
        if self.mode != CompositeMode::Src || self.alpha != 1.0 {
            return false;
        }
        if classify(&self.transform) == TransformKind::General {
            return false;
        }
        let (tx, ty) = (self.transform.m31, self.transform.m32);
        let values = [
            dst.min.x, dst.min.y, dst.max.x, dst.max.y, src.min.x, src.min.y, src.max.x, src.max.y,
            tx, ty,
        ];
        if values.iter().any(|v| v.fract() != 0.0) {
            return false;
        }
        if dst.width() != src.width() || dst.height() != src.height() {
            return false;
        }

        let mut target = self.target.pixmap.borrow_mut();
        let (target_w, target_h) = (target.width() as i32, target.height() as i32);
        let (source_w, source_h) = (source.width() as i32, source.height() as i32);
        let (dx0, dy0) = ((dst.min.x + tx) as i32, (dst.min.y + ty) as i32);
        let (sx0, sy0) = (src.min.x as i32, src.min.y as i32);
        let (w, h) = (dst.width() as i32, dst.height() as i32);

        let source_data = source.data();
        let target_data = target.data_mut();
        for row in 0..h {
            let (dy, sy) = (dy0 + row, sy0 + row);
            if dy < 0 || dy >= target_h {
                continue;
            }
            for col in 0..w {
                let (dx, sx) = (dx0 + col, sx0 + col);
                if dx < 0 || dx >= target_w {
                    continue;
                }
                let d = ((dy * target_w + dx) * 4) as usize;
                if sx < 0 || sy < 0 || sx >= source_w || sy >= source_h {
                    target_data[d..d + 4].fill(0);
                } else {
                    let s = ((sy * source_w + sx) * 4) as usize;
                    target_data[d..d + 4].copy_from_slice(&source_data[s..s + 4]);
                }
            }
        }
        true
    }
}

impl Graphics for SoftGraphics {
    type Texture = SoftTexture;

    fn transform(&self) -> Transform {
        self.transform
    }

    fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    fn set_extra_alpha(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    fn set_composite_mode(&mut self, mode: CompositeMode) {
        self.mode = mode;
    }

    fn set_paint(&mut self, paint: &Paint) {
        self.paint = paint.clone();
    }

    fn fill_path(&mut self, path: &Path, rule: FillRule) {
        let Some(path) = to_skia_path(path) else {
            return;
        };
        let rule = match rule {
            FillRule::NonZero => tiny_skia::FillRule::Winding,
            FillRule::EvenOdd => tiny_skia::FillRule::EvenOdd,
        };
        let paint = self.skia_paint();
        let transform = self.skia_transform();
        self.target
            .pixmap
            .borrow_mut()
            .fill_path(&path, &paint, rule, transform, None);
    }

    fn stroke_path(&mut self, path: &Path, stroke: &Stroke) {
        let Some(path) = to_skia_path(path) else {
            return;
        };
        let stroke = tiny_skia::Stroke {
            width: stroke.width.max(0.0),
            miter_limit: stroke.miter_limit,
            line_cap: match stroke.cap {
                LineCap::Butt => tiny_skia::LineCap::Butt,
                LineCap::Round => tiny_skia::LineCap::Round,
                LineCap::Square => tiny_skia::LineCap::Square,
            },
            line_join: match stroke.join {
                LineJoin::Miter => tiny_skia::LineJoin::Miter,
                LineJoin::Round => tiny_skia::LineJoin::Round,
                LineJoin::Bevel => tiny_skia::LineJoin::Bevel,
            },
            dash: None,
        };
        let paint = self.skia_paint();
        let transform = self.skia_transform();
        self.target
            .pixmap
            .borrow_mut()
            .stroke_path(&path, &paint, &stroke, transform, None);
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let bounds = crate::geometry::rect_bounds(x, y, width, height);
        let Some(rect) = Rect::from_ltrb(bounds.min.x, bounds.min.y, bounds.max.x, bounds.max.y) else {
            return;
        };
        let paint = self.skia_paint();
        let transform = self.skia_transform();
        self.target
            .pixmap
            .borrow_mut()
            .fill_rect(rect, &paint, transform, None);
    }

    fn draw_texture(&mut self, texture: &SoftTexture, dst: Box2D, src: Box2D) {
        if dst.is_empty() || src.is_empty() {
            return;
        }
        let aliased;
        let borrowed;
        let source: &Pixmap = if Rc::ptr_eq(&texture.pixmap, &self.target.pixmap) {
            aliased = texture.pixmap.borrow().clone();
            &aliased
        } else {
            borrowed = texture.pixmap.borrow();
            &borrowed
        };

        if self.try_copy_pixels(source, &dst, &src) {
            return;
        }

        let sx = dst.width() / src.width();
        let sy = dst.height() / src.height();
        let quality = if sx == 1.0 && sy == 1.0 && classify(&self.transform) != TransformKind::General {
            FilterQuality::Nearest
        } else {
            FilterQuality::Bilinear
        };
        let pattern_transform = tiny_skia::Transform::from_row(
            sx,
            0.0,
            0.0,
            sy,
            dst.min.x - src.min.x * sx,
            dst.min.y - src.min.y * sy,
        );
        let paint = tiny_skia::Paint {
            shader: Pattern::new(
                source.as_ref(),
                SpreadMode::Pad,
                quality,
                self.alpha,
                pattern_transform,
            ),
            blend_mode: skia_blend_mode(self.mode),
            anti_alias: true,
            ..Default::default()
        };
        let Some(rect) = Rect::from_ltrb(dst.min.x, dst.min.y, dst.max.x, dst.max.y) else {
            return;
        };
        let transform = self.skia_transform();
        self.target
            .pixmap
            .borrow_mut()
            .fill_rect(rect, &paint, transform, None);
    }
}

fn to_skia_transform(t: &Transform) -> tiny_skia::Transform {
    tiny_skia::Transform::from_row(t.m11, t.m12, t.m21, t.m22, t.m31, t.m32)
}

fn skia_blend_mode(mode: CompositeMode) -> tiny_skia::BlendMode {
    match mode {
        CompositeMode::Clear => tiny_skia::BlendMode::Clear,
        CompositeMode::Src => tiny_skia::BlendMode::Source,
        CompositeMode::SrcOver => tiny_skia::BlendMode::SourceOver,
    }
}

fn to_skia_path(path: &Path) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new();
    for event in path.iter() {
        match event {
            PathEvent::Begin { at } => builder.move_to(at.x, at.y),
            PathEvent::Line { to, .. } => builder.line_to(to.x, to.y),
            PathEvent::Quadratic { ctrl, to, .. } => builder.quad_to(ctrl.x, ctrl.y, to.x, to.y),
            PathEvent::Cubic {
                ctrl1, ctrl2, to, ..
            } => builder.cubic_to(ctrl1.x, ctrl1.y, ctrl2.x, ctrl2.y, to.x, to.y),
            PathEvent::End { close, .. } => {
                if close {
                    builder.close();
                }
            }
        }
    }
    builder.finish()
}

fn skia_color(color: Color, alpha: f32) -> tiny_skia::Color {
    let [r, g, b, a] = color.with_alpha_scaled(alpha).to_array();
    tiny_skia::Color::from_rgba8(r, g, b, a)
}

fn skia_stops(stops: &[GradientStop], alpha: f32) -> Vec<SkiaStop> {
    stops
        .iter()
        .map(|stop| SkiaStop::new(stop.offset, skia_color(stop.color, alpha)))
        .collect()
}

fn spread_mode(cycle: CycleMethod) -> SpreadMode {
    match cycle {
        CycleMethod::Pad => SpreadMode::Pad,
        CycleMethod::Reflect => SpreadMode::Reflect,
        CycleMethod::Repeat => SpreadMode::Repeat,
    }
}

fn shader_for(paint: &Paint, alpha: f32) -> Shader<'static> {
    let (gradient, stops) = match paint {
        Paint::Solid(color) => return Shader::SolidColor(skia_color(*color, alpha)),
        Paint::Linear(linear) => (
            LinearGradient::new(
                tiny_skia::Point::from_xy(linear.start.x, linear.start.y),
                tiny_skia::Point::from_xy(linear.end.x, linear.end.y),
                skia_stops(&linear.stops, alpha),
                spread_mode(linear.cycle),
                tiny_skia::Transform::identity(),
            ),
            &linear.stops[..],
        ),
        Paint::Radial(radial) => (
            RadialGradient::new(
                tiny_skia::Point::from_xy(radial.focus.x, radial.focus.y),
                tiny_skia::Point::from_xy(radial.center.x, radial.center.y),
                radial.radius,
                skia_stops(&radial.stops, alpha),
                spread_mode(radial.cycle),
                tiny_skia::Transform::identity(),
            ),
            &radial.stops[..],
        ),
    };
    // Degenerate geometry paints the color at the far end.
    gradient.unwrap_or_else(|| Shader::SolidColor(skia_color(Paint::color_at(stops, 1.0), alpha)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyon::math::point;

    fn pixel(target: &SoftTarget, x: u32, y: u32) -> u32 {
        let mut pixels = Vec::new();
        target.read_pixels(&mut pixels).unwrap();
        pixels[(y * target.content_width() + x) as usize]
    }

    #[test]
    fn fill_rect_covers_exact_pixels() {
        let mut backend = SoftBackend::new();
        let target = backend.create_render_target(8, 8).unwrap();
        let mut g = backend.create_graphics(&target).unwrap();
        g.set_paint(&Paint::Solid(Color::rgb(255, 0, 0)));
        g.fill_rect(2.0, 2.0, 4.0, 4.0);
        assert_eq!(pixel(&target, 2, 2), 0xFFFF_0000);
        assert_eq!(pixel(&target, 5, 5), 0xFFFF_0000);
        assert_eq!(pixel(&target, 6, 6), 0);
        assert_eq!(pixel(&target, 1, 2), 0);
    }

    #[test]
    fn textures_round_trip_argb_words() {
        let mut backend = SoftBackend::new();
        let words = vec![0xFF10_2030, 0x8040_0000, 0, 0xFFFF_FFFF];
        let texture = backend.create_texture(2, 2, &words).unwrap();
        assert_eq!(texture.to_argb_pre(), words);
    }

    #[test]
    fn unscaled_replacement_blit_is_bit_exact() {
        let mut backend = SoftBackend::new();
        let words: Vec<u32> = (0..16).map(|i| 0x8000_0000 | (i * 0x0301)).collect();
        let texture = backend.create_texture(4, 4, &words).unwrap();
        let target = backend.create_render_target(6, 6).unwrap();
        let mut g = backend.create_graphics(&target).unwrap();
        g.set_composite_mode(CompositeMode::Src);
        g.draw_texture(
            &texture,
            Box2D::new(point(0.0, 0.0), point(4.0, 4.0)),
            Box2D::new(point(0.0, 0.0), point(4.0, 4.0)),
        );
        let mut pixels = Vec::new();
        target.read_pixels(&mut pixels).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(pixels[y * 6 + x], words[y * 4 + x]);
            }
        }
    }

    #[test]
    fn blend_src_in_masks_top_by_bottom_coverage() {
        let mut backend = SoftBackend::new();
        let top = backend.create_texture(2, 1, &[0xFF00_FF00, 0xFF00_FF00]).unwrap();
        let mask = backend.create_texture(1, 1, &[0xFFFF_FFFF]).unwrap();
        let result = backend
            .blend(
                &ImageData::new(top, IRect::new(0, 0, 2, 1)),
                &ImageData::new(mask, IRect::new(1, 0, 1, 1)),
                BlendMode::SrcIn,
                None,
            )
            .unwrap();
        assert_eq!(result.bounds, IRect::new(0, 0, 2, 1));
        assert_eq!(result.texture.to_argb_pre(), vec![0, 0xFF00_FF00]);
    }

    #[test]
    fn blend_result_is_cut_to_clip() {
        let mut backend = SoftBackend::new();
        let a = backend.create_texture(4, 4, &[0xFF00_0000; 16]).unwrap();
        let b = backend.create_texture(4, 4, &[0xFFFF_FFFF; 16]).unwrap();
        let result = backend
            .blend(
                &ImageData::new(a, IRect::new(0, 0, 4, 4)),
                &ImageData::new(b, IRect::new(0, 0, 4, 4)),
                BlendMode::SrcOver,
                Some(IRect::new(1, 1, 2, 2)),
            )
            .unwrap();
        assert_eq!(result.bounds, IRect::new(1, 1, 2, 2));
    }

    #[test]
    fn blur_spreads_alpha_and_grows_bounds() {
        let mut backend = SoftBackend::new();
        let input = backend.create_texture(1, 1, &[0xFFFF_FFFF]).unwrap();
        let result = backend
            .gaussian_blur(&ImageData::new(input, IRect::new(5, 5, 1, 1)), 3.0)
            .unwrap();
        assert_eq!(result.bounds, IRect::new(2, 2, 7, 7));
        let pixels = result.texture.to_argb_pre();
        let center = pixels[3 * 7 + 3] >> 24;
        let edge = pixels[3 * 7 + 1] >> 24;
        assert!(center > edge && edge > 0);
    }

    #[test]
    fn shadow_tints_blurred_alpha() {
        let mut backend = SoftBackend::new();
        let input = backend.create_texture(1, 1, &[0xFF00_FF00]).unwrap();
        let result = backend
            .shadow(&ImageData::new(input, IRect::new(0, 0, 1, 1)), 0.0, Color::rgb(255, 0, 0))
            .unwrap();
        assert_eq!(result.texture.to_argb_pre(), vec![0xFFFF_0000]);
    }

    #[test]
    fn device_loss_only_affects_volatile_targets() {
        let mut backend = SoftBackend::new().with_volatile_targets(true);
        let volatile = backend.create_render_target(4, 4).unwrap();
        let mut stable_backend = SoftBackend::new();
        let stable = stable_backend.create_render_target(4, 4).unwrap();

        backend.simulate_device_loss();
        stable_backend.simulate_device_loss();
        assert!(volatile.is_lost());
        assert!(backend.create_graphics(&volatile).is_none());
        assert!(!stable.is_lost());
        assert!(stable_backend.create_graphics(&stable).is_some());
    }

    #[test]
    fn dropping_targets_updates_live_count() {
        let mut backend = SoftBackend::new();
        let a = backend.create_render_target(2, 2).unwrap();
        let b = backend.create_render_target(2, 2).unwrap();
        assert_eq!(backend.live_targets(), 2);
        drop(a);
        assert_eq!(backend.live_targets(), 1);
        drop(b);
        assert_eq!(backend.allocations(), 2);
        assert_eq!(backend.live_targets(), 0);
    }

    #[test]
    fn drawing_a_target_into_itself_reads_a_snapshot() {
        let mut backend = SoftBackend::new();
        let target = backend.create_render_target(4, 2).unwrap();
        let mut g = backend.create_graphics(&target).unwrap();
        g.set_paint(&Paint::Solid(Color::WHITE));
        g.fill_rect(0.0, 0.0, 2.0, 2.0);
        g.set_composite_mode(CompositeMode::Src);
        g.draw_texture(
            &target.texture(),
            Box2D::new(point(2.0, 0.0), point(4.0, 2.0)),
            Box2D::new(point(0.0, 0.0), point(2.0, 2.0)),
        );
        assert_eq!(pixel(&target, 3, 1), 0xFFFF_FFFF);
    }
}
