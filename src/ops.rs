//! Drawing operations and the executor that either measures or renders them.
//!
//! Every drawing token decodes into a [`RenderOp`] once. The same op value
//! can then be measured (device-space bounds), rendered into a drawing
//! context, or both, through [`execute_op`]. Effects rely on this: an op is
//! measured first and rendered later into whatever buffer the filter asks
//! for.

use std::fmt;

use lyon::math::{point, Box2D};
use tracing::warn;

use crate::backend::{Backend, Graphics};
use crate::cache::ImageCache;
use crate::error::CanvasError;
use crate::geometry::{rect_bounds, sorted_bounds, tx_bounds};
use crate::image::Image;
use crate::shape::{arc_path, line_path, oval_path, path_bounds, rect_path, round_rect_path, FillRule};
use crate::state::RenderState;
use crate::stream::{CommandReader, Token};
use crate::text::{ShapedText, TextPlacement, TextShaper, Font};
use crate::Color;

/// Rectangle operands `(x, y, w, h)` as recorded in the stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectArgs {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl RectArgs {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    fn read(reader: &mut CommandReader) -> Result<Self, CanvasError> {
        Ok(Self {
            x: reader.get_f32()?,
            y: reader.get_f32()?,
            w: reader.get_f32()?,
            h: reader.get_f32()?,
        })
    }

    pub fn bounds(&self) -> Box2D {
        rect_bounds(self.x, self.y, self.w, self.h)
    }
}

/// A decoded drawing command.
#[derive(Debug, Clone)]
pub enum RenderOp {
    FillPath,
    StrokePath,
    StrokeLine { x1: f32, y1: f32, x2: f32, y2: f32 },
    FillRect(RectArgs),
    ClearRect(RectArgs),
    StrokeRect(RectArgs),
    FillOval(RectArgs),
    StrokeOval(RectArgs),
    FillRoundRect { rect: RectArgs, arc_w: f32, arc_h: f32 },
    StrokeRoundRect { rect: RectArgs, arc_w: f32, arc_h: f32 },
    FillArc { rect: RectArgs, start: f32, extent: f32 },
    StrokeArc { rect: RectArgs, start: f32, extent: f32 },
    /// `src` is `None` for the whole image.
    DrawImage {
        image: Image,
        dst: RectArgs,
        src: Option<RectArgs>,
    },
    FillText { text: String, x: f32, y: f32, max_width: f32 },
    StrokeText { text: String, x: f32, y: f32, max_width: f32 },
}

impl RenderOp {
    /// Reads the operands of drawing token `token`. The opcode byte has
    /// already been consumed.
    pub(crate) fn decode(token: Token, reader: &mut CommandReader) -> Result<RenderOp, CanvasError> {
        let op = match token {
            Token::FillPath => RenderOp::FillPath,
            Token::StrokePath => RenderOp::StrokePath,
            Token::StrokeLine => RenderOp::StrokeLine {
                x1: reader.get_f32()?,
                y1: reader.get_f32()?,
                x2: reader.get_f32()?,
                y2: reader.get_f32()?,
            },
            Token::FillRect => RenderOp::FillRect(RectArgs::read(reader)?),
            Token::ClearRect => RenderOp::ClearRect(RectArgs::read(reader)?),
            Token::StrokeRect => RenderOp::StrokeRect(RectArgs::read(reader)?),
            Token::FillOval => RenderOp::FillOval(RectArgs::read(reader)?),
            Token::StrokeOval => RenderOp::StrokeOval(RectArgs::read(reader)?),
            Token::FillRoundRect => RenderOp::FillRoundRect {
                rect: RectArgs::read(reader)?,
                arc_w: reader.get_f32()?,
                arc_h: reader.get_f32()?,
            },
            Token::StrokeRoundRect => RenderOp::StrokeRoundRect {
                rect: RectArgs::read(reader)?,
                arc_w: reader.get_f32()?,
                arc_h: reader.get_f32()?,
            },
            Token::FillArc => RenderOp::FillArc {
                rect: RectArgs::read(reader)?,
                start: reader.get_f32()?,
                extent: reader.get_f32()?,
            },
            Token::StrokeArc => RenderOp::StrokeArc {
                rect: RectArgs::read(reader)?,
                start: reader.get_f32()?,
                extent: reader.get_f32()?,
            },
            Token::DrawImage => {
                let dst = RectArgs::read(reader)?;
                RenderOp::DrawImage {
                    image: reader.get_image()?,
                    dst,
                    src: None,
                }
            }
            Token::DrawSubImage => {
                let dst = RectArgs::read(reader)?;
                let image = reader.get_image()?;
                RenderOp::DrawImage {
                    image,
                    dst,
                    src: Some(RectArgs::read(reader)?),
                }
            }
            Token::FillText | Token::StrokeText => {
                let x = reader.get_f32()?;
                let y = reader.get_f32()?;
                let max_width = reader.get_f32()?;
                let text = reader.get_text()?;
                if token == Token::FillText {
                    RenderOp::FillText { text, x, y, max_width }
                } else {
                    RenderOp::StrokeText { text, x, y, max_width }
                }
            }
            other => {
                return Err(CanvasError::UnknownToken {
                    token: other as u8,
                    offset: reader.position().saturating_sub(1),
                })
            }
        };
        Ok(op)
    }

    pub fn name(&self) -> &'static str {
        match self {
            RenderOp::FillPath => "fill_path",
            RenderOp::StrokePath => "stroke_path",
            RenderOp::StrokeLine { .. } => "stroke_line",
            RenderOp::FillRect(_) => "fill_rect",
            RenderOp::ClearRect(_) => "clear_rect",
            RenderOp::StrokeRect(_) => "stroke_rect",
            RenderOp::FillOval(_) => "fill_oval",
            RenderOp::StrokeOval(_) => "stroke_oval",
            RenderOp::FillRoundRect { .. } => "fill_round_rect",
            RenderOp::StrokeRoundRect { .. } => "stroke_round_rect",
            RenderOp::FillArc { .. } => "fill_arc",
            RenderOp::StrokeArc { .. } => "stroke_arc",
            RenderOp::DrawImage { .. } => "draw_image",
            RenderOp::FillText { .. } => "fill_text",
            RenderOp::StrokeText { .. } => "stroke_text",
        }
    }
}

/// What [`execute_op`] should do with an op.
pub enum ExecMode<'g, G> {
    /// Compute device bounds only.
    Measure,
    /// Draw into the context only.
    Render(&'g mut G),
    /// Draw and report device bounds.
    Both(&'g mut G),
}

impl<G> ExecMode<'_, G> {
    pub fn measures(&self) -> bool {
        !matches!(self, ExecMode::Render(_))
    }

    fn graphics(&mut self) -> Option<&mut G> {
        match self {
            ExecMode::Measure => None,
            ExecMode::Render(g) | ExecMode::Both(g) => Some(&mut **g),
        }
    }
}

/// The optional text shaper, plus a flag so a missing shaper is only
/// reported once.
#[derive(Default)]
pub struct TextSupport {
    shaper: Option<Box<dyn TextShaper>>,
    warned_missing: bool,
}

impl fmt::Debug for TextSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextSupport")
            .field("has_shaper", &self.shaper.is_some())
            .finish()
    }
}

impl TextSupport {
    pub fn new(shaper: Option<Box<dyn TextShaper>>) -> Self {
        Self {
            shaper,
            warned_missing: false,
        }
    }

    pub fn set_shaper(&mut self, shaper: Box<dyn TextShaper>) {
        self.shaper = Some(shaper);
    }

    fn shape(&mut self, text: &str, font: &Font) -> Option<ShapedText> {
        match self.shaper.as_mut() {
            Some(shaper) => Some(shaper.shape(text, font)),
            None => {
                if !self.warned_missing {
                    warn!("no text shaper installed, text operations draw nothing");
                    self.warned_missing = true;
                }
                None
            }
        }
    }
}

/// Services an op needs beyond the render state.
pub struct OpResources<'a, B: Backend> {
    pub backend: &'a mut B,
    pub images: &'a mut ImageCache<B::Texture>,
    pub text: &'a mut TextSupport,
}

impl<B: Backend> OpResources<'_, B> {
    fn image_texture(&mut self, image: &Image) -> Result<B::Texture, CanvasError> {
        if let Some(texture) = self.images.get_texture(&image.id()) {
            return Ok(texture);
        }
        let texture = self
            .backend
            .create_texture(image.width(), image.height(), image.pixels())?;
        self.images.insert_texture(image.id(), texture.clone());
        Ok(texture)
    }
}

/// Measures and/or renders `op`.
///
/// When rendering, the caller has already set the context's transform and
/// extra alpha; the op only sets its paint. Returns device-space bounds when
/// `mode` measures, `None` otherwise or when the op covers nothing.
pub fn execute_op<B: Backend>(
    op: &RenderOp,
    state: &mut RenderState,
    res: &mut OpResources<'_, B>,
    mut mode: ExecMode<'_, B::Graphics>,
) -> Result<Option<Box2D>, CanvasError> {
    let measure = mode.measures();
    let transform = *state.transform();
    let mut bounds = None;

    match op {
        RenderOp::FillPath => {
            let path = state.user_space_path();
            if measure {
                bounds = path_bounds(path.device_path());
            }
            if let Some(g) = mode.graphics() {
                g.set_paint(&state.fill_paint);
                g.fill_path(&path.user_path(), state.fill_rule);
            }
        }
        RenderOp::StrokePath => {
            let path = state.user_space_path().user_path();
            let stroke = state.stroke();
            if measure {
                bounds = stroke.accumulate_shape_bounds(&path, &transform);
            }
            if let Some(g) = mode.graphics() {
                g.set_paint(&state.stroke_paint);
                g.stroke_path(&path, &stroke);
            }
        }
        RenderOp::StrokeLine { x1, y1, x2, y2 } => {
            let stroke = state.stroke();
            if measure {
                let growth = stroke.bounds_growth();
                let line = sorted_bounds(*x1, *y1, *x2, *y2).inflate(growth, growth);
                bounds = Some(tx_bounds(line, &transform));
            }
            if let Some(g) = mode.graphics() {
                g.set_paint(&state.stroke_paint);
                g.stroke_path(&line_path(*x1, *y1, *x2, *y2), &stroke);
            }
        }
        RenderOp::FillRect(rect) => {
            if measure {
                bounds = Some(tx_bounds(rect.bounds(), &transform));
            }
            if let Some(g) = mode.graphics() {
                g.set_paint(&state.fill_paint);
                g.fill_rect(rect.x, rect.y, rect.w, rect.h);
            }
        }
        RenderOp::ClearRect(rect) => {
            if measure {
                bounds = Some(tx_bounds(rect.bounds(), &transform));
            }
            if let Some(g) = mode.graphics() {
                g.set_paint(&Color::TRANSPARENT.into());
                g.set_composite_mode(crate::effect::CompositeMode::Clear);
                g.fill_rect(rect.x, rect.y, rect.w, rect.h);
                g.set_composite_mode(crate::effect::CompositeMode::SrcOver);
            }
        }
        RenderOp::StrokeRect(rect) | RenderOp::StrokeOval(rect) => {
            let stroke = state.stroke();
            if measure {
                let growth = stroke.bounds_growth();
                bounds = Some(tx_bounds(rect.bounds().inflate(growth, growth), &transform));
            }
            if let Some(g) = mode.graphics() {
                let path = match op {
                    RenderOp::StrokeOval(_) => oval_path(rect.x, rect.y, rect.w, rect.h),
                    _ => rect_path(rect.x, rect.y, rect.w, rect.h),
                };
                g.set_paint(&state.stroke_paint);
                g.stroke_path(&path, &stroke);
            }
        }
        RenderOp::FillOval(rect) => {
            if measure {
                bounds = Some(tx_bounds(rect.bounds(), &transform));
            }
            if let Some(g) = mode.graphics() {
                g.set_paint(&state.fill_paint);
                g.fill_path(&oval_path(rect.x, rect.y, rect.w, rect.h), FillRule::NonZero);
            }
        }
        RenderOp::FillRoundRect { rect, arc_w, arc_h } => {
            if measure {
                bounds = Some(tx_bounds(rect.bounds(), &transform));
            }
            if let Some(g) = mode.graphics() {
                let path = round_rect_path(rect.x, rect.y, rect.w, rect.h, *arc_w, *arc_h);
                g.set_paint(&state.fill_paint);
                g.fill_path(&path, FillRule::NonZero);
            }
        }
        RenderOp::StrokeRoundRect { rect, arc_w, arc_h } => {
            let stroke = state.stroke();
            if measure {
                let growth = stroke.bounds_growth();
                bounds = Some(tx_bounds(rect.bounds().inflate(growth, growth), &transform));
            }
            if let Some(g) = mode.graphics() {
                let path = round_rect_path(rect.x, rect.y, rect.w, rect.h, *arc_w, *arc_h);
                g.set_paint(&state.stroke_paint);
                g.stroke_path(&path, &stroke);
            }
        }
        RenderOp::FillArc { rect, start, extent } => {
            let path = arc_path(rect.x, rect.y, rect.w, rect.h, *start, *extent, state.arc_type);
            if measure {
                bounds = path_bounds(&path).map(|b| tx_bounds(b, &transform));
            }
            if let Some(g) = mode.graphics() {
                g.set_paint(&state.fill_paint);
                g.fill_path(&path, FillRule::NonZero);
            }
        }
        RenderOp::StrokeArc { rect, start, extent } => {
            let path = arc_path(rect.x, rect.y, rect.w, rect.h, *start, *extent, state.arc_type);
            let stroke = state.stroke();
            if measure {
                bounds = stroke.accumulate_shape_bounds(&path, &transform);
            }
            if let Some(g) = mode.graphics() {
                g.set_paint(&state.stroke_paint);
                g.stroke_path(&path, &stroke);
            }
        }
        RenderOp::DrawImage { image, dst, src } => {
            if measure {
                bounds = Some(tx_bounds(dst.bounds(), &transform));
            }
            if image.width() > 0 && image.height() > 0 {
                if let Some(g) = mode.graphics() {
                    let texture = res.image_texture(image)?;
                    let src = src
                        .map(|s| s.bounds())
                        .unwrap_or_else(|| {
                            Box2D::new(point(0.0, 0.0), point(image.width() as f32, image.height() as f32))
                        });
                    g.draw_texture(&texture, dst.bounds(), src);
                }
            }
        }
        RenderOp::FillText { text, x, y, max_width } | RenderOp::StrokeText { text, x, y, max_width } => {
            let Some(shaped) = res.text.shape(text, &state.font) else {
                return Ok(None);
            };
            let fill = matches!(op, RenderOp::FillText { .. });
            let placement =
                TextPlacement::compute(&shaped, *x, *y, *max_width, state.text_align, state.text_baseline);
            let stroke = state.stroke();
            if measure {
                let growth = if fill { 0.0 } else { stroke.bounds_growth() };
                bounds = placement
                    .outline_bounds(&shaped)
                    .map(|b| tx_bounds(b.inflate(growth, growth), &transform));
            }
            if let Some(g) = mode.graphics() {
                let saved = g.transform();
                g.set_transform(placement.local.then(&saved));
                if fill {
                    g.set_paint(&state.fill_paint);
                    g.fill_path(&shaped.outline, FillRule::NonZero);
                } else {
                    g.set_paint(&state.stroke_paint);
                    g.stroke_path(&shaped.outline, &stroke);
                }
                g.set_transform(saved);
            }
        }
    }

    Ok(bounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::soft::SoftBackend;
    use crate::backend::RenderTarget;
    use crate::stream::{Command, CommandWriter};
    use lyon::math::{vector, Transform};
    use std::num::NonZeroUsize;

    struct Fixture {
        backend: SoftBackend,
        images: ImageCache<crate::backend::soft::SoftTexture>,
        text: TextSupport,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                backend: SoftBackend::new(),
                images: ImageCache::new(NonZeroUsize::new(4).unwrap()),
                text: TextSupport::default(),
            }
        }

        fn resources(&mut self) -> OpResources<'_, SoftBackend> {
            OpResources {
                backend: &mut self.backend,
                images: &mut self.images,
                text: &mut self.text,
            }
        }
    }

    fn measure(op: &RenderOp, state: &mut RenderState) -> Option<Box2D> {
        let mut fixture = Fixture::new();
        execute_op(op, state, &mut fixture.resources(), ExecMode::Measure).unwrap()
    }

    struct WideShaper;

    impl TextShaper for WideShaper {
        fn shape(&mut self, text: &str, font: &Font) -> ShapedText {
            let width = text.len() as f32 * font.size;
            ShapedText {
                outline: rect_path(0.0, -font.size, width, font.size),
                logical_width: width,
                ascent: font.size,
                descent: 0.0,
            }
        }
    }

    #[test]
    fn sub_image_operands_straddle_the_image_object() {
        let image = Image::solid(4, 4, Color::WHITE);
        let mut writer = CommandWriter::new();
        writer.draw_sub_image(image.clone(), 1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 2.0, 2.0);
        let mut reader = writer.finish().into_reader();
        match reader.next_command() {
            Ok(Some(Command::Render(RenderOp::DrawImage { image: decoded, dst, src }))) => {
                assert_eq!(decoded.id(), image.id());
                assert_eq!(dst, RectArgs::new(1.0, 2.0, 3.0, 4.0));
                assert_eq!(src, Some(RectArgs::new(0.0, 0.0, 2.0, 2.0)));
            }
            other => panic!("expected a sub-image draw, got {other:?}"),
        }
    }

    #[test]
    fn fill_rect_bounds_follow_translation() {
        let mut state = RenderState::default();
        state.set_transform(Transform::translation(10.0, 5.0));
        let bounds = measure(&RenderOp::FillRect(RectArgs::new(0.0, 0.0, 4.0, 3.0)), &mut state).unwrap();
        assert_eq!(bounds, Box2D::new(point(10.0, 5.0), point(14.0, 8.0)));
    }

    #[test]
    fn stroke_rect_bounds_grow_by_half_the_width() {
        let mut state = RenderState::default();
        state.set_line_width(4.0);
        let bounds = measure(&RenderOp::StrokeRect(RectArgs::new(10.0, 10.0, 10.0, 10.0)), &mut state).unwrap();
        assert_eq!(bounds, Box2D::new(point(8.0, 8.0), point(22.0, 22.0)));
    }

    #[test]
    fn stroke_line_bounds_sort_endpoints() {
        let mut state = RenderState::default();
        state.set_line_width(2.0);
        let op = RenderOp::StrokeLine { x1: 10.0, y1: 10.0, x2: 0.0, y2: 0.0 };
        let bounds = measure(&op, &mut state).unwrap();
        assert_eq!(bounds, Box2D::new(point(-1.0, -1.0), point(11.0, 11.0)));
    }

    #[test]
    fn fill_path_bounds_are_device_space() {
        let mut state = RenderState::default();
        state.path.move_to(2.0, 3.0);
        state.path.line_to(8.0, 3.0);
        state.path.line_to(8.0, 9.0);
        state.path.close();
        state.set_transform(Transform::scale(2.0, 2.0).then_translate(vector(5.0, 5.0)));
        let bounds = measure(&RenderOp::FillPath, &mut state).unwrap();
        assert_eq!(bounds, Box2D::new(point(2.0, 3.0), point(8.0, 9.0)));
    }

    #[test]
    fn text_without_a_shaper_measures_nothing() {
        let mut state = RenderState::default();
        let op = RenderOp::FillText {
            text: "hello".into(),
            x: 0.0,
            y: 0.0,
            max_width: 0.0,
        };
        assert_eq!(measure(&op, &mut state), None);
    }

    #[test]
    fn text_bounds_respect_alignment_and_max_width() {
        let mut fixture = Fixture::new();
        fixture.text.set_shaper(Box::new(WideShaper));
        let mut state = RenderState::default();
        state.font = Font::new("Block", 10.0);
        state.text_align = crate::text::TextAlign::Right;
        let op = RenderOp::FillText {
            text: "abcd".into(),
            x: 100.0,
            y: 50.0,
            max_width: 20.0,
        };
        let bounds = execute_op(&op, &mut state, &mut fixture.resources(), ExecMode::Measure)
            .unwrap()
            .unwrap();
        assert_eq!(bounds, Box2D::new(point(80.0, 40.0), point(100.0, 50.0)));
    }

    #[test]
    fn both_mode_renders_and_measures() {
        let mut fixture = Fixture::new();
        let target = fixture.backend.create_render_target(8, 8).unwrap();
        let mut g = fixture.backend.create_graphics(&target).unwrap();
        let mut state = RenderState::default();
        let op = RenderOp::FillRect(RectArgs::new(1.0, 1.0, 2.0, 2.0));
        let bounds = execute_op(&op, &mut state, &mut fixture.resources(), ExecMode::Both(&mut g)).unwrap();
        assert_eq!(bounds, Some(Box2D::new(point(1.0, 1.0), point(3.0, 3.0))));
        let mut pixels = Vec::new();
        target.read_pixels(&mut pixels).unwrap();
        assert_eq!(pixels[8 + 1], 0xFF00_0000);
        assert_eq!(pixels[0], 0);
    }

    #[test]
    fn images_upload_once_per_identity() {
        let mut fixture = Fixture::new();
        let target = fixture.backend.create_render_target(4, 4).unwrap();
        let mut g = fixture.backend.create_graphics(&target).unwrap();
        let mut state = RenderState::default();
        let op = RenderOp::DrawImage {
            image: Image::solid(2, 2, Color::WHITE),
            dst: RectArgs::new(0.0, 0.0, 2.0, 2.0),
            src: None,
        };
        for _ in 0..3 {
            execute_op(&op, &mut state, &mut fixture.resources(), ExecMode::Render(&mut g)).unwrap();
        }
        assert_eq!(fixture.images.len(), 1);
    }
}
