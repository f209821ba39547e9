use super::*;

/// Records commands into a [`CommandBuffer`].
///
/// Path and clip coordinates are device-space: callers that keep a user
/// transform apply it before recording, exactly as the drawing API that
/// feeds the canvas does.
///
/// # Examples
///
/// ```
/// use deferred_canvas::CommandWriter;
///
/// let mut writer = CommandWriter::new();
/// writer.begin_path();
/// writer.move_to(0.0, 0.0);
/// writer.line_to(10.0, 0.0);
/// writer.line_to(10.0, 10.0);
/// writer.close_path();
/// writer.end_path();
/// writer.fill_path();
/// let buffer = writer.finish();
/// assert_eq!(buffer.object_len(), 0);
/// ```
#[derive(Debug, Default)]
pub struct CommandWriter {
    bytes: Vec<u8>,
    objects: Vec<StreamObject>,
}

impl CommandWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> CommandBuffer {
        CommandBuffer::from_parts(self.bytes, self.objects)
    }

    fn token(&mut self, token: Token) -> &mut Self {
        self.bytes.push(token as u8);
        self
    }

    fn f32s(&mut self, values: &[f32]) -> &mut Self {
        for value in values {
            self.bytes.extend_from_slice(&value.to_le_bytes());
        }
        self
    }

    fn i32s(&mut self, values: &[i32]) -> &mut Self {
        for value in values {
            self.bytes.extend_from_slice(&value.to_le_bytes());
        }
        self
    }

    fn object(&mut self, object: StreamObject) -> &mut Self {
        self.objects.push(object);
        self
    }

    // ── Path construction ───────────────────────────────────────────────────

    pub fn begin_path(&mut self) -> &mut Self {
        self.token(Token::PathStart)
    }

    pub fn move_to(&mut self, x: f32, y: f32) -> &mut Self {
        self.token(Token::MoveTo).f32s(&[x, y])
    }

    pub fn line_to(&mut self, x: f32, y: f32) -> &mut Self {
        self.token(Token::LineTo).f32s(&[x, y])
    }

    pub fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) -> &mut Self {
        self.token(Token::QuadTo).f32s(&[cx, cy, x, y])
    }

    pub fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) -> &mut Self {
        self.token(Token::CubicTo).f32s(&[c1x, c1y, c2x, c2y, x, y])
    }

    pub fn close_path(&mut self) -> &mut Self {
        self.token(Token::ClosePath)
    }

    pub fn end_path(&mut self) -> &mut Self {
        self.token(Token::PathEnd)
    }

    // ── Clip ────────────────────────────────────────────────────────────────

    /// Intersects the clip with a device-space path.
    pub fn push_clip(&mut self, path: Path) -> &mut Self {
        self.token(Token::PushClip).object(StreamObject::Path(path))
    }

    pub fn pop_clip(&mut self) -> &mut Self {
        self.token(Token::PopClip)
    }

    // ── State ───────────────────────────────────────────────────────────────

    pub fn set_arc_type(&mut self, arc_type: ArcType) -> &mut Self {
        let byte = match arc_type {
            ArcType::Open => 0,
            ArcType::Chord => 1,
            ArcType::Pie => 2,
        };
        self.token(Token::ArcType);
        self.bytes.push(byte);
        self
    }

    /// Sets the transform `x' = mxx*x + mxy*y + mxt`, `y' = myx*x + myy*y + myt`.
    pub fn set_transform(&mut self, mxx: f64, mxy: f64, mxt: f64, myx: f64, myy: f64, myt: f64) -> &mut Self {
        self.token(Token::Transform);
        for value in [mxx, mxy, mxt, myx, myy, myt] {
            self.bytes.extend_from_slice(&value.to_le_bytes());
        }
        self
    }

    pub fn set_global_alpha(&mut self, alpha: f32) -> &mut Self {
        self.token(Token::GlobalAlpha).f32s(&[alpha])
    }

    pub fn set_fill_rule(&mut self, rule: FillRule) -> &mut Self {
        self.token(Token::FillRule);
        self.bytes.push(match rule {
            FillRule::NonZero => 0,
            FillRule::EvenOdd => 1,
        });
        self
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) -> &mut Self {
        self.token(Token::CompMode).object(StreamObject::Blend(mode))
    }

    pub fn set_fill_paint(&mut self, paint: impl Into<Paint>) -> &mut Self {
        self.token(Token::FillPaint)
            .object(StreamObject::Paint(paint.into()))
    }

    pub fn set_stroke_paint(&mut self, paint: impl Into<Paint>) -> &mut Self {
        self.token(Token::StrokePaint)
            .object(StreamObject::Paint(paint.into()))
    }

    pub fn set_line_width(&mut self, width: f32) -> &mut Self {
        self.token(Token::LineWidth).f32s(&[width])
    }

    pub fn set_line_cap(&mut self, cap: LineCap) -> &mut Self {
        self.token(Token::LineCap);
        self.bytes.push(match cap {
            LineCap::Butt => 0,
            LineCap::Round => 1,
            LineCap::Square => 2,
        });
        self
    }

    pub fn set_line_join(&mut self, join: LineJoin) -> &mut Self {
        self.token(Token::LineJoin);
        self.bytes.push(match join {
            LineJoin::Miter => 0,
            LineJoin::Round => 1,
            LineJoin::Bevel => 2,
        });
        self
    }

    pub fn set_miter_limit(&mut self, limit: f32) -> &mut Self {
        self.token(Token::MiterLimit).f32s(&[limit])
    }

    pub fn set_font(&mut self, font: Font) -> &mut Self {
        self.token(Token::Font).object(StreamObject::Font(font))
    }

    pub fn set_text_align(&mut self, align: TextAlign) -> &mut Self {
        self.token(Token::TextAlign);
        self.bytes.push(match align {
            TextAlign::Left => 0,
            TextAlign::Center => 1,
            TextAlign::Right => 2,
        });
        self
    }

    pub fn set_text_baseline(&mut self, baseline: TextBaseline) -> &mut Self {
        self.token(Token::TextBaseline);
        self.bytes.push(match baseline {
            TextBaseline::Top => 0,
            TextBaseline::Middle => 1,
            TextBaseline::Alphabetic => 2,
            TextBaseline::Bottom => 3,
        });
        self
    }

    /// Sets (or with `None` clears) the effect applied to each later draw.
    pub fn set_effect(&mut self, effect: Option<Effect>) -> &mut Self {
        self.token(Token::Effect).object(StreamObject::Effect(effect))
    }

    // ── Direct pixel writes and canvas effects ──────────────────────────────

    /// Writes one straight-alpha `0xAARRGGBB` pixel.
    pub fn put_argb(&mut self, x: i32, y: i32, argb: u32) -> &mut Self {
        self.token(Token::PutArgb).i32s(&[x, y, argb as i32])
    }

    /// Writes a block of premultiplied BGRA bytes at `(x, y)`.
    pub fn put_argb_pre_buf(&mut self, x: i32, y: i32, width: i32, height: i32, bgra_pre: Vec<u8>) -> &mut Self {
        self.token(Token::PutArgbPreBuf)
            .i32s(&[x, y, width, height])
            .object(StreamObject::Bytes(bgra_pre))
    }

    /// Filters the current canvas content in place.
    pub fn apply_effect(&mut self, effect: Effect) -> &mut Self {
        self.token(Token::FxApplyEffect)
            .object(StreamObject::Effect(Some(effect)))
    }

    // ── Drawing ─────────────────────────────────────────────────────────────

    pub fn fill_path(&mut self) -> &mut Self {
        self.token(Token::FillPath)
    }

    pub fn stroke_path(&mut self) -> &mut Self {
        self.token(Token::StrokePath)
    }

    pub fn stroke_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> &mut Self {
        self.token(Token::StrokeLine).f32s(&[x1, y1, x2, y2])
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32) -> &mut Self {
        self.token(Token::FillRect).f32s(&[x, y, w, h])
    }

    pub fn clear_rect(&mut self, x: f32, y: f32, w: f32, h: f32) -> &mut Self {
        self.token(Token::ClearRect).f32s(&[x, y, w, h])
    }

    pub fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32) -> &mut Self {
        self.token(Token::StrokeRect).f32s(&[x, y, w, h])
    }

    pub fn fill_oval(&mut self, x: f32, y: f32, w: f32, h: f32) -> &mut Self {
        self.token(Token::FillOval).f32s(&[x, y, w, h])
    }

    pub fn stroke_oval(&mut self, x: f32, y: f32, w: f32, h: f32) -> &mut Self {
        self.token(Token::StrokeOval).f32s(&[x, y, w, h])
    }

    pub fn fill_round_rect(&mut self, x: f32, y: f32, w: f32, h: f32, arc_w: f32, arc_h: f32) -> &mut Self {
        self.token(Token::FillRoundRect)
            .f32s(&[x, y, w, h, arc_w, arc_h])
    }

    pub fn stroke_round_rect(&mut self, x: f32, y: f32, w: f32, h: f32, arc_w: f32, arc_h: f32) -> &mut Self {
        self.token(Token::StrokeRoundRect)
            .f32s(&[x, y, w, h, arc_w, arc_h])
    }

    pub fn fill_arc(&mut self, x: f32, y: f32, w: f32, h: f32, start: f32, extent: f32) -> &mut Self {
        self.token(Token::FillArc)
            .f32s(&[x, y, w, h, start, extent])
    }

    pub fn stroke_arc(&mut self, x: f32, y: f32, w: f32, h: f32, start: f32, extent: f32) -> &mut Self {
        self.token(Token::StrokeArc)
            .f32s(&[x, y, w, h, start, extent])
    }

    pub fn draw_image(&mut self, image: Image, dx: f32, dy: f32, dw: f32, dh: f32) -> &mut Self {
        self.token(Token::DrawImage)
            .f32s(&[dx, dy, dw, dh])
            .object(StreamObject::Image(image))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_sub_image(
        &mut self,
        image: Image,
        dx: f32,
        dy: f32,
        dw: f32,
        dh: f32,
        sx: f32,
        sy: f32,
        sw: f32,
        sh: f32,
    ) -> &mut Self {
        self.token(Token::DrawSubImage)
            .f32s(&[dx, dy, dw, dh])
            .object(StreamObject::Image(image))
            .f32s(&[sx, sy, sw, sh])
    }

    /// `max_width <= 0` disables compression.
    pub fn fill_text(&mut self, text: impl Into<String>, x: f32, y: f32, max_width: f32) -> &mut Self {
        self.token(Token::FillText)
            .f32s(&[x, y, max_width])
            .object(StreamObject::Text(text.into()))
    }

    pub fn stroke_text(&mut self, text: impl Into<String>, x: f32, y: f32, max_width: f32) -> &mut Self {
        self.token(Token::StrokeText)
            .f32s(&[x, y, max_width])
            .object(StreamObject::Text(text.into()))
    }
}
