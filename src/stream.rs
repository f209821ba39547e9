//! The canvas command stream: tokens, the buffer handed to the canvas, and
//! the cursor that decodes it.
//!
//! A stream is a flat byte sequence of one-byte opcodes followed by
//! little-endian operands, plus a parallel queue of heap objects (paths,
//! images, paints, fonts, strings, effects, blend modes) consumed in order.
//! Decoding never skips unknown bytes: the first unrecognized opcode aborts
//! the stream with [`CanvasError::UnknownToken`].

use std::collections::VecDeque;

use lyon::path::Path;

use crate::effect::{BlendMode, Effect};
use crate::error::CanvasError;
use crate::image::Image;
use crate::ops::RenderOp;
use crate::paint::Paint;
use crate::shape::{ArcType, FillRule};
use crate::stroke::{LineCap, LineJoin};
use crate::text::{Font, TextAlign, TextBaseline};

mod writer;

pub use writer::CommandWriter;

// ── Tokens ───────────────────────────────────────────────────────────────────

macro_rules! tokens {
    ($($name:ident = $value:literal),* $(,)?) => {
        /// Stream opcodes.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Token {
            $($name = $value),*
        }

        impl Token {
            pub fn from_byte(byte: u8) -> Option<Token> {
                match byte {
                    $($value => Some(Token::$name),)*
                    _ => None,
                }
            }
        }
    };
}

tokens! {
    PathStart = 0x01,
    MoveTo = 0x02,
    LineTo = 0x03,
    QuadTo = 0x04,
    CubicTo = 0x05,
    ClosePath = 0x06,
    PathEnd = 0x07,

    PushClip = 0x10,
    PopClip = 0x11,

    ArcType = 0x20,
    Transform = 0x21,
    GlobalAlpha = 0x22,
    FillRule = 0x23,
    CompMode = 0x24,
    FillPaint = 0x25,
    StrokePaint = 0x26,
    LineWidth = 0x27,
    LineCap = 0x28,
    LineJoin = 0x29,
    MiterLimit = 0x2A,
    Font = 0x2B,
    TextAlign = 0x2C,
    TextBaseline = 0x2D,
    Effect = 0x2E,

    PutArgb = 0x30,
    PutArgbPreBuf = 0x31,
    FxApplyEffect = 0x32,

    FillPath = 0x40,
    StrokePath = 0x41,
    StrokeLine = 0x42,
    FillRect = 0x43,
    ClearRect = 0x44,
    StrokeRect = 0x45,
    FillOval = 0x46,
    StrokeOval = 0x47,
    FillRoundRect = 0x48,
    StrokeRoundRect = 0x49,
    FillArc = 0x4A,
    StrokeArc = 0x4B,
    DrawImage = 0x4C,
    DrawSubImage = 0x4D,
    FillText = 0x4E,
    StrokeText = 0x4F,
}

impl Token {
    /// True for opcodes that draw and go through destination selection.
    pub fn is_render_op(self) -> bool {
        (self as u8) >= Token::FillPath as u8
    }
}

// ── Objects ──────────────────────────────────────────────────────────────────

/// Heap operands carried next to the byte stream.
#[derive(Debug, Clone)]
pub enum StreamObject {
    Path(Path),
    Image(Image),
    Bytes(Vec<u8>),
    Paint(Paint),
    Font(Font),
    Text(String),
    Effect(Option<Effect>),
    Blend(BlendMode),
}

impl StreamObject {
    pub fn kind(&self) -> &'static str {
        match self {
            StreamObject::Path(_) => "path",
            StreamObject::Image(_) => "image",
            StreamObject::Bytes(_) => "byte buffer",
            StreamObject::Paint(_) => "paint",
            StreamObject::Font(_) => "font",
            StreamObject::Text(_) => "string",
            StreamObject::Effect(_) => "effect",
            StreamObject::Blend(_) => "blend mode",
        }
    }
}

// ── Buffer and reader ────────────────────────────────────────────────────────

/// A recorded command stream, ready to hand to a canvas.
#[derive(Debug, Clone, Default)]
pub struct CommandBuffer {
    pub(crate) bytes: Vec<u8>,
    pub(crate) objects: VecDeque<StreamObject>,
}

impl CommandBuffer {
    /// Builds a buffer from raw parts, e.g. bytes received from another
    /// process.
    pub fn from_parts(bytes: Vec<u8>, objects: Vec<StreamObject>) -> Self {
        Self {
            bytes,
            objects: objects.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn object_len(&self) -> usize {
        self.objects.len()
    }

    /// Appends `other` after this buffer's commands.
    pub fn append(&mut self, other: CommandBuffer) {
        self.bytes.extend_from_slice(&other.bytes);
        self.objects.extend(other.objects);
    }

    pub fn into_reader(self) -> CommandReader {
        CommandReader {
            bytes: self.bytes,
            position: 0,
            objects: self.objects,
        }
    }
}

/// Read-once cursor over a [`CommandBuffer`].
#[derive(Debug)]
pub struct CommandReader {
    bytes: Vec<u8>,
    position: usize,
    objects: VecDeque<StreamObject>,
}

macro_rules! read_le {
    ($name:ident, $ty:ty, $what:literal) => {
        pub fn $name(&mut self) -> Result<$ty, CanvasError> {
            const SIZE: usize = std::mem::size_of::<$ty>();
            let end = self.position + SIZE;
            let Some(slice) = self.bytes.get(self.position..end) else {
                return Err(CanvasError::Truncated {
                    offset: self.position,
                    expected: $what,
                });
            };
            let mut raw = [0u8; SIZE];
            raw.copy_from_slice(slice);
            self.position = end;
            Ok(<$ty>::from_le_bytes(raw))
        }
    };
}

impl CommandReader {
    pub fn is_empty(&self) -> bool {
        self.position >= self.bytes.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn get_u8(&mut self) -> Result<u8, CanvasError> {
        let byte = self.bytes.get(self.position).copied().ok_or(CanvasError::Truncated {
            offset: self.position,
            expected: "u8",
        })?;
        self.position += 1;
        Ok(byte)
    }

    read_le!(get_f32, f32, "f32");
    read_le!(get_f64, f64, "f64");
    read_le!(get_i32, i32, "i32");

    fn get_object(&mut self, expected: &'static str) -> Result<StreamObject, CanvasError> {
        self.objects
            .pop_front()
            .ok_or(CanvasError::MissingObject { expected })
    }

    fn mismatch(expected: &'static str, found: &StreamObject) -> CanvasError {
        CanvasError::ObjectMismatch {
            expected,
            found: found.kind(),
        }
    }

    pub fn get_path(&mut self) -> Result<Path, CanvasError> {
        match self.get_object("path")? {
            StreamObject::Path(path) => Ok(path),
            other => Err(Self::mismatch("path", &other)),
        }
    }

    pub fn get_image(&mut self) -> Result<Image, CanvasError> {
        match self.get_object("image")? {
            StreamObject::Image(image) => Ok(image),
            other => Err(Self::mismatch("image", &other)),
        }
    }

    pub fn get_bytes(&mut self) -> Result<Vec<u8>, CanvasError> {
        match self.get_object("byte buffer")? {
            StreamObject::Bytes(bytes) => Ok(bytes),
            other => Err(Self::mismatch("byte buffer", &other)),
        }
    }

    pub fn get_paint(&mut self) -> Result<Paint, CanvasError> {
        match self.get_object("paint")? {
            StreamObject::Paint(paint) => Ok(paint),
            other => Err(Self::mismatch("paint", &other)),
        }
    }

    pub fn get_font(&mut self) -> Result<Font, CanvasError> {
        match self.get_object("font")? {
            StreamObject::Font(font) => Ok(font),
            other => Err(Self::mismatch("font", &other)),
        }
    }

    pub fn get_text(&mut self) -> Result<String, CanvasError> {
        match self.get_object("string")? {
            StreamObject::Text(text) => Ok(text),
            other => Err(Self::mismatch("string", &other)),
        }
    }

    pub fn get_effect(&mut self) -> Result<Option<Effect>, CanvasError> {
        match self.get_object("effect")? {
            StreamObject::Effect(effect) => Ok(effect),
            other => Err(Self::mismatch("effect", &other)),
        }
    }

    pub fn get_blend(&mut self) -> Result<BlendMode, CanvasError> {
        match self.get_object("blend mode")? {
            StreamObject::Blend(mode) => Ok(mode),
            other => Err(Self::mismatch("blend mode", &other)),
        }
    }

    fn get_enum<T: Copy>(&mut self, kind: &'static str, table: &[T]) -> Result<T, CanvasError> {
        let value = self.get_u8()?;
        table
            .get(value as usize)
            .copied()
            .ok_or(CanvasError::InvalidEnum { kind, value })
    }

    /// Decodes the next command, or `None` at the end of the stream.
    pub fn next_command(&mut self) -> Result<Option<Command>, CanvasError> {
        if self.is_empty() {
            return Ok(None);
        }
        let offset = self.position;
        let byte = self.get_u8()?;
        let Some(token) = Token::from_byte(byte) else {
            return Err(CanvasError::UnknownToken {
                token: byte,
                offset,
            });
        };

        let command = match token {
            Token::PathStart => Command::PathStart,
            Token::MoveTo => Command::MoveTo(self.get_f32()?, self.get_f32()?),
            Token::LineTo => Command::LineTo(self.get_f32()?, self.get_f32()?),
            Token::QuadTo => Command::QuadTo([
                self.get_f32()?,
                self.get_f32()?,
                self.get_f32()?,
                self.get_f32()?,
            ]),
            Token::CubicTo => Command::CubicTo([
                self.get_f32()?,
                self.get_f32()?,
                self.get_f32()?,
                self.get_f32()?,
                self.get_f32()?,
                self.get_f32()?,
            ]),
            Token::ClosePath => Command::ClosePath,
            Token::PathEnd => Command::PathEnd,
            Token::PushClip => Command::PushClip(self.get_path()?),
            Token::PopClip => Command::PopClip,
            Token::ArcType => Command::SetArcType(self.get_enum(
                "arc type",
                &[ArcType::Open, ArcType::Chord, ArcType::Pie],
            )?),
            Token::Transform => Command::SetTransform([
                self.get_f64()?,
                self.get_f64()?,
                self.get_f64()?,
                self.get_f64()?,
                self.get_f64()?,
                self.get_f64()?,
            ]),
            Token::GlobalAlpha => Command::SetGlobalAlpha(self.get_f32()?),
            Token::FillRule => Command::SetFillRule(
                self.get_enum("fill rule", &[FillRule::NonZero, FillRule::EvenOdd])?,
            ),
            Token::CompMode => Command::SetBlendMode(self.get_blend()?),
            Token::FillPaint => Command::SetFillPaint(self.get_paint()?),
            Token::StrokePaint => Command::SetStrokePaint(self.get_paint()?),
            Token::LineWidth => Command::SetLineWidth(self.get_f32()?),
            Token::LineCap => Command::SetLineCap(self.get_enum(
                "line cap",
                &[LineCap::Butt, LineCap::Round, LineCap::Square],
            )?),
            Token::LineJoin => Command::SetLineJoin(self.get_enum(
                "line join",
                &[LineJoin::Miter, LineJoin::Round, LineJoin::Bevel],
            )?),
            Token::MiterLimit => Command::SetMiterLimit(self.get_f32()?),
            Token::Font => Command::SetFont(self.get_font()?),
            Token::TextAlign => Command::SetTextAlign(self.get_enum(
                "text align",
                &[TextAlign::Left, TextAlign::Center, TextAlign::Right],
            )?),
            Token::TextBaseline => Command::SetTextBaseline(self.get_enum(
                "text baseline",
                &[
                    TextBaseline::Top,
                    TextBaseline::Middle,
                    TextBaseline::Alphabetic,
                    TextBaseline::Bottom,
                ],
            )?),
            Token::Effect => Command::SetEffect(self.get_effect()?),
            Token::PutArgb => Command::PutArgb {
                x: self.get_i32()?,
                y: self.get_i32()?,
                argb: self.get_i32()? as u32,
            },
            Token::PutArgbPreBuf => {
                let x = self.get_i32()?;
                let y = self.get_i32()?;
                let width = self.get_i32()?;
                let height = self.get_i32()?;
                Command::PutArgbPreBuf {
                    x,
                    y,
                    width,
                    height,
                    bgra_pre: self.get_bytes()?,
                }
            }
            Token::FxApplyEffect => Command::ApplyEffect(self.get_effect()?),
            render => Command::Render(RenderOp::decode(render, self)?),
        };
        Ok(Some(command))
    }
}

/// One decoded stream command.
#[derive(Debug, Clone)]
pub enum Command {
    PathStart,
    MoveTo(f32, f32),
    LineTo(f32, f32),
    QuadTo([f32; 4]),
    CubicTo([f32; 6]),
    ClosePath,
    PathEnd,
    PushClip(Path),
    PopClip,
    SetArcType(ArcType),
    /// `(mxx, mxy, mxt, myx, myy, myt)`.
    SetTransform([f64; 6]),
    SetGlobalAlpha(f32),
    SetFillRule(FillRule),
    SetBlendMode(BlendMode),
    SetFillPaint(Paint),
    SetStrokePaint(Paint),
    SetLineWidth(f32),
    SetLineCap(LineCap),
    SetLineJoin(LineJoin),
    SetMiterLimit(f32),
    SetFont(Font),
    SetTextAlign(TextAlign),
    SetTextBaseline(TextBaseline),
    SetEffect(Option<Effect>),
    PutArgb {
        x: i32,
        y: i32,
        argb: u32,
    },
    PutArgbPreBuf {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        bgra_pre: Vec<u8>,
    },
    /// Filters the whole canvas; `None` is accepted and does nothing.
    ApplyEffect(Option<Effect>),
    Render(RenderOp),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::PathStart => "path_start",
            Command::MoveTo(..) => "move_to",
            Command::LineTo(..) => "line_to",
            Command::QuadTo(_) => "quad_to",
            Command::CubicTo(_) => "cubic_to",
            Command::ClosePath => "close_path",
            Command::PathEnd => "path_end",
            Command::PushClip(_) => "push_clip",
            Command::PopClip => "pop_clip",
            Command::SetArcType(_) => "arc_type",
            Command::SetTransform(_) => "transform",
            Command::SetGlobalAlpha(_) => "global_alpha",
            Command::SetFillRule(_) => "fill_rule",
            Command::SetBlendMode(_) => "blend_mode",
            Command::SetFillPaint(_) => "fill_paint",
            Command::SetStrokePaint(_) => "stroke_paint",
            Command::SetLineWidth(_) => "line_width",
            Command::SetLineCap(_) => "line_cap",
            Command::SetLineJoin(_) => "line_join",
            Command::SetMiterLimit(_) => "miter_limit",
            Command::SetFont(_) => "font",
            Command::SetTextAlign(_) => "text_align",
            Command::SetTextBaseline(_) => "text_baseline",
            Command::SetEffect(_) => "effect",
            Command::PutArgb { .. } => "put_argb",
            Command::PutArgbPreBuf { .. } => "put_argb_pre_buf",
            Command::ApplyEffect(_) => "apply_effect",
            Command::Render(op) => op.name(),
        }
    }
}
