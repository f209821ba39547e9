//! A retained-mode 2D canvas that replays recorded command streams.
//!
//! A producer records drawing commands with a [`CommandWriter`] and hands
//! the resulting [`CommandBuffer`] to a [`Canvas`]. On the next frame the
//! canvas replays the stream against a persistent render target, routing
//! clipped and blended draws through offscreen buffers, and blits the
//! result to the caller's frame.
//!
//! Rendering goes through a [`backend::Backend`]: [`SoftBackend`] is a
//! deterministic CPU device built on tiny-skia, [`GpuBackend`] runs on wgpu.
//!
//! ```
//! use deferred_canvas::{Canvas, Color, CommandWriter, SoftBackend};
//!
//! let mut canvas = Canvas::new(SoftBackend::new());
//! canvas.update_bounds(8.0, 8.0);
//!
//! let mut writer = CommandWriter::new();
//! writer.set_fill_paint(Color::rgb(255, 0, 0)).fill_rect(0.0, 0.0, 4.0, 4.0);
//! canvas.update_rendering(writer.finish());
//!
//! let pixels = canvas.render_to_pixels().unwrap();
//! assert_eq!(pixels[0], 0xFFFF_0000);
//! assert_eq!(pixels[7], 0);
//! ```

pub use lyon;
pub use wgpu;

pub mod backend;
mod cache;
mod canvas;
mod color;
mod effect;
mod error;
mod geometry;
mod id;
mod image;
mod ops;
mod paint;
mod shape;
mod state;
mod stream;
mod stroke;
mod text;
mod util;

pub use backend::gpu::{GpuBackend, GpuGraphics, GpuTarget, GpuTexture};
pub use backend::soft::{SoftBackend, SoftGraphics, SoftTarget, SoftTexture};
pub use cache::ImageCache;
#[cfg(feature = "render_metrics")]
pub use canvas::FrameMetrics;
pub use canvas::{Canvas, CanvasConfig};
pub use color::Color;
pub use effect::{blur_sigma, BlendMode, CompositeMode, Effect, ImageData, MAX_BLUR_RADIUS};
pub use error::CanvasError;
pub use geometry::IRect;
pub use id::ImageId;
pub use image::Image;
pub use ops::{execute_op, ExecMode, OpResources, RectArgs, RenderOp, TextSupport};
pub use paint::{CycleMethod, GradientStop, LinearGradient, Paint, RadialGradient};
pub use shape::{
    arc_path, line_path, oval_path, rect_path, round_rect_path, ArcType, FillRule, UserSpacePath,
};
pub use state::RenderState;
pub use stream::{Command, CommandBuffer, CommandReader, CommandWriter, StreamObject, Token};
pub use stroke::{LineCap, LineJoin, Stroke, StrokeType};
pub use text::{Font, ShapedText, TextAlign, TextBaseline, TextPlacement, TextShaper};
pub use util::argb_to_bgra_bytes;
