//! Blend modes, visual effects and the image data that flows between
//! effect filters.
//!
//! Filtering happens in device space. Every filter result is an
//! [`ImageData`]: a texture plus the device rectangle its pixels cover.
//! The canvas compositor chains these through the backend primitives
//! (`blend`, `gaussian_blur`, `shadow`) and finally draws the result into a
//! render buffer.

use crate::error::CanvasError;
use crate::geometry::IRect;
use crate::Color;

// ── Composite and blend modes ────────────────────────────────────────────────

/// How a drawing context writes its output over existing pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompositeMode {
    /// Zero the covered pixels.
    Clear,
    /// Replace covered pixels with the source.
    Src,
    /// Porter-Duff source-over.
    #[default]
    SrcOver,
}

/// Two-input blend applied between a top and a bottom image.
///
/// Porter-Duff modes combine coverage; the separable modes mix colors and
/// then composite source-over; `Red`, `Green` and `Blue` take that channel
/// from the top input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    #[default]
    SrcOver,
    SrcIn,
    SrcOut,
    SrcAtop,
    Add,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Red,
    Green,
    Blue,
}

impl BlendMode {
    pub const ALL: [BlendMode; 19] = [
        BlendMode::SrcOver,
        BlendMode::SrcIn,
        BlendMode::SrcOut,
        BlendMode::SrcAtop,
        BlendMode::Add,
        BlendMode::Multiply,
        BlendMode::Screen,
        BlendMode::Overlay,
        BlendMode::Darken,
        BlendMode::Lighten,
        BlendMode::ColorDodge,
        BlendMode::ColorBurn,
        BlendMode::HardLight,
        BlendMode::SoftLight,
        BlendMode::Difference,
        BlendMode::Exclusion,
        BlendMode::Red,
        BlendMode::Green,
        BlendMode::Blue,
    ];

    /// Numeric index shared by shaders and the blend table.
    pub fn index(self) -> u32 {
        Self::ALL
            .iter()
            .position(|mode| *mode == self)
            .unwrap_or(0) as u32
    }

    /// Per-pixel blend of premultiplied RGBA `top` over premultiplied
    /// `bottom`, with channels in `[0, 1]`.
    ///
    /// This is the reference formula every backend must reproduce.
    pub fn blend_premultiplied(self, top: [f32; 4], bottom: [f32; 4]) -> [f32; 4] {
        let (sa, da) = (top[3], bottom[3]);
        let porter_duff = |fs: f32, fd: f32| -> [f32; 4] {
            [
                top[0] * fs + bottom[0] * fd,
                top[1] * fs + bottom[1] * fd,
                top[2] * fs + bottom[2] * fd,
                sa * fs + da * fd,
            ]
        };
        match self {
            BlendMode::SrcOver => porter_duff(1.0, 1.0 - sa),
            BlendMode::SrcIn => porter_duff(da, 0.0),
            BlendMode::SrcOut => porter_duff(1.0 - da, 0.0),
            BlendMode::SrcAtop => porter_duff(da, 1.0 - sa),
            BlendMode::Add => [
                (top[0] + bottom[0]).min(1.0),
                (top[1] + bottom[1]).min(1.0),
                (top[2] + bottom[2]).min(1.0),
                (sa + da).min(1.0),
            ],
            BlendMode::Red | BlendMode::Green | BlendMode::Blue => {
                let channel = match self {
                    BlendMode::Red => 0,
                    BlendMode::Green => 1,
                    _ => 2,
                };
                let mut out = porter_duff(0.0, 1.0);
                // Replace one channel, scaled into the bottom's coverage.
                let top_straight = if sa > 0.0 { top[channel] / sa } else { 0.0 };
                out[channel] = top_straight * da;
                out
            }
            separable => {
                let mut out = [0.0; 4];
                for c in 0..3 {
                    let (s, d) = (top[c], bottom[c]);
                    let mixed = separable_channel(separable, s, d, sa, da);
                    out[c] = s * (1.0 - da) + d * (1.0 - sa) + mixed;
                }
                out[3] = sa + da - sa * da;
                out
            }
        }
    }
}

/// The `B(cs, cb)` term of a separable blend, premultiplied (returns
/// `sa * da * B(s/sa, d/da)`).
fn separable_channel(mode: BlendMode, s: f32, d: f32, sa: f32, da: f32) -> f32 {
    match mode {
        BlendMode::Multiply => s * d,
        BlendMode::Screen => s * da + d * sa - s * d,
        BlendMode::Darken => (s * da).min(d * sa),
        BlendMode::Lighten => (s * da).max(d * sa),
        BlendMode::Difference => (s * da - d * sa).abs(),
        BlendMode::Exclusion => s * da + d * sa - 2.0 * s * d,
        _ => {
            let cs = if sa > 0.0 { s / sa } else { 0.0 };
            let cb = if da > 0.0 { d / da } else { 0.0 };
            let b = match mode {
                BlendMode::Overlay => hard_light(cb, cs),
                BlendMode::HardLight => hard_light(cs, cb),
                BlendMode::ColorDodge => {
                    if cb <= 0.0 {
                        0.0
                    } else if cs >= 1.0 {
                        1.0
                    } else {
                        (cb / (1.0 - cs)).min(1.0)
                    }
                }
                BlendMode::ColorBurn => {
                    if cb >= 1.0 {
                        1.0
                    } else if cs <= 0.0 {
                        0.0
                    } else {
                        1.0 - ((1.0 - cb) / cs).min(1.0)
                    }
                }
                BlendMode::SoftLight => soft_light(cs, cb),
                _ => cs,
            };
            sa * da * b
        }
    }
}

fn hard_light(cs: f32, cb: f32) -> f32 {
    if cs <= 0.5 {
        cb * 2.0 * cs
    } else {
        let s = 2.0 * cs - 1.0;
        cb + s - cb * s
    }
}

fn soft_light(cs: f32, cb: f32) -> f32 {
    if cs <= 0.5 {
        cb - (1.0 - 2.0 * cs) * cb * (1.0 - cb)
    } else {
        let d = if cb <= 0.25 {
            ((16.0 * cb - 12.0) * cb + 4.0) * cb
        } else {
            cb.sqrt()
        };
        cb + (2.0 * cs - 1.0) * (d - cb)
    }
}

// ── Effects ──────────────────────────────────────────────────────────────────

/// Visual effects that can be set per draw (`EFFECT`) or applied to the
/// whole canvas (`FX_APPLY_EFFECT`).
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Gaussian blur with the given radius in pixels.
    GaussianBlur { radius: f32 },
    /// Blurred, tinted copy of the input's alpha drawn under the input.
    DropShadow {
        radius: f32,
        offset_x: f32,
        offset_y: f32,
        color: Color,
    },
}

/// Largest accepted blur radius in pixels.
pub const MAX_BLUR_RADIUS: f32 = 63.0;

impl Effect {
    pub fn validate(&self) -> Result<(), CanvasError> {
        let radius = match self {
            Effect::GaussianBlur { radius } => *radius,
            Effect::DropShadow {
                radius,
                offset_x,
                offset_y,
                ..
            } => {
                if !offset_x.is_finite() || !offset_y.is_finite() {
                    return Err(CanvasError::InvalidEffect(
                        "shadow offsets must be finite".into(),
                    ));
                }
                *radius
            }
        };
        if !radius.is_finite() || !(0.0..=MAX_BLUR_RADIUS).contains(&radius) {
            return Err(CanvasError::InvalidEffect(format!(
                "blur radius {radius} outside [0, {MAX_BLUR_RADIUS}]"
            )));
        }
        Ok(())
    }

    /// Pixels the effect may spread beyond its input on each side.
    pub fn padding(&self) -> i32 {
        match self {
            Effect::GaussianBlur { radius } => radius.ceil() as i32,
            Effect::DropShadow {
                radius,
                offset_x,
                offset_y,
                ..
            } => radius.ceil() as i32 + offset_x.abs().max(offset_y.abs()).ceil() as i32,
        }
    }
}

/// Standard deviation used for a blur of `radius` pixels.
pub fn blur_sigma(radius: f32) -> f32 {
    (radius / 3.0).max(0.1)
}

// ── Image data ───────────────────────────────────────────────────────────────

/// A filter result: a texture whose top-left pixel sits at `bounds.x,
/// bounds.y` in device space and whose size is `bounds`' size.
#[derive(Debug, Clone)]
pub struct ImageData<T> {
    pub texture: T,
    pub bounds: IRect,
}

impl<T> ImageData<T> {
    pub fn new(texture: T, bounds: IRect) -> Self {
        Self { texture, bounds }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: [f32; 4], b: [f32; 4]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-5)
    }

    #[test]
    fn src_in_keeps_top_inside_bottom_coverage() {
        let top = [1.0, 1.0, 1.0, 1.0];
        let half = [0.5, 0.5, 0.5, 0.5];
        assert!(approx(BlendMode::SrcIn.blend_premultiplied(top, half), half));
        assert!(approx(
            BlendMode::SrcIn.blend_premultiplied(top, [0.0; 4]),
            [0.0; 4]
        ));
    }

    #[test]
    fn darken_picks_smaller_channel_for_opaque_inputs() {
        let top = [0.2, 0.8, 0.5, 1.0];
        let bottom = [0.6, 0.4, 0.5, 1.0];
        assert!(approx(
            BlendMode::Darken.blend_premultiplied(top, bottom),
            [0.2, 0.4, 0.5, 1.0]
        ));
    }

    #[test]
    fn darken_with_translucent_top_matches_formula() {
        // Half-transparent black over opaque white.
        let top = [0.0, 0.0, 0.0, 0.5];
        let bottom = [1.0, 1.0, 1.0, 1.0];
        let out = BlendMode::Darken.blend_premultiplied(top, bottom);
        assert!(approx(out, [0.5, 0.5, 0.5, 1.0]));
    }

    #[test]
    fn src_over_with_transparent_top_is_identity() {
        let bottom = [0.3, 0.2, 0.1, 0.6];
        assert!(approx(
            BlendMode::SrcOver.blend_premultiplied([0.0; 4], bottom),
            bottom
        ));
    }

    #[test]
    fn red_mode_replaces_only_red_channel() {
        let top = [1.0, 0.0, 0.0, 1.0];
        let bottom = [0.0, 0.5, 0.5, 1.0];
        assert!(approx(
            BlendMode::Red.blend_premultiplied(top, bottom),
            [1.0, 0.5, 0.5, 1.0]
        ));
    }

    #[test]
    fn mode_indices_are_stable() {
        assert_eq!(BlendMode::SrcOver.index(), 0);
        assert_eq!(BlendMode::Blue.index(), 18);
    }

    #[test]
    fn effect_validation_rejects_negative_radius() {
        assert!(Effect::GaussianBlur { radius: -1.0 }.validate().is_err());
        assert!(Effect::GaussianBlur { radius: 4.0 }.validate().is_ok());
        let shadow = Effect::DropShadow {
            radius: 2.0,
            offset_x: 3.0,
            offset_y: -1.0,
            color: Color::BLACK,
        };
        assert_eq!(shadow.padding(), 5);
    }
}
