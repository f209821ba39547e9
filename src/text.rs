//! Text collaborator interface and text placement rules.
//!
//! The canvas does not shape text itself. A [`TextShaper`] turns a string
//! into glyph outlines positioned on a baseline at the origin; the canvas
//! then applies alignment, baseline and max-width scaling.

use lyon::math::{vector, Box2D, Transform};
use lyon::path::Path;

/// A font request. Interpretation is up to the installed shaper.
#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub family: String,
    pub size: f32,
}

impl Font {
    pub fn new(family: impl Into<String>, size: f32) -> Self {
        Self {
            family: family.into(),
            size,
        }
    }
}

impl Default for Font {
    fn default() -> Self {
        Self::new("System", 12.0)
    }
}

/// Horizontal anchoring relative to the text origin. Stream encoding:
/// 0 = left, 1 = center, 2 = right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Vertical anchoring relative to the text origin. Stream encoding:
/// 0 = top, 1 = middle, 2 = alphabetic baseline, 3 = bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextBaseline {
    Top,
    Middle,
    #[default]
    Alphabetic,
    Bottom,
}

/// Shaped text: glyph outlines with the pen starting at `(0, 0)` on the
/// alphabetic baseline.
#[derive(Debug, Clone)]
pub struct ShapedText {
    pub outline: Path,
    pub logical_width: f32,
    /// Distance from the baseline up to the top of the line box.
    pub ascent: f32,
    /// Distance from the baseline down to the bottom of the line box.
    pub descent: f32,
}

/// Turns strings into glyph outlines.
pub trait TextShaper {
    fn shape(&mut self, text: &str, font: &Font) -> ShapedText;
}

/// Where a shaped run lands in user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextPlacement {
    /// Maps the shaped outline (pen at origin) into user space.
    pub local: Transform,
}

impl TextPlacement {
    /// Computes the placement of `shaped` anchored at `(x, y)`.
    ///
    /// When `max_width` is positive and narrower than the logical width the
    /// run is compressed horizontally around the anchor.
    pub fn compute(
        shaped: &ShapedText,
        x: f32,
        y: f32,
        max_width: f32,
        align: TextAlign,
        baseline: TextBaseline,
    ) -> Self {
        let width = shaped.logical_width;
        let x_offset = match align {
            TextAlign::Left => 0.0,
            TextAlign::Center => -width * 0.5,
            TextAlign::Right => -width,
        };
        let y_offset = match baseline {
            TextBaseline::Top => shaped.ascent,
            TextBaseline::Middle => (shaped.ascent - shaped.descent) * 0.5,
            TextBaseline::Alphabetic => 0.0,
            TextBaseline::Bottom => -shaped.descent,
        };

        let local = if max_width > 0.0 && width > max_width {
            let sx = max_width / width;
            Transform::translation(x_offset, y_offset)
                .then_scale(sx, 1.0)
                .then_translate(vector(x, y))
        } else {
            Transform::translation(x + x_offset, y + y_offset)
        };
        Self { local }
    }

    pub fn outline_bounds(&self, shaped: &ShapedText) -> Option<Box2D> {
        crate::shape::path_bounds(&shaped.outline).map(|b| self.local.outer_transformed_box(&b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyon::math::point;

    fn run(width: f32) -> ShapedText {
        ShapedText {
            outline: crate::shape::rect_path(0.0, -8.0, width, 10.0),
            logical_width: width,
            ascent: 8.0,
            descent: 2.0,
        }
    }

    #[test]
    fn alignment_offsets_by_logical_width() {
        let shaped = run(40.0);
        let right = TextPlacement::compute(&shaped, 100.0, 50.0, 0.0, TextAlign::Right, TextBaseline::Alphabetic);
        assert_eq!(right.local.transform_point(point(0.0, 0.0)), point(60.0, 50.0));
        let center = TextPlacement::compute(&shaped, 100.0, 50.0, 0.0, TextAlign::Center, TextBaseline::Alphabetic);
        assert_eq!(center.local.transform_point(point(0.0, 0.0)), point(80.0, 50.0));
    }

    #[test]
    fn top_baseline_moves_text_below_anchor() {
        let shaped = run(10.0);
        let placement = TextPlacement::compute(&shaped, 0.0, 0.0, 0.0, TextAlign::Left, TextBaseline::Top);
        let bounds = placement.outline_bounds(&shaped).unwrap();
        assert_eq!(bounds.min.y, 0.0);
    }

    #[test]
    fn max_width_compresses_around_anchor() {
        let shaped = run(40.0);
        let placement = TextPlacement::compute(&shaped, 10.0, 0.0, 20.0, TextAlign::Right, TextBaseline::Alphabetic);
        let bounds = placement.outline_bounds(&shaped).unwrap();
        assert!((bounds.min.x - -10.0).abs() < 1e-4);
        assert!((bounds.max.x - 10.0).abs() < 1e-4);
    }
}
