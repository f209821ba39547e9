use lyon::math::Point;
use smallvec::SmallVec;

use crate::Color;

/// How a gradient continues past its end stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleMethod {
    #[default]
    Pad,
    Reflect,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    /// Position along the gradient in `[0, 1]`.
    pub offset: f32,
    pub color: Color,
}

impl GradientStop {
    pub fn new(offset: f32, color: Color) -> Self {
        Self {
            offset: offset.clamp(0.0, 1.0),
            color,
        }
    }
}

pub type GradientStops = SmallVec<[GradientStop; 4]>;

/// A linear gradient between two user-space points.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearGradient {
    pub start: Point,
    pub end: Point,
    pub stops: GradientStops,
    pub cycle: CycleMethod,
}

/// A radial gradient around `center`, with an optional focus point.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialGradient {
    pub center: Point,
    pub focus: Point,
    pub radius: f32,
    pub stops: GradientStops,
    pub cycle: CycleMethod,
}

/// The source color of fills and strokes.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Color),
    Linear(LinearGradient),
    Radial(RadialGradient),
}

impl Default for Paint {
    fn default() -> Self {
        Paint::Solid(Color::BLACK)
    }
}

impl From<Color> for Paint {
    fn from(color: Color) -> Self {
        Paint::Solid(color)
    }
}

impl Paint {
    pub fn linear(start: Point, end: Point, stops: impl IntoIterator<Item = GradientStop>) -> Self {
        Paint::Linear(LinearGradient {
            start,
            end,
            stops: sorted_stops(stops),
            cycle: CycleMethod::Pad,
        })
    }

    pub fn radial(center: Point, radius: f32, stops: impl IntoIterator<Item = GradientStop>) -> Self {
        Paint::Radial(RadialGradient {
            center,
            focus: center,
            radius,
            stops: sorted_stops(stops),
            cycle: CycleMethod::Pad,
        })
    }

    /// Color at gradient position `t` (already cycled into `[0, 1]`).
    pub fn color_at(stops: &[GradientStop], t: f32) -> Color {
        let Some(first) = stops.first() else {
            return Color::TRANSPARENT;
        };
        if t <= first.offset {
            return first.color;
        }
        for pair in stops.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.offset {
                let span = (b.offset - a.offset).max(f32::EPSILON);
                let f = (t - a.offset) / span;
                let lerp = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * f).round() as u8;
                return Color([
                    lerp(a.color.0[0], b.color.0[0]),
                    lerp(a.color.0[1], b.color.0[1]),
                    lerp(a.color.0[2], b.color.0[2]),
                    lerp(a.color.0[3], b.color.0[3]),
                ]);
            }
        }
        stops.last().map(|s| s.color).unwrap_or(Color::TRANSPARENT)
    }
}

impl CycleMethod {
    /// Maps an unbounded gradient parameter into `[0, 1]`.
    pub fn apply(&self, t: f32) -> f32 {
        match self {
            CycleMethod::Pad => t.clamp(0.0, 1.0),
            CycleMethod::Repeat => t - t.floor(),
            CycleMethod::Reflect => {
                let m = t.rem_euclid(2.0);
                if m > 1.0 {
                    2.0 - m
                } else {
                    m
                }
            }
        }
    }
}

fn sorted_stops(stops: impl IntoIterator<Item = GradientStop>) -> GradientStops {
    let mut stops: GradientStops = stops.into_iter().collect();
    stops.sort_by(|a, b| a.offset.total_cmp(&b.offset));
    stops
}
