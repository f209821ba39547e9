use lyon::math::{Box2D, Transform};
use lyon::path::Path;
use lyon::tessellation::{
    BuffersBuilder, StrokeOptions, StrokeTessellator, StrokeVertex, VertexBuffers,
};
use tracing::warn;

use crate::geometry::BoundsAccumulator;

/// Flattening tolerance used when measuring stroke outlines.
const MEASURE_TOLERANCE: f32 = 0.01;

/// End decoration of open stroked segments. Stream encoding: 0, 1, 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    Butt,
    Round,
    #[default]
    Square,
}

/// Corner decoration between stroked segments. Stream encoding: 0, 1, 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

/// Where the stroke sits relative to the geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrokeType {
    #[default]
    Centered,
    Inner,
    Outer,
}

/// A compiled stroke descriptor.
#[derive(Clone, Debug, Copy, PartialEq)]
pub struct Stroke {
    pub width: f32,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: f32,
    pub stroke_type: StrokeType,
}

impl Default for Stroke {
    fn default() -> Self {
        Self {
            width: 1.0,
            cap: LineCap::Square,
            join: LineJoin::Miter,
            miter_limit: 10.0,
            stroke_type: StrokeType::Centered,
        }
    }
}

impl Stroke {
    #[inline]
    pub fn new(width: f32, cap: LineCap, join: LineJoin, miter_limit: f32) -> Self {
        Self {
            width,
            cap,
            join,
            miter_limit,
            stroke_type: StrokeType::Centered,
        }
    }

    /// True if the stroke paints nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0
    }

    /// How far simple geometric bounds must grow to cover this stroke.
    pub fn bounds_growth(&self) -> f32 {
        match self.stroke_type {
            StrokeType::Inner => 0.0,
            StrokeType::Centered => self.width / 2.0,
            StrokeType::Outer => self.width,
        }
    }

    /// Width of the centered outline that covers this stroke's extent.
    fn outline_width(&self) -> f32 {
        match self.stroke_type {
            StrokeType::Inner => 0.0,
            StrokeType::Centered => self.width,
            StrokeType::Outer => self.width * 2.0,
        }
    }

    pub fn to_stroke_options(&self) -> StrokeOptions {
        StrokeOptions::default()
            .with_line_width(self.width.max(0.0))
            .with_line_cap(match self.cap {
                LineCap::Butt => lyon::tessellation::LineCap::Butt,
                LineCap::Round => lyon::tessellation::LineCap::Round,
                LineCap::Square => lyon::tessellation::LineCap::Square,
            })
            .with_line_join(match self.join {
                LineJoin::Miter => lyon::tessellation::LineJoin::Miter,
                LineJoin::Round => lyon::tessellation::LineJoin::Round,
                LineJoin::Bevel => lyon::tessellation::LineJoin::Bevel,
            })
            .with_miter_limit(self.miter_limit.max(StrokeOptions::MINIMUM_MITER_LIMIT))
    }

    /// Device-space bounds of `path` stroked in user space and mapped
    /// through `transform`, including caps and joins.
    pub fn accumulate_shape_bounds(&self, path: &Path, transform: &Transform) -> Option<Box2D> {
        // Flattening error would let curved outlines escape the bounds.
        let options = self
            .to_stroke_options()
            .with_line_width(self.outline_width())
            .with_tolerance(MEASURE_TOLERANCE);
        let mut geometry: VertexBuffers<lyon::math::Point, u32> = VertexBuffers::new();
        let mut tessellator = StrokeTessellator::new();
        let result = tessellator.tessellate_path(
            path,
            &options,
            &mut BuffersBuilder::new(&mut geometry, |vertex: StrokeVertex| vertex.position()),
        );
        if let Err(error) = result {
            warn!(?error, "stroke tessellation failed while measuring bounds");
        }

        let mut accumulator = BoundsAccumulator::default();
        if geometry.vertices.is_empty() {
            // Degenerate outline: fall back to the path's own points.
            for p in path.iter().flat_map(|event| [event.from(), event.to()]) {
                accumulator.add(transform.transform_point(p));
            }
        } else {
            for p in &geometry.vertices {
                accumulator.add(transform.transform_point(*p));
            }
        }
        accumulator.finish()
    }
}
