//! Shape-to-path construction and the user-space view of the current path.

use lyon::algorithms::aabb::bounding_box;
use lyon::algorithms::hit_test::hit_test_path;
use lyon::geom::Arc;
use lyon::math::{point, vector, Angle, Box2D, Point, Transform};
use lyon::path::builder::SvgPathBuilder;
use lyon::path::{Path, Winding};

use crate::geometry::{classify, inverse_or_degenerate, tx_bounds, TransformKind};
use crate::util::Generational;

/// Tolerance used for hit-testing and curve flattening.
pub(crate) const PATH_TOLERANCE: f32 = 0.05;

/// Rule deciding which regions of a self-intersecting path are inside.
/// Stream encoding: 0 = non-zero, 1 = even-odd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

impl From<FillRule> for lyon::path::FillRule {
    fn from(rule: FillRule) -> Self {
        match rule {
            FillRule::NonZero => lyon::path::FillRule::NonZero,
            FillRule::EvenOdd => lyon::path::FillRule::EvenOdd,
        }
    }
}

/// How an arc is closed. Stream encoding: 0 = open, 1 = chord, 2 = pie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArcType {
    #[default]
    Open,
    Chord,
    Pie,
}

pub fn rect_path(x: f32, y: f32, w: f32, h: f32) -> Path {
    let mut builder = Path::builder();
    builder.add_rectangle(
        &crate::geometry::rect_bounds(x, y, w, h),
        Winding::Positive,
    );
    builder.build()
}

pub fn oval_path(x: f32, y: f32, w: f32, h: f32) -> Path {
    let mut builder = Path::builder();
    builder.add_ellipse(
        point(x + w / 2.0, y + h / 2.0),
        vector(w.abs() / 2.0, h.abs() / 2.0),
        Angle::zero(),
        Winding::Positive,
    );
    builder.build()
}

/// A rounded rectangle whose corners are elliptical arcs of diameter
/// `arc_w` by `arc_h`, clamped to the rectangle.
pub fn round_rect_path(x: f32, y: f32, w: f32, h: f32, arc_w: f32, arc_h: f32) -> Path {
    let bounds = crate::geometry::rect_bounds(x, y, w, h);
    let rx = (arc_w.abs() / 2.0).min(bounds.width() / 2.0);
    let ry = (arc_h.abs() / 2.0).min(bounds.height() / 2.0);
    if rx <= 0.0 || ry <= 0.0 {
        return rect_path(x, y, w, h);
    }
    let (x0, y0, x1, y1) = (bounds.min.x, bounds.min.y, bounds.max.x, bounds.max.y);
    // Cubic approximation constant for a quarter ellipse.
    let k = 0.552_284_8;
    let (kx, ky) = (rx * k, ry * k);

    let mut builder = Path::builder();
    builder.begin(point(x0 + rx, y0));
    builder.line_to(point(x1 - rx, y0));
    builder.cubic_bezier_to(point(x1 - rx + kx, y0), point(x1, y0 + ry - ky), point(x1, y0 + ry));
    builder.line_to(point(x1, y1 - ry));
    builder.cubic_bezier_to(point(x1, y1 - ry + ky), point(x1 - rx + kx, y1), point(x1 - rx, y1));
    builder.line_to(point(x0 + rx, y1));
    builder.cubic_bezier_to(point(x0 + rx - kx, y1), point(x0, y1 - ry + ky), point(x0, y1 - ry));
    builder.line_to(point(x0, y0 + ry));
    builder.cubic_bezier_to(point(x0, y0 + ry - ky), point(x0 + rx - kx, y0), point(x0 + rx, y0));
    builder.end(true);
    builder.build()
}

/// An elliptical arc inscribed in `x, y, w, h`.
///
/// Angles are in degrees, zero at three o'clock, positive extents running
/// counter-clockwise on screen.
pub fn arc_path(x: f32, y: f32, w: f32, h: f32, start: f32, extent: f32, arc_type: ArcType) -> Path {
    let center = point(x + w / 2.0, y + h / 2.0);
    let arc = Arc {
        center,
        radii: vector(w.abs() / 2.0, h.abs() / 2.0),
        start_angle: Angle::degrees(-start),
        sweep_angle: Angle::degrees(-extent),
        x_rotation: Angle::zero(),
    };

    let mut builder = Path::builder();
    match arc_type {
        ArcType::Pie => {
            builder.begin(center);
            builder.line_to(arc.from());
        }
        ArcType::Open | ArcType::Chord => {
            builder.begin(arc.from());
        }
    }
    arc.for_each_cubic_bezier(&mut |segment| {
        builder.cubic_bezier_to(segment.ctrl1, segment.ctrl2, segment.to);
    });
    builder.end(arc_type != ArcType::Open);
    builder.build()
}

pub fn line_path(x1: f32, y1: f32, x2: f32, y2: f32) -> Path {
    let mut builder = Path::builder();
    builder.begin(point(x1, y1));
    builder.line_to(point(x2, y2));
    builder.end(false);
    builder.build()
}

/// Tight bounds of a path, `None` when it has no segments.
pub fn path_bounds(path: &Path) -> Option<Box2D> {
    path.iter().next()?;
    Some(bounding_box(path.iter()))
}

// ── Path accumulator ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum PathSegment {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CubicTo(Point, Point, Point),
    Close,
}

/// The path under construction by the stream's path sub-grammar.
///
/// Segments accumulate until the next `PATHSTART`; the lyon path is built
/// lazily and cached per generation.
#[derive(Debug, Clone, Default)]
pub struct PathAccumulator {
    segments: Vec<PathSegment>,
    generation: u64,
    built: Generational<Path>,
}

impl PathAccumulator {
    pub fn reset(&mut self) {
        self.segments.clear();
        self.generation += 1;
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.push(PathSegment::MoveTo(point(x, y)));
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        self.push(PathSegment::LineTo(point(x, y)));
    }

    pub fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        self.push(PathSegment::QuadTo(point(cx, cy), point(x, y)));
    }

    pub fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) {
        self.push(PathSegment::CubicTo(
            point(c1x, c1y),
            point(c2x, c2y),
            point(x, y),
        ));
    }

    pub fn close(&mut self) {
        self.push(PathSegment::Close);
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn push(&mut self, segment: PathSegment) {
        self.segments.push(segment);
        self.generation += 1;
    }

    /// The accumulated path in device space.
    pub fn path(&mut self) -> &Path {
        let segments = &self.segments;
        self.built.get_or_compute(self.generation, || {
            let mut builder = Path::svg_builder();
            for segment in segments {
                match *segment {
                    PathSegment::MoveTo(to) => {
                        builder.move_to(to);
                    }
                    PathSegment::LineTo(to) => {
                        builder.line_to(to);
                    }
                    PathSegment::QuadTo(ctrl, to) => {
                        builder.quadratic_bezier_to(ctrl, to);
                    }
                    PathSegment::CubicTo(ctrl1, ctrl2, to) => {
                        builder.cubic_bezier_to(ctrl1, ctrl2, to);
                    }
                    PathSegment::Close => builder.close(),
                }
            }
            builder.build()
        })
    }
}

// ── User-space path view ─────────────────────────────────────────────────────

/// A device-space path seen through the inverse of the transform that was
/// current when it was captured.
///
/// Filling the user-space path under `transform` reproduces the device path,
/// so path ops can share the transform handling of every other shape.
#[derive(Debug, Clone)]
pub struct UserSpacePath {
    device: Path,
    transform: Transform,
    inverse: Transform,
}

impl UserSpacePath {
    pub fn new(device: Path, transform: Transform) -> Self {
        Self {
            inverse: inverse_or_degenerate(&transform),
            device,
            transform,
        }
    }

    pub fn device_path(&self) -> &Path {
        &self.device
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// The path in user space.
    pub fn user_path(&self) -> Path {
        match classify(&self.transform) {
            TransformKind::Identity => self.device.clone(),
            _ => self.device.clone().transformed(&self.inverse),
        }
    }

    /// User-space bounds. Translations are handled exactly; anything else
    /// maps the device path through the inverse.
    pub fn bounds(&self) -> Option<Box2D> {
        match classify(&self.transform) {
            TransformKind::Identity => path_bounds(&self.device),
            TransformKind::Translation => path_bounds(&self.device)
                .map(|b| b.translate(vector(-self.transform.m31, -self.transform.m32))),
            TransformKind::General => path_bounds(&self.user_path()),
        }
    }

    /// Whether the user-space point lies inside the path.
    pub fn contains(&self, x: f32, y: f32, rule: FillRule) -> bool {
        let device_point = self.transform.transform_point(point(x, y));
        hit_test_path(&device_point, self.device.iter(), rule.into(), PATH_TOLERANCE)
    }

    /// Conservative overlap test between the path and a user-space rectangle.
    ///
    /// Reports overlap when a rectangle corner or center is inside the path,
    /// or a path vertex falls inside the rectangle.
    pub fn intersects(&self, x: f32, y: f32, w: f32, h: f32, rule: FillRule) -> bool {
        let rect = crate::geometry::rect_bounds(x, y, w, h);
        let Some(device_bounds) = path_bounds(&self.device) else {
            return false;
        };
        if !tx_bounds(rect, &self.transform).intersects(&device_bounds) {
            return false;
        }
        let probes = [
            rect.min,
            point(rect.max.x, rect.min.y),
            rect.max,
            point(rect.min.x, rect.max.y),
            rect.center(),
        ];
        if probes.iter().any(|p| self.contains(p.x, p.y, rule)) {
            return true;
        }
        self.device.iter().any(|event| {
            let p = self.inverse.transform_point(event.to());
            rect.min.x <= p.x && p.x <= rect.max.x && rect.min.y <= p.y && p.y <= rect.max.y
        })
    }
}
