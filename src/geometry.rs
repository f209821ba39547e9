//! Device-space rectangles and bounds transformation helpers.
//!
//! Float bounds use lyon's [`Box2D`]; whole-pixel regions used by the
//! compositor use [`IRect`].

use lyon::math::{point, Box2D, Transform};

/// Classification of an affine transform, used to pick the cheapest bounds
/// mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Identity,
    Translation,
    General,
}

pub fn classify(transform: &Transform) -> TransformKind {
    let linear_is_identity = transform.m11 == 1.0
        && transform.m12 == 0.0
        && transform.m21 == 0.0
        && transform.m22 == 1.0;
    if !linear_is_identity {
        TransformKind::General
    } else if transform.m31 == 0.0 && transform.m32 == 0.0 {
        TransformKind::Identity
    } else {
        TransformKind::Translation
    }
}

/// Builds a transform from the stream's row-major component order
/// `(mxx, mxy, mxt, myx, myy, myt)`.
pub fn transform_from_components(mxx: f64, mxy: f64, mxt: f64, myx: f64, myy: f64, myt: f64) -> Transform {
    Transform::new(
        mxx as f32, myx as f32, mxy as f32, myy as f32, mxt as f32, myt as f32,
    )
}

/// Inverse of `transform`, or a zero-scale transform when it is singular.
///
/// The degenerate inverse collapses every point to the origin so consumers
/// see an empty region instead of failing.
pub fn inverse_or_degenerate(transform: &Transform) -> Transform {
    transform
        .inverse()
        .unwrap_or_else(|| Transform::scale(0.0, 0.0))
}

/// Maps untransformed bounds to device space.
pub fn tx_bounds(bounds: Box2D, transform: &Transform) -> Box2D {
    match classify(transform) {
        TransformKind::Identity => bounds,
        TransformKind::Translation => bounds.translate(lyon::math::vector(transform.m31, transform.m32)),
        TransformKind::General => transform.outer_transformed_box(&bounds),
    }
}

/// Maps device bounds back to user space. Singular transforms yield an
/// empty box.
pub fn inverse_tx_bounds(bounds: Box2D, transform: &Transform) -> Box2D {
    match classify(transform) {
        TransformKind::Identity => bounds,
        TransformKind::Translation => {
            bounds.translate(lyon::math::vector(-transform.m31, -transform.m32))
        }
        TransformKind::General => match transform.inverse() {
            Some(inverse) => inverse.outer_transformed_box(&bounds),
            None => Box2D::zero(),
        },
    }
}

/// Bounds from two corner points in any order.
pub fn sorted_bounds(x1: f32, y1: f32, x2: f32, y2: f32) -> Box2D {
    Box2D::new(point(x1.min(x2), y1.min(y2)), point(x1.max(x2), y1.max(y2)))
}

/// Bounds of an `x, y, w, h` rectangle. Negative extents are normalized.
pub fn rect_bounds(x: f32, y: f32, w: f32, h: f32) -> Box2D {
    sorted_bounds(x, y, x + w, y + h)
}

/// Accumulates points into a bounding box, starting empty.
#[derive(Debug, Clone, Copy)]
pub struct BoundsAccumulator {
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
}

impl Default for BoundsAccumulator {
    fn default() -> Self {
        Self {
            min_x: f32::INFINITY,
            min_y: f32::INFINITY,
            max_x: f32::NEG_INFINITY,
            max_y: f32::NEG_INFINITY,
        }
    }
}

impl BoundsAccumulator {
    pub fn add(&mut self, p: lyon::math::Point) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    /// The accumulated box, or `None` when no point was added.
    pub fn finish(self) -> Option<Box2D> {
        if self.min_x > self.max_x || self.min_y > self.max_y {
            None
        } else {
            Some(Box2D::new(
                point(self.min_x, self.min_y),
                point(self.max_x, self.max_y),
            ))
        }
    }
}

/// Largest coordinate magnitude an [`IRect`] is built from, leaving room for
/// width arithmetic without overflowing `i32`.
pub const COORD_LIMIT: i32 = i32::MAX / 4;

/// A whole-pixel device-space rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl IRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    /// Smallest pixel rectangle containing `bounds` (floor the minimum,
    /// ceil the maximum). Coordinates are clamped to [`COORD_LIMIT`].
    pub fn round_out(bounds: &Box2D) -> Self {
        if !(bounds.min.x <= bounds.max.x && bounds.min.y <= bounds.max.y) {
            return Self::default();
        }
        let limit = COORD_LIMIT as f32;
        let clamp = |v: f32| v.clamp(-limit, limit) as i32;
        let x0 = clamp(bounds.min.x.floor());
        let y0 = clamp(bounds.min.y.floor());
        let x1 = clamp(bounds.max.x.ceil());
        let y1 = clamp(bounds.max.y.ceil());
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Intersection, empty (zero-sized at the origin of `self`) when disjoint.
    pub fn intersect(&self, other: &IRect) -> IRect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            IRect::new(x0, y0, 0, 0)
        } else {
            IRect::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
        }
    }

    pub fn union(&self, other: &IRect) -> IRect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        IRect::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }

    /// Grows every side by `amount` pixels.
    pub fn outset(&self, amount: i32) -> IRect {
        let grow = amount.saturating_mul(2);
        IRect::new(
            self.x.saturating_sub(amount),
            self.y.saturating_sub(amount),
            self.width.saturating_add(grow),
            self.height.saturating_add(grow),
        )
    }

    pub fn translate(&self, dx: i32, dy: i32) -> IRect {
        IRect::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.width,
            self.height,
        )
    }

    pub fn to_box(&self) -> Box2D {
        Box2D::new(
            point(self.x as f32, self.y as f32),
            point(self.right() as f32, self.bottom() as f32),
        )
    }
}
