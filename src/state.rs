//! Interpreter render state.
//!
//! All fields persist across frames. Derived values (the inverse transform
//! and the compiled stroke) are cached against generation counters that the
//! setters bump.

use lyon::math::Transform;

use crate::effect::{BlendMode, Effect};
use crate::geometry::inverse_or_degenerate;
use crate::paint::Paint;
use crate::shape::{ArcType, FillRule, PathAccumulator, UserSpacePath};
use crate::stroke::{LineCap, LineJoin, Stroke};
use crate::text::{Font, TextAlign, TextBaseline};
use crate::util::Generational;

#[derive(Debug, Clone)]
pub struct RenderState {
    pub fill_paint: Paint,
    pub stroke_paint: Paint,
    pub global_alpha: f32,
    pub fill_rule: FillRule,
    pub blend_mode: BlendMode,
    pub font: Font,
    pub text_align: TextAlign,
    pub text_baseline: TextBaseline,
    pub arc_type: ArcType,
    pub effect: Option<Effect>,
    pub path: PathAccumulator,

    line_width: f32,
    line_cap: LineCap,
    line_join: LineJoin,
    miter_limit: f32,
    stroke_generation: u64,
    stroke: Generational<Stroke>,

    transform: Transform,
    transform_generation: u64,
    inverse: Generational<Transform>,
}

impl Default for RenderState {
    fn default() -> Self {
        let stroke = Stroke::default();
        Self {
            fill_paint: Paint::default(),
            stroke_paint: Paint::default(),
            global_alpha: 1.0,
            fill_rule: FillRule::NonZero,
            blend_mode: BlendMode::SrcOver,
            font: Font::default(),
            text_align: TextAlign::Left,
            text_baseline: TextBaseline::Alphabetic,
            arc_type: ArcType::Open,
            effect: None,
            path: PathAccumulator::default(),
            line_width: stroke.width,
            line_cap: stroke.cap,
            line_join: stroke.join,
            miter_limit: stroke.miter_limit,
            stroke_generation: 0,
            stroke: Generational::default(),
            transform: Transform::identity(),
            transform_generation: 0,
            inverse: Generational::default(),
        }
    }
}

impl RenderState {
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.transform_generation += 1;
    }

    /// The inverse of the current transform; zero-scale when singular.
    pub fn inverse_transform(&mut self) -> Transform {
        let transform = self.transform;
        *self
            .inverse
            .get_or_compute(self.transform_generation, || inverse_or_degenerate(&transform))
    }

    pub fn set_line_width(&mut self, width: f32) {
        self.line_width = width;
        self.stroke_generation += 1;
    }

    pub fn set_line_cap(&mut self, cap: LineCap) {
        self.line_cap = cap;
        self.stroke_generation += 1;
    }

    pub fn set_line_join(&mut self, join: LineJoin) {
        self.line_join = join;
        self.stroke_generation += 1;
    }

    pub fn set_miter_limit(&mut self, limit: f32) {
        self.miter_limit = limit;
        self.stroke_generation += 1;
    }

    /// The stroke compiled from the current line attributes.
    pub fn stroke(&mut self) -> Stroke {
        let (width, cap, join, miter) = (
            self.line_width,
            self.line_cap,
            self.line_join,
            self.miter_limit,
        );
        *self
            .stroke
            .get_or_compute(self.stroke_generation, || Stroke::new(width, cap, join, miter))
    }

    /// Snapshot of the current device-space path under the current transform.
    pub fn user_space_path(&mut self) -> UserSpacePath {
        let transform = self.transform;
        UserSpacePath::new(self.path.path().clone(), transform)
    }

    #[cfg(test)]
    pub(crate) fn inverse_is_cached(&self) -> bool {
        self.inverse.is_current(self.transform_generation)
    }
}
