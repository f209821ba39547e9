use super::*;

/// A measured drawing op, rendered on demand into an offscreen input for an
/// effect filter.
pub(super) struct RenderInput<'a> {
    pub(super) op: &'a RenderOp,
    /// Device bounds measured with `transform`.
    pub(super) bounds: Box2D,
    pub(super) transform: Transform,
}

impl RenderInput<'_> {
    /// Renders the op into a target covering its bounds cut to `clip`
    /// (never smaller than one pixel).
    fn filter<B: Backend>(
        &self,
        state: &mut RenderState,
        res: &mut OpResources<'_, B>,
        clip: IRect,
    ) -> Result<ImageData<B::Texture>, CanvasError> {
        let mut area = IRect::round_out(&self.bounds).intersect(&clip);
        area.width = area.width.max(1);
        area.height = area.height.max(1);

        let (width, height) = (area.width as u32, area.height as u32);
        let target = res.backend.create_render_target(width, height)?;
        let mut g = res
            .backend
            .create_graphics(&target)
            .ok_or(CanvasError::ContextUnavailable { width, height })?;
        g.set_extra_alpha(state.global_alpha);
        g.set_transform(
            self.transform
                .then_translate(lyon::math::vector(-area.x as f32, -area.y as f32)),
        );

        let saved = *state.transform();
        if saved != self.transform {
            state.set_transform(self.transform);
        }
        let rendered = execute_op(self.op, state, res, ExecMode::Render(&mut g));
        if saved != self.transform {
            state.set_transform(saved);
        }
        rendered?;
        Ok(ImageData::new(target.texture(), area))
    }
}

/// Runs `effect` over `input`. Results keep device positions.
pub(super) fn apply_effect<B: Backend>(
    backend: &mut B,
    effect: &Effect,
    input: &ImageData<B::Texture>,
) -> Result<ImageData<B::Texture>, CanvasError> {
    match effect {
        Effect::GaussianBlur { radius } => backend.gaussian_blur(input, *radius),
        Effect::DropShadow {
            radius,
            offset_x,
            offset_y,
            color,
        } => {
            let mut shadow = backend.shadow(input, *radius, *color)?;
            shadow.bounds = shadow
                .bounds
                .translate(offset_x.round() as i32, offset_y.round() as i32);
            backend.blend(input, &shadow, BlendMode::SrcOver, None)
        }
    }
}

impl<B: Backend> Canvas<B> {
    /// Renders `op` through the current per-draw effect into `dest` with
    /// source-over. Returns the device area written.
    pub(super) fn render_with_effect(
        &mut self,
        effect: &Effect,
        op: &RenderOp,
        bounds: Box2D,
        dest: BufferId,
    ) -> Result<IRect, CanvasError> {
        let output_clip = self.device_clip();
        let input_clip = output_clip.outset(effect.padding());
        let input = RenderInput {
            op,
            bounds,
            transform: *self.state.transform(),
        };
        let image = {
            let mut res = OpResources {
                backend: &mut self.backend,
                images: &mut self.images,
                text: &mut self.text,
            };
            input.filter(&mut self.state, &mut res, input_clip)?
        };
        let result = apply_effect(&mut self.backend, effect, &image)?;
        let written = result.bounds.intersect(&output_clip);
        let g = self.buffer_mut(dest).graphics()?;
        composite::draw_image_data(g, &result, Some(output_clip), CompositeMode::SrcOver);
        #[cfg(feature = "render_metrics")]
        {
            self.frame_metrics.effects_applied += 1;
        }
        Ok(written)
    }

    /// Filters the current canvas content with `effect`. Under a clip the
    /// canvas is replaced by the filtered pixels masked to the clip.
    pub(super) fn apply_canvas_effect(&mut self, effect: &Effect) -> Result<(), CanvasError> {
        effect.validate()?;
        let output_clip = self.device_clip();
        let input = self.cv.image_data()?;
        let result = apply_effect(&mut self.backend, effect, &input)?;

        if self.clip.is_empty() {
            let g = self.cv.graphics()?;
            composite::draw_image_data(g, &result, Some(output_clip), CompositeMode::Src);
        } else {
            self.init_clip()?;
            let (width, height) = (self.width, self.height);
            let reallocated = self.temp.validate(&mut self.backend, width, height)?;
            self.count_reallocation(reallocated);
            let g = self.temp.graphics()?;
            composite::draw_image_data(g, &result, Some(output_clip), CompositeMode::Src);

            // Only the masked result survives; the canvas outside the clip
            // is cleared.
            let mask = self.clip.mask_mut().image_data()?;
            let filtered = self.temp.image_data()?;
            let masked = self
                .backend
                .blend(&filtered, &mask, BlendMode::SrcIn, Some(output_clip))?;
            let g = self.cv.graphics()?;
            composite::draw_image_data(g, &masked, Some(output_clip), CompositeMode::Src);
        }
        #[cfg(feature = "render_metrics")]
        {
            self.frame_metrics.effects_applied += 1;
        }
        Ok(())
    }
}
