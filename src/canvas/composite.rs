use super::*;

impl<B: Backend> Canvas<B> {
    /// Blends `top` against `bottom` with `mode` and writes the result into
    /// `dest` with `comp`.
    ///
    /// The filter result is always re-intersected with `clip`, whatever the
    /// backend reports. `dest`'s context is left at the identity transform
    /// and source-over.
    pub(super) fn composite(
        &mut self,
        top: BufferId,
        mode: BlendMode,
        bottom: BufferId,
        clip: Option<IRect>,
        comp: CompositeMode,
        dest: BufferId,
    ) -> Result<(), CanvasError> {
        let top = self.buffer_mut(top).image_data()?;
        let bottom = self.buffer_mut(bottom).image_data()?;
        let result = self.backend.blend(&top, &bottom, mode, clip)?;
        let g = self.buffer_mut(dest).graphics()?;
        draw_image_data(g, &result, clip, comp);
        #[cfg(feature = "render_metrics")]
        {
            self.frame_metrics.composites += 1;
        }
        Ok(())
    }
}

/// Draws a filter result at its device position. Only the part inside
/// `clip` is written.
pub(super) fn draw_image_data<G: Graphics>(
    g: &mut G,
    image: &ImageData<G::Texture>,
    clip: Option<IRect>,
    comp: CompositeMode,
) {
    let bounds = match clip {
        Some(clip) => image.bounds.intersect(&clip),
        None => image.bounds,
    };
    if bounds.is_empty() {
        return;
    }
    let src = bounds.translate(-image.bounds.x, -image.bounds.y);
    g.set_transform(Transform::identity());
    g.set_extra_alpha(1.0);
    g.set_composite_mode(comp);
    g.draw_texture(&image.texture, bounds.to_box(), src.to_box());
    g.set_composite_mode(CompositeMode::SrcOver);
}
