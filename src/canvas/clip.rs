use super::*;

/// The stacked clip paths and the mask holding their intersection.
pub(crate) struct ClipStack<B: Backend> {
    paths: Vec<Path>,
    mask: RenderBuffer<B>,
}

impl<B: Backend> ClipStack<B> {
    pub(crate) fn new() -> Self {
        Self {
            paths: Vec::new(),
            mask: RenderBuffer::new("clip", InitPolicy::FillWhite),
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.paths.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub(crate) fn mask_mut(&mut self) -> &mut RenderBuffer<B> {
        &mut self.mask
    }

    pub(crate) fn release_graphics(&mut self) {
        self.mask.release_graphics();
    }

    pub(crate) fn dispose_mask(&mut self) {
        self.mask.dispose();
    }
}

impl<B: Backend> Canvas<B> {
    /// Makes the clip mask valid, rebuilding it from every stacked path when
    /// it had to be (re)allocated.
    pub(super) fn init_clip(&mut self) -> Result<(), CanvasError> {
        let (width, height) = (self.width, self.height);
        let reallocated = self.clip.mask.validate(&mut self.backend, width, height)?;
        self.count_reallocation(reallocated);
        if reallocated {
            debug!(depth = self.clip.depth(), "rebuilding clip mask");
            for index in 0..self.clip.paths.len() {
                let path = self.clip.paths[index].clone();
                self.render_clip(&path)?;
            }
        }
        Ok(())
    }

    /// Intersects the mask with one device-space path.
    fn render_clip(&mut self, path: &Path) -> Result<(), CanvasError> {
        let (width, height) = (self.width, self.height);
        let reallocated = self.temp.validate(&mut self.backend, width, height)?;
        self.count_reallocation(reallocated);
        {
            let g = self.temp.graphics()?;
            g.set_transform(Transform::identity());
            g.set_extra_alpha(1.0);
            g.set_composite_mode(CompositeMode::SrcOver);
            g.set_paint(&Color::WHITE.into());
            g.fill_path(path, FillRule::NonZero);
        }
        self.composite(
            BufferId::Temp,
            BlendMode::SrcIn,
            BufferId::Clip,
            None,
            CompositeMode::Src,
            BufferId::Clip,
        )
    }

    pub(super) fn push_clip(&mut self, path: Path) -> Result<(), CanvasError> {
        self.init_clip()?;
        self.render_clip(&path)?;
        self.clip.paths.push(path);
        trace!(depth = self.clip.depth(), "pushed clip");
        Ok(())
    }

    pub(super) fn pop_clip(&mut self) {
        if self.clip.paths.pop().is_some() {
            self.clip.dispose_mask();
            trace!(depth = self.clip.depth(), "popped clip");
        } else {
            warn!("clip pop without a matching push");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::soft::SoftBackend;
    use crate::shape::rect_path;

    #[test]
    fn mask_is_the_intersection_of_pushed_paths() {
        let mut canvas = Canvas::new(SoftBackend::new());
        canvas.update_bounds(8.0, 8.0);
        canvas.cv.validate(&mut canvas.backend, 8, 8).unwrap();
        canvas.push_clip(rect_path(0.0, 0.0, 6.0, 6.0)).unwrap();
        canvas.push_clip(rect_path(3.0, 3.0, 5.0, 5.0)).unwrap();

        let mut mask = Vec::new();
        canvas.clip.mask.target().unwrap().read_pixels(&mut mask).unwrap();
        for y in 0..8 {
            for x in 0..8 {
                let inside = (3..6).contains(&x) && (3..6).contains(&y);
                let alpha = mask[y * 8 + x] >> 24;
                assert_eq!(alpha == 0xFF, inside, "pixel ({x}, {y})");
                if !inside {
                    assert_eq!(alpha, 0, "pixel ({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn pop_disposes_the_mask_for_lazy_rebuild() {
        let mut canvas = Canvas::new(SoftBackend::new());
        canvas.update_bounds(4.0, 4.0);
        canvas.push_clip(rect_path(0.0, 0.0, 2.0, 2.0)).unwrap();
        assert!(canvas.clip.mask.is_allocated());
        canvas.pop_clip();
        assert_eq!(canvas.clip_depth(), 0);
        assert!(!canvas.clip.mask.is_allocated());
        canvas.pop_clip();
        assert_eq!(canvas.clip_depth(), 0);
    }
}
