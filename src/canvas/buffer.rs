use super::*;

/// How a freshly validated buffer is initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InitPolicy {
    /// Cleared to transparent on every validation.
    Clear,
    /// Filled opaque white when allocated.
    FillWhite,
    /// Keeps the upper-left content across reallocation and device loss.
    Preserve,
}

/// CPU copy of a volatile target's pixels, taken after each frame.
#[derive(Debug, Default)]
pub(crate) struct PixelSnapshot {
    pixels: Vec<u32>,
    width: u32,
    height: u32,
    valid: bool,
}

impl PixelSnapshot {
    /// Reads `target` back if its storage is volatile. The pixel grid only
    /// ever grows.
    pub(crate) fn save<T: RenderTarget>(&mut self, target: &T) -> Result<(), CanvasError> {
        if !target.is_volatile() {
            return Ok(());
        }
        target.read_pixels(&mut self.pixels)?;
        self.width = target.content_width();
        self.height = target.content_height();
        self.valid = true;
        trace!(width = self.width, height = self.height, "saved pixel snapshot");
        Ok(())
    }

    /// Replaces the upper-left `max_width x max_height` region of `g`'s
    /// target with the saved pixels. Returns whether anything was restored.
    pub(crate) fn restore<B: Backend>(
        &mut self,
        backend: &mut B,
        g: &mut B::Graphics,
        max_width: u32,
        max_height: u32,
    ) -> Result<bool, CanvasError> {
        if !self.valid {
            return Ok(false);
        }
        let texture = backend.create_texture(self.width, self.height, &self.pixels)?;
        let w = self.width.min(max_width) as f32;
        let h = self.height.min(max_height) as f32;
        let area = Box2D::new(point(0.0, 0.0), point(w, h));
        g.set_transform(Transform::identity());
        g.set_extra_alpha(1.0);
        g.set_composite_mode(CompositeMode::Src);
        g.draw_texture(&texture, area, area);
        g.set_composite_mode(CompositeMode::SrcOver);
        self.valid = false;
        warn!(width = self.width, height = self.height, "restored lost canvas content from snapshot");
        Ok(true)
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.valid
    }
}

/// One lazily allocated render target and the drawing context bound to it.
///
/// The context is only held while the target is known to be usable; it is
/// released at the end of every frame and rebound by [`validate`].
///
/// [`validate`]: RenderBuffer::validate
pub(crate) struct RenderBuffer<B: Backend> {
    label: &'static str,
    policy: InitPolicy,
    target: Option<B::Target>,
    graphics: Option<B::Graphics>,
    input: Option<ImageData<B::Texture>>,
    snapshot: Option<PixelSnapshot>,
}

impl<B: Backend> RenderBuffer<B> {
    pub(crate) fn new(label: &'static str, policy: InitPolicy) -> Self {
        Self {
            label,
            policy,
            target: None,
            graphics: None,
            input: None,
            snapshot: (policy == InitPolicy::Preserve).then(PixelSnapshot::default),
        }
    }

    pub(crate) fn is_allocated(&self) -> bool {
        self.target.is_some()
    }

    pub(crate) fn target(&self) -> Option<&B::Target> {
        self.target.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> Option<&PixelSnapshot> {
        self.snapshot.as_ref()
    }

    /// Makes the buffer at least `width x height` with a bound context.
    ///
    /// Returns true when a new target was allocated, which invalidates
    /// anything derived from the old content. On error the buffer is left
    /// exactly as it was.
    pub(crate) fn validate(&mut self, backend: &mut B, width: u32, height: u32) -> Result<bool, CanvasError> {
        let existing = self
            .target
            .as_ref()
            .map(|target| (target.content_width(), target.content_height()));

        if decide_target_sizing(existing, (width, height)).should_reallocate {
            let (target, mut g) = Self::allocate(backend, width, height)?;
            match self.policy {
                InitPolicy::Preserve => {
                    if let Some(old) = self.target.as_ref() {
                        transfer_content(backend, old, self.snapshot.as_mut(), &mut g)?;
                    }
                }
                InitPolicy::FillWhite => fill_white(&mut g, width, height),
                InitPolicy::Clear => {}
            }
            debug!(
                buffer = self.label,
                width,
                height,
                previous = ?existing,
                "allocated render target"
            );
            self.install(target, g);
            return Ok(true);
        }

        if self.graphics.is_none() {
            let Some(target) = self.target.as_ref() else {
                return Err(CanvasError::ContextUnavailable { width, height });
            };
            match backend.create_graphics(target) {
                Some(g) => self.graphics = Some(g),
                None => {
                    warn!(buffer = self.label, width, height, "render target lost, reallocating");
                    let (target, mut g) = Self::allocate(backend, width, height)?;
                    match self.policy {
                        InitPolicy::Preserve => {
                            if let Some(snapshot) = self.snapshot.as_mut() {
                                snapshot.restore(backend, &mut g, width, height)?;
                            }
                        }
                        InitPolicy::FillWhite => fill_white(&mut g, width, height),
                        InitPolicy::Clear => {}
                    }
                    self.install(target, g);
                    return Ok(true);
                }
            }
        }

        if self.policy == InitPolicy::Clear {
            if let (Some(target), Some(g)) = (self.target.as_ref(), self.graphics.as_mut()) {
                g.clear(target.content_width(), target.content_height());
            }
        }
        Ok(false)
    }

    fn allocate(backend: &mut B, width: u32, height: u32) -> Result<(B::Target, B::Graphics), CanvasError> {
        let target = backend.create_render_target(width, height)?;
        let g = backend
            .create_graphics(&target)
            .ok_or(CanvasError::ContextUnavailable { width, height })?;
        Ok((target, g))
    }

    fn install(&mut self, target: B::Target, g: B::Graphics) {
        // The old target is dropped here, after its content was transferred.
        self.graphics = Some(g);
        self.target = Some(target);
        self.input = None;
    }

    /// The bound drawing context. Only valid after [`RenderBuffer::validate`].
    pub(crate) fn graphics(&mut self) -> Result<&mut B::Graphics, CanvasError> {
        self.graphics.as_mut().ok_or(CanvasError::ContextUnavailable {
            width: 0,
            height: 0,
        })
    }

    pub(crate) fn texture(&self) -> Result<B::Texture, CanvasError> {
        self.target
            .as_ref()
            .map(RenderTarget::texture)
            .ok_or(CanvasError::ContextUnavailable {
                width: 0,
                height: 0,
            })
    }

    /// The whole target as a filter input, cached until reallocation.
    pub(crate) fn image_data(&mut self) -> Result<ImageData<B::Texture>, CanvasError> {
        if let Some(input) = self.input.as_ref() {
            return Ok(input.clone());
        }
        let target = self.target.as_ref().ok_or(CanvasError::ContextUnavailable {
            width: 0,
            height: 0,
        })?;
        let input = ImageData::new(
            target.texture(),
            IRect::from_size(target.content_width(), target.content_height()),
        );
        self.input = Some(input.clone());
        Ok(input)
    }

    /// Snapshots volatile content for the next frame.
    pub(crate) fn save(&mut self, enabled: bool) -> Result<(), CanvasError> {
        if !enabled {
            return Ok(());
        }
        match (self.snapshot.as_mut(), self.target.as_ref()) {
            (Some(snapshot), Some(target)) => snapshot.save(target),
            _ => Ok(()),
        }
    }

    pub(crate) fn release_graphics(&mut self) {
        self.graphics = None;
    }

    pub(crate) fn dispose(&mut self) {
        if self.target.is_some() {
            debug!(buffer = self.label, "disposed render target");
        }
        self.graphics = None;
        self.target = None;
        self.input = None;
    }
}

/// Copies `old` into the upper-left corner of the target bound to `g`,
/// falling back to the snapshot when `old` can no longer be read.
fn transfer_content<B: Backend>(
    backend: &mut B,
    old: &B::Target,
    snapshot: Option<&mut PixelSnapshot>,
    g: &mut B::Graphics,
) -> Result<(), CanvasError> {
    let (cw, ch) = (old.content_width(), old.content_height());
    if backend.create_graphics(old).is_none() {
        if let Some(snapshot) = snapshot {
            snapshot.restore(backend, g, cw, ch)?;
        }
        return Ok(());
    }
    let area = Box2D::new(point(0.0, 0.0), point(cw as f32, ch as f32));
    g.set_composite_mode(CompositeMode::Src);
    g.draw_texture(&old.texture(), area, area);
    g.set_composite_mode(CompositeMode::SrcOver);
    Ok(())
}

fn fill_white<G: Graphics>(g: &mut G, width: u32, height: u32) {
    g.set_paint(&Color::WHITE.into());
    g.set_composite_mode(CompositeMode::Src);
    g.fill_rect(0.0, 0.0, width as f32, height as f32);
    g.set_composite_mode(CompositeMode::SrcOver);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::soft::SoftBackend;

    fn pixels(buffer: &RenderBuffer<SoftBackend>) -> Vec<u32> {
        let mut out = Vec::new();
        buffer.target().unwrap().read_pixels(&mut out).unwrap();
        out
    }

    #[test]
    fn validating_twice_allocates_once() {
        let mut backend = SoftBackend::new();
        let mut buffer = RenderBuffer::<SoftBackend>::new("test", InitPolicy::Clear);
        assert!(buffer.validate(&mut backend, 16, 16).unwrap());
        assert!(!buffer.validate(&mut backend, 16, 16).unwrap());
        assert!(!buffer.validate(&mut backend, 8, 8).unwrap());
        assert_eq!(backend.allocations(), 1);
    }

    #[test]
    fn clear_policy_clears_on_every_validation() {
        let mut backend = SoftBackend::new();
        let mut buffer = RenderBuffer::<SoftBackend>::new("test", InitPolicy::Clear);
        buffer.validate(&mut backend, 4, 4).unwrap();
        buffer.graphics().unwrap().fill_rect(0.0, 0.0, 4.0, 4.0);
        assert!(pixels(&buffer).iter().all(|&p| p == 0xFF00_0000));
        buffer.validate(&mut backend, 4, 4).unwrap();
        assert!(pixels(&buffer).iter().all(|&p| p == 0));
    }

    #[test]
    fn fill_white_policy_starts_opaque() {
        let mut backend = SoftBackend::new();
        let mut buffer = RenderBuffer::<SoftBackend>::new("mask", InitPolicy::FillWhite);
        buffer.validate(&mut backend, 3, 3).unwrap();
        assert!(pixels(&buffer).iter().all(|&p| p == 0xFFFF_FFFF));
    }

    #[test]
    fn growing_preserves_upper_left_content() {
        let mut backend = SoftBackend::new();
        let mut buffer = RenderBuffer::<SoftBackend>::new("canvas", InitPolicy::Preserve);
        buffer.validate(&mut backend, 4, 4).unwrap();
        {
            let g = buffer.graphics().unwrap();
            g.set_paint(&Color::rgba(255, 0, 0, 128).into());
            g.fill_rect(1.0, 1.0, 2.0, 2.0);
        }
        let before = pixels(&buffer);

        assert!(buffer.validate(&mut backend, 6, 5).unwrap());
        let after = pixels(&buffer);
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(after[y * 6 + x], before[y * 4 + x]);
            }
        }
        assert_eq!(after[4 * 6 + 5], 0);
        assert_eq!(backend.live_targets(), 1);
    }

    #[test]
    fn failed_allocation_leaves_buffer_untouched() {
        let mut backend = SoftBackend::new();
        let mut buffer = RenderBuffer::<SoftBackend>::new("canvas", InitPolicy::Preserve);
        buffer.validate(&mut backend, 4, 4).unwrap();
        assert!(buffer.validate(&mut backend, 0, 8).is_err());
        assert_eq!(buffer.target().unwrap().content_width(), 4);
        assert!(buffer.graphics().is_ok());
    }

    #[test]
    fn lost_volatile_target_is_restored_from_snapshot() {
        let mut backend = SoftBackend::new().with_volatile_targets(true);
        let mut buffer = RenderBuffer::<SoftBackend>::new("canvas", InitPolicy::Preserve);
        buffer.validate(&mut backend, 4, 4).unwrap();
        buffer.graphics().unwrap().fill_rect(0.0, 0.0, 2.0, 2.0);
        buffer.save(true).unwrap();
        assert!(buffer.snapshot().unwrap().is_valid());
        let saved = pixels(&buffer);

        buffer.release_graphics();
        backend.simulate_device_loss();
        assert!(buffer.validate(&mut backend, 4, 4).unwrap());
        assert_eq!(pixels(&buffer), saved);
        assert!(!buffer.snapshot().unwrap().is_valid());
    }

    #[test]
    fn stable_targets_are_never_snapshotted() {
        let mut backend = SoftBackend::new();
        let mut buffer = RenderBuffer::<SoftBackend>::new("canvas", InitPolicy::Preserve);
        buffer.validate(&mut backend, 2, 2).unwrap();
        buffer.save(true).unwrap();
        assert!(!buffer.snapshot().unwrap().is_valid());
    }

    #[test]
    fn restore_without_snapshot_is_a_no_op() {
        let mut backend = SoftBackend::new();
        let target = backend.create_render_target(2, 2).unwrap();
        let mut g = backend.create_graphics(&target).unwrap();
        let mut snapshot = PixelSnapshot::default();
        assert!(!snapshot.restore(&mut backend, &mut g, 2, 2).unwrap());
    }
}
