use std::time::Duration;

/// Counters for a single rendered frame.
///
/// Available when the `render_metrics` feature is enabled, through
/// [`Canvas::last_frame_metrics`](super::Canvas::last_frame_metrics).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameMetrics {
    /// Drawing operations replayed.
    pub ops_executed: u32,
    /// Blend-filter composites (clip masking, blend modes, mask rebuilds).
    pub composites: u32,
    /// Per-draw and whole-canvas effects applied.
    pub effects_applied: u32,
    /// Render targets (re)allocated during the frame.
    pub reallocations: u32,
    /// Wall-clock time spent in the render call.
    pub elapsed: Duration,
}

impl FrameMetrics {
    /// Merge another frame's counts into this accumulator.
    pub fn accumulate(&mut self, other: &Self) {
        self.ops_executed += other.ops_executed;
        self.composites += other.composites;
        self.effects_applied += other.effects_applied;
        self.reallocations += other.reallocations;
        self.elapsed += other.elapsed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::soft::SoftBackend;
    use crate::stream::CommandWriter;
    use crate::{BlendMode, Canvas};

    #[test]
    fn counts_ops_and_composites() {
        let mut canvas = Canvas::new(SoftBackend::new());
        canvas.update_bounds(4.0, 4.0);
        let mut writer = CommandWriter::new();
        writer.fill_rect(0.0, 0.0, 2.0, 2.0);
        writer.set_blend_mode(BlendMode::Multiply);
        writer.fill_rect(1.0, 1.0, 2.0, 2.0);
        canvas.update_rendering(writer.finish());
        canvas.render_to_pixels().unwrap();

        let metrics = canvas.last_frame_metrics().unwrap();
        assert_eq!(metrics.ops_executed, 2);
        assert_eq!(metrics.composites, 1);
        assert_eq!(metrics.reallocations, 2);
    }

    #[test]
    fn accumulate_sums_counters() {
        let mut total = FrameMetrics::default();
        let frame = FrameMetrics {
            ops_executed: 3,
            composites: 1,
            effects_applied: 0,
            reallocations: 2,
            elapsed: Duration::from_millis(4),
        };
        total.accumulate(&frame);
        total.accumulate(&frame);
        assert_eq!(total.ops_executed, 6);
        assert_eq!(total.elapsed, Duration::from_millis(8));
    }
}
