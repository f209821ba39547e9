pub fn normalize_rgba_color(color: &[u8; 4]) -> [f32; 4] {
    [
        color[0] as f32 / 255.0,
        color[1] as f32 / 255.0,
        color[2] as f32 / 255.0,
        color[3] as f32 / 255.0,
    ]
}

/// A lazily computed value tied to the generation of the state it derives from.
///
/// The owner bumps its generation counter on every mutation of the source
/// state; `get_or_compute` recomputes only when the stored generation differs.
#[derive(Debug, Clone)]
pub(crate) struct Generational<T> {
    slot: Option<(u64, T)>,
}

impl<T> Default for Generational<T> {
    fn default() -> Self {
        Self { slot: None }
    }
}

impl<T> Generational<T> {
    pub(crate) fn get_or_compute(&mut self, generation: u64, compute: impl FnOnce() -> T) -> &T {
        let stale = !matches!(&self.slot, Some((cached, _)) if *cached == generation);
        if stale {
            self.slot = None;
        }
        let (_, value) = self.slot.get_or_insert_with(|| (generation, compute()));
        value
    }

    #[cfg(test)]
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        matches!(&self.slot, Some((cached, _)) if *cached == generation)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TargetSizingDecision {
    pub(crate) should_reallocate: bool,
}

/// Decides whether a render target of `existing` content size can hold a
/// `required` area. Targets only grow; a smaller request reuses the target.
pub(crate) fn decide_target_sizing(
    existing: Option<(u32, u32)>,
    required: (u32, u32),
) -> TargetSizingDecision {
    let should_reallocate = existing
        .map(|(width, height)| width < required.0 || height < required.1)
        .unwrap_or(true);

    TargetSizingDecision { should_reallocate }
}

/// Converts premultiplied ARGB words to BGRA bytes (the little-endian layout
/// of the same words).
pub fn argb_to_bgra_bytes(pixels: &[u32]) -> Vec<u8> {
    pixels.iter().flat_map(|p| p.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decide_target_sizing_reallocates_when_missing() {
        assert!(decide_target_sizing(None, (16, 16)).should_reallocate);
    }

    #[test]
    fn decide_target_sizing_reallocates_when_either_side_too_small() {
        assert!(decide_target_sizing(Some((32, 8)), (16, 16)).should_reallocate);
        assert!(decide_target_sizing(Some((8, 32)), (16, 16)).should_reallocate);
    }

    #[test]
    fn decide_target_sizing_keeps_target_when_large_enough() {
        assert!(!decide_target_sizing(Some((64, 64)), (16, 16)).should_reallocate);
        assert!(!decide_target_sizing(Some((16, 16)), (16, 16)).should_reallocate);
    }

    #[test]
    fn generational_recomputes_only_on_new_generation() {
        let mut cached = Generational::default();
        let mut calls = 0;
        assert_eq!(*cached.get_or_compute(1, || {
            calls += 1;
            10
        }), 10);
        assert_eq!(*cached.get_or_compute(1, || {
            calls += 1;
            20
        }), 10);
        assert!(cached.is_current(1));
        assert_eq!(*cached.get_or_compute(2, || {
            calls += 1;
            30
        }), 30);
        assert_eq!(calls, 2);
    }

    #[test]
    fn argb_words_map_to_bgra_bytes() {
        assert_eq!(argb_to_bgra_bytes(&[0xFF11_2233]), vec![0x33, 0x22, 0x11, 0xFF]);
    }
}
