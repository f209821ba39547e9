/// Expected premultiplied color of one canvas pixel.
///
/// Colors are stored as the `0xAARRGGBB` word `Canvas::render_to_pixels`
/// returns, so a failed expectation prints directly comparable values.
#[derive(Debug, Clone, Copy)]
pub struct PixelExpectation {
    pub x: u32,
    pub y: u32,
    pub argb_pre: u32,
    /// Largest per-channel difference still accepted (default 3).
    pub tolerance: u8,
    pub label: &'static str,
}

impl PixelExpectation {
    /// Expects premultiplied channels `r, g, b, a`.
    pub fn new(x: u32, y: u32, r: u8, g: u8, b: u8, a: u8, label: &'static str) -> Self {
        Self {
            x,
            y,
            argb_pre: u32::from_be_bytes([a, r, g, b]),
            tolerance: 3,
            label,
        }
    }

    pub fn opaque(x: u32, y: u32, r: u8, g: u8, b: u8, label: &'static str) -> Self {
        Self::new(x, y, r, g, b, 255, label)
    }

    pub fn transparent(x: u32, y: u32, label: &'static str) -> Self {
        Self::new(x, y, 0, 0, 0, 0, label)
    }

    pub fn with_tolerance(self, tolerance: u8) -> Self {
        Self { tolerance, ..self }
    }

    fn accepts(&self, actual: u32) -> bool {
        self.argb_pre
            .to_be_bytes()
            .iter()
            .zip(actual.to_be_bytes())
            .all(|(&expected, actual)| expected.abs_diff(actual) <= self.tolerance)
    }
}

/// Checks `expectations` against a row-major canvas of `width x height`
/// premultiplied ARGB words. Returns a message per failure.
pub fn check_pixels(
    pixels: &[u32],
    width: u32,
    height: u32,
    expectations: &[PixelExpectation],
) -> Vec<String> {
    expectations
        .iter()
        .filter_map(|expectation| {
            let PixelExpectation { x, y, label, .. } = *expectation;
            if x >= width || y >= height {
                return Some(format!("[{label}] ({x},{y}) lies outside the {width}x{height} canvas"));
            }
            let Some(&actual) = pixels.get((y * width + x) as usize) else {
                return Some(format!(
                    "[{label}] ({x},{y}) missing from a buffer of {} pixels",
                    pixels.len()
                ));
            };
            (!expectation.accepts(actual)).then(|| {
                format!(
                    "[{label}] ({x},{y}) expected {:#010x} ±{} but got {actual:#010x}",
                    expectation.argb_pre, expectation.tolerance,
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_mismatches_and_out_of_range_pixels() {
        let pixels = [0xFF10_2030, 0];
        let expectations = [
            PixelExpectation::opaque(0, 0, 0x10, 0x20, 0x30, "match"),
            PixelExpectation::opaque(1, 0, 0x10, 0x20, 0x30, "mismatch"),
            PixelExpectation::transparent(5, 0, "outside"),
        ];
        let failures = check_pixels(&pixels, 2, 1, &expectations);
        assert_eq!(failures.len(), 2);
        assert!(failures[0].starts_with("[mismatch]"));
        assert!(failures[1].starts_with("[outside]"));
    }

    #[test]
    fn tolerance_applies_per_channel() {
        let expectation = PixelExpectation::new(0, 0, 100, 100, 100, 200, "near").with_tolerance(2);
        assert!(expectation.accepts(u32::from_be_bytes([202, 98, 100, 101])));
        assert!(!expectation.accepts(u32::from_be_bytes([200, 100, 103, 100])));
    }
}
