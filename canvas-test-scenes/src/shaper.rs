use deferred_canvas::lyon::math::{point, Box2D};
use deferred_canvas::lyon::path::{Path, Winding};
use deferred_canvas::{Font, ShapedText, TextShaper};

/// Deterministic stand-in for a real text shaper: every character becomes
/// a solid block, so text placement can be checked pixel by pixel.
///
/// For a font of size `s`, each character advances `s / 2`, and its block
/// is `0.4 s` wide and `0.8 s` tall, sitting on the baseline. Spaces
/// advance without drawing.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockShaper;

impl TextShaper for BlockShaper {
    fn shape(&mut self, text: &str, font: &Font) -> ShapedText {
        let advance = font.size * 0.5;
        let ascent = font.size * 0.8;
        let width = font.size * 0.4;
        let mut builder = Path::builder();
        let mut pen = 0.0;
        for ch in text.chars() {
            if !ch.is_whitespace() {
                let block = Box2D::new(point(pen, -ascent), point(pen + width, 0.0));
                builder.add_rectangle(&block, Winding::Positive);
            }
            pen += advance;
        }
        ShapedText {
            outline: builder.build(),
            logical_width: pen,
            ascent,
            descent: font.size * 0.2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_advance_by_half_the_font_size() {
        let shaped = BlockShaper.shape("a b", &Font::new("Block", 20.0));
        assert_eq!(shaped.logical_width, 30.0);
        assert_eq!(shaped.ascent, 16.0);
        // Two drawn glyphs, four edges each.
        let lines = shaped
            .outline
            .iter()
            .filter(|event| matches!(event, deferred_canvas::lyon::path::Event::Line { .. }))
            .count();
        assert!(lines >= 6);
    }
}
