use crate::util::normalize_rgba_color;

/// A straight-alpha RGBA color.
///
/// Paints in the command stream are expressed with this type. Render targets
/// and pixel snapshots store premultiplied ARGB words instead, see
/// [`Color::to_argb_pre`] and [`Color::from_argb_pre`].
///
/// # Examples
///
/// ```
/// use deferred_canvas::Color;
///
/// let red = Color::rgb(255, 0, 0);
/// assert_eq!(red.normalize(), [1.0, 0.0, 0.0, 1.0]);
///
/// let half_blue = Color::rgba(0, 0, 255, 128);
/// assert_eq!(half_blue.to_argb_pre(), 0x8000_0080);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color(pub [u8; 4]);

impl Color {
    /// All channels zero.
    pub const TRANSPARENT: Self = Self([0, 0, 0, 0]);
    /// Opaque black, the default fill and stroke paint of a fresh canvas.
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    /// Opaque white. Clip masks are initialized to this color.
    pub const WHITE: Self = Self([255, 255, 255, 255]);

    /// Creates an opaque color.
    ///
    /// ```
    /// use deferred_canvas::Color;
    ///
    /// assert_eq!(Color::rgb(0, 255, 0), Color([0, 255, 0, 255]));
    /// ```
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    /// Creates a color with an explicit alpha channel.
    pub fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    /// Decodes a straight (non-premultiplied) `0xAARRGGBB` word.
    pub fn from_argb(argb: u32) -> Self {
        let [a, r, g, b] = argb.to_be_bytes();
        Self([r, g, b, a])
    }

    /// Decodes a premultiplied `0xAARRGGBB` word back to straight alpha.
    ///
    /// ```
    /// use deferred_canvas::Color;
    ///
    /// assert_eq!(Color::from_argb_pre(0x8000_0080), Color::rgba(0, 0, 255, 128));
    /// assert_eq!(Color::from_argb_pre(0), Color::TRANSPARENT);
    /// ```
    pub fn from_argb_pre(argb: u32) -> Self {
        let [a, r, g, b] = argb.to_be_bytes();
        if a == 0 {
            return Self::TRANSPARENT;
        }
        let unpremultiply = |c: u8| ((c as u32 * 255 + a as u32 / 2) / a as u32).min(255) as u8;
        Self([unpremultiply(r), unpremultiply(g), unpremultiply(b), a])
    }

    /// Encodes this color as a straight `0xAARRGGBB` word.
    pub fn to_argb(&self) -> u32 {
        let [r, g, b, a] = self.0;
        u32::from_be_bytes([a, r, g, b])
    }

    /// Encodes this color as a premultiplied `0xAARRGGBB` word.
    pub fn to_argb_pre(&self) -> u32 {
        let [r, g, b, a] = self.premultiplied();
        u32::from_be_bytes([a, r, g, b])
    }

    /// Returns the premultiplied RGBA channels.
    pub fn premultiplied(&self) -> [u8; 4] {
        let [r, g, b, a] = self.0;
        [
            premultiply_channel(r, a),
            premultiply_channel(g, a),
            premultiply_channel(b, a),
            a,
        ]
    }

    /// Returns a copy with alpha scaled by `factor` in `[0, 1]`.
    pub fn with_alpha_scaled(&self, factor: f32) -> Self {
        let [r, g, b, a] = self.0;
        let alpha = (a as f32 * factor.clamp(0.0, 1.0)).round() as u8;
        Self([r, g, b, alpha])
    }

    /// Normalizes the channels to `[0.0, 1.0]` (straight alpha).
    pub fn normalize(&self) -> [f32; 4] {
        normalize_rgba_color(&self.0)
    }

    /// Returns the raw straight RGBA channels.
    pub fn to_array(&self) -> [u8; 4] {
        self.0
    }

    pub fn is_opaque(&self) -> bool {
        self.0[3] == 255
    }
}

#[inline]
pub(crate) fn premultiply_channel(channel: u8, alpha: u8) -> u8 {
    ((channel as u32 * alpha as u32 + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argb_round_trip_preserves_opaque_colors() {
        let color = Color::rgb(12, 200, 77);
        assert_eq!(Color::from_argb(color.to_argb()), color);
        assert_eq!(Color::from_argb_pre(color.to_argb_pre()), color);
    }

    #[test]
    fn premultiplied_halves_channels_at_half_alpha() {
        let color = Color::rgba(255, 100, 0, 128);
        assert_eq!(color.premultiplied(), [128, 50, 0, 128]);
    }

    #[test]
    fn with_alpha_scaled_clamps_factor() {
        assert_eq!(Color::WHITE.with_alpha_scaled(2.0), Color::WHITE);
        assert_eq!(Color::WHITE.with_alpha_scaled(0.0).0[3], 0);
    }
}
