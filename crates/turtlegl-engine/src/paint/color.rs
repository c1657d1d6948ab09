/// Straight (non-premultiplied) RGB pen color.
///
/// Components are clamped to `[0, 1]` by the constructors.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const RED: Rgb = Rgb::new_unchecked(1.0, 0.0, 0.0);
    pub const GREEN: Rgb = Rgb::new_unchecked(0.0, 1.0, 0.0);
    pub const BLUE: Rgb = Rgb::new_unchecked(0.0, 0.0, 1.0);
    pub const WHITE: Rgb = Rgb::new_unchecked(1.0, 1.0, 1.0);
    pub const BLACK: Rgb = Rgb::new_unchecked(0.0, 0.0, 0.0);

    #[inline]
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: clamp_unit(r),
            g: clamp_unit(g),
            b: clamp_unit(b),
        }
    }

    #[inline]
    const fn new_unchecked(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Creates a color from sRGB bytes (`0`–`255`).
    #[inline]
    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    /// Vertex color with the given alpha.
    #[inline]
    pub fn with_alpha(self, a: f32) -> [f32; 4] {
        [self.r, self.g, self.b, a]
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::RED
    }
}

impl From<(f32, f32, f32)> for Rgb {
    #[inline]
    fn from((r, g, b): (f32, f32, f32)) -> Self {
        Rgb::new(r, g, b)
    }
}

/// Straight-alpha RGBA color, used for clear colors and the program tint.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub const fn white() -> Self {
        Self::new(1.0, 1.0, 1.0, 1.0)
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite() && self.a.is_finite()
    }

    #[inline]
    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    #[inline]
    pub fn to_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r as f64,
            g: self.g as f64,
            b: self.b as f64,
            a: self.a as f64,
        }
    }
}

#[inline]
fn clamp_unit(v: f32) -> f32 {
    // NaN collapses to 0 rather than leaking into vertex data.
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clamps_out_of_range() {
        let c = Rgb::new(1.5, -0.2, 0.5);
        assert_eq!(c, Rgb::new(1.0, 0.0, 0.5));
    }

    #[test]
    fn new_maps_nan_to_zero() {
        assert_eq!(Rgb::new(f32::NAN, 1.0, 1.0).r, 0.0);
    }

    #[test]
    fn default_pen_is_red() {
        assert_eq!(Rgb::default(), Rgb::RED);
    }

    #[test]
    fn with_alpha_appends_channel() {
        assert_eq!(Rgb::GREEN.with_alpha(0.0), [0.0, 1.0, 0.0, 0.0]);
    }
}
