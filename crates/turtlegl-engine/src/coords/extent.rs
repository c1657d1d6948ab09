use super::Vec2;

/// Window extent in logical pixels.
///
/// Turtle (logical) space is centered on the window midpoint with +Y up, so a
/// point maps to device space by dividing each axis by half the extent.
/// Turtles capture the extent once at creation; a later resize does not
/// rescale geometry already written.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Extent {
    pub width: f32,
    pub height: f32,
}

impl Extent {
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }

    #[inline]
    pub fn half(self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }

    /// Logical -> device ([-1, 1]^2 for points inside the window).
    #[inline]
    pub fn to_device(self, p: Vec2) -> Vec2 {
        let half = self.half();
        Vec2::new(p.x / half.x, p.y / half.y)
    }

    /// Device -> logical.
    #[inline]
    pub fn to_logical(self, p: Vec2) -> Vec2 {
        let half = self.half();
        Vec2::new(p.x * half.x, p.y * half.y)
    }
}

impl Default for Extent {
    fn default() -> Self {
        Self::new(500.0, 500.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corner_maps_to_unit() {
        let e = Extent::new(800.0, 600.0);
        assert_eq!(e.to_device(Vec2::new(400.0, 300.0)), Vec2::new(1.0, 1.0));
        assert_eq!(e.to_device(Vec2::new(-400.0, -300.0)), Vec2::new(-1.0, -1.0));
    }

    #[test]
    fn origin_is_center() {
        let e = Extent::new(800.0, 600.0);
        assert_eq!(e.to_device(Vec2::zero()), Vec2::zero());
    }

    #[test]
    fn to_logical_inverts_to_device() {
        let e = Extent::new(640.0, 480.0);
        let p = Vec2::new(-160.0, 120.0);
        assert_eq!(e.to_logical(e.to_device(p)), p);
    }

    #[test]
    fn zero_extent_is_invalid() {
        assert!(!Extent::new(0.0, 10.0).is_valid());
        assert!(Extent::new(1.0, 1.0).is_valid());
    }
}
