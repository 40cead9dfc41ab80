use super::Rect;

/// Rasterizer viewport in pixels of the bound render target.
///
/// The composite pass maps NDC `[-1, 1]` onto this rectangle, so a viewport
/// recorded into a command list fixes the size the surface is composited at.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    /// Viewport covering a whole `width × height` target.
    #[inline]
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }

    #[inline]
    pub fn rect(self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// NDC (+Y up) to pixel coordinates (+Y down).
    #[inline]
    pub fn ndc_to_pixel(self, nx: f32, ny: f32) -> (f32, f32) {
        (
            self.x + (nx + 1.0) * 0.5 * self.width,
            self.y + (1.0 - ny) * 0.5 * self.height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ndc_corners_map_to_viewport_corners() {
        let vp = Viewport::new(10.0, 20.0, 100.0, 50.0);
        assert_eq!(vp.ndc_to_pixel(-1.0, 1.0), (10.0, 20.0));
        assert_eq!(vp.ndc_to_pixel(1.0, -1.0), (110.0, 70.0));
    }

    #[test]
    fn zero_sized_viewport_is_invalid() {
        assert!(!Viewport::from_size(0, 600).is_valid());
        assert!(Viewport::from_size(800, 600).is_valid());
    }
}
