use super::Vec2;

/// Axis-aligned rectangle in pixels (top-left origin).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

/// Integer pixel range `[x0, x1) × [y0, y1)` produced by [`Rect::pixel_span`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PixelSpan {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelSpan {
    #[inline]
    pub const fn width(self) -> u32 {
        self.x1 - self.x0
    }

    #[inline]
    pub const fn height(self) -> u32 {
        self.y1 - self.y0
    }
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    /// Rectangle anchored at the origin covering `width × height` pixels.
    #[inline]
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }

    #[inline]
    pub fn max(self) -> Vec2 {
        self.origin + self.size
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.size.x <= 0.0 || self.size.y <= 0.0
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.origin.is_finite() && self.size.is_finite()
    }

    /// Flips negative extents so width/height are non-negative.
    pub fn normalized(self) -> Self {
        let (mut x, mut w) = (self.origin.x, self.size.x);
        let (mut y, mut h) = (self.origin.y, self.size.y);
        if w < 0.0 {
            x += w;
            w = -w;
        }
        if h < 0.0 {
            y += h;
            h = -h;
        }
        Rect::new(x, y, w, h)
    }

    /// Half-open containment: [min, max).
    #[inline]
    pub fn contains(self, p: Vec2) -> bool {
        let r = self.normalized();
        let max = r.max();
        p.x >= r.origin.x && p.y >= r.origin.y && p.x < max.x && p.y < max.y
    }

    pub fn intersect(self, other: Rect) -> Option<Rect> {
        let a = self.normalized();
        let b = other.normalized();

        let x0 = a.origin.x.max(b.origin.x);
        let y0 = a.origin.y.max(b.origin.y);
        let x1 = a.max().x.min(b.max().x);
        let y1 = a.max().y.min(b.max().y);

        (x1 > x0 && y1 > y0).then(|| Rect::new(x0, y0, x1 - x0, y1 - y0))
    }

    /// Pixels whose centers fall inside the rect, clamped to a `width × height` target.
    ///
    /// Returns `None` when no pixel center is covered.
    pub fn pixel_span(self, width: u32, height: u32) -> Option<PixelSpan> {
        if !self.is_finite() {
            return None;
        }
        let r = self.normalized();
        let max = r.max();

        // A pixel `i` is covered when `i + 0.5` lies in [min, max).
        let first = |lo: f32, limit: u32| ((lo - 0.5).ceil().max(0.0) as u32).min(limit);
        let last = |hi: f32, limit: u32| ((hi - 0.5).ceil().max(0.0) as u32).min(limit);

        let span = PixelSpan {
            x0: first(r.origin.x, width),
            y0: first(r.origin.y, height),
            x1: last(max.x, width),
            y1: last(max.y, height),
        };
        (span.x1 > span.x0 && span.y1 > span.y0).then_some(span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: f32, y: f32, w: f32, h: f32) -> Rect {
        Rect::new(x, y, w, h)
    }

    #[test]
    fn normalized_flips_negative_extents() {
        let n = r(10.0, 10.0, -4.0, -3.0).normalized();
        assert_eq!(n, r(6.0, 7.0, 4.0, 3.0));
    }

    #[test]
    fn contains_is_half_open() {
        let rect = r(0.0, 0.0, 10.0, 10.0);
        assert!(rect.contains(Vec2::new(0.0, 0.0)));
        assert!(rect.contains(Vec2::new(9.9, 9.9)));
        assert!(!rect.contains(Vec2::new(10.0, 10.0)));
    }

    #[test]
    fn intersect_overlapping() {
        let i = r(0.0, 0.0, 10.0, 10.0).intersect(r(5.0, 5.0, 10.0, 10.0));
        assert_eq!(i, Some(r(5.0, 5.0, 5.0, 5.0)));
    }

    #[test]
    fn intersect_touching_edge_returns_none() {
        assert!(r(0.0, 0.0, 10.0, 10.0).intersect(r(10.0, 0.0, 5.0, 5.0)).is_none());
    }

    #[test]
    fn pixel_span_of_full_surface() {
        let span = Rect::from_size(800, 600).pixel_span(800, 600).unwrap();
        assert_eq!(span, PixelSpan { x0: 0, y0: 0, x1: 800, y1: 600 });
    }

    #[test]
    fn pixel_span_uses_pixel_centers() {
        // Covers centers 2.5 and 3.5 only.
        let span = r(2.2, 0.0, 1.6, 1.0).pixel_span(10, 10).unwrap();
        assert_eq!((span.x0, span.x1), (2, 4));
        assert_eq!(span.width(), 2);
    }

    #[test]
    fn pixel_span_clamps_to_target() {
        let span = r(-5.0, -5.0, 20.0, 20.0).pixel_span(8, 4).unwrap();
        assert_eq!(span, PixelSpan { x0: 0, y0: 0, x1: 8, y1: 4 });
    }

    #[test]
    fn pixel_span_misses_between_centers() {
        assert!(r(1.6, 1.6, 0.3, 0.3).pixel_span(10, 10).is_none());
        assert!(r(20.0, 0.0, 5.0, 5.0).pixel_span(10, 10).is_none());
    }
}
