//! CPU rasterization helpers of the soft backend.
//!
//! Targets are row-major premultiplied RGBA8 texel slices.

use crate::coords::{Rect, Viewport};
use crate::device::{BlendDesc, QuadVertex, SamplerFilter};
use crate::paint::Color;

/// A borrowed texel grid.
pub(crate) struct Texels<'a> {
    pub data: &'a [[u8; 4]],
    pub width: u32,
    pub height: u32,
}

impl Texels<'_> {
    #[inline]
    fn fetch(&self, x: i64, y: i64) -> Color {
        // Clamp addressing.
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        Color::from_rgba8(self.data[y * self.width as usize + x])
    }

    /// Samples at normalized `(u, v)`.
    pub fn sample(&self, u: f32, v: f32, filter: SamplerFilter) -> Color {
        if self.width == 0 || self.height == 0 {
            return Color::TRANSPARENT;
        }
        let (w, h) = (self.width as f32, self.height as f32);
        match filter {
            SamplerFilter::Point => {
                self.fetch((u * w).floor() as i64, (v * h).floor() as i64)
            }
            SamplerFilter::Linear => {
                let fx = u * w - 0.5;
                let fy = v * h - 0.5;
                let (x0, y0) = (fx.floor(), fy.floor());
                let (tx, ty) = (fx - x0, fy - y0);
                let (x0, y0) = (x0 as i64, y0 as i64);

                let top = lerp(self.fetch(x0, y0), self.fetch(x0 + 1, y0), tx);
                let bottom = lerp(self.fetch(x0, y0 + 1), self.fetch(x0 + 1, y0 + 1), tx);
                lerp(top, bottom, ty)
            }
        }
    }
}

#[inline]
fn lerp(a: Color, b: Color, t: f32) -> Color {
    Color::from_premul(
        a.r + (b.r - a.r) * t,
        a.g + (b.g - a.g) * t,
        a.b + (b.b - a.b) * t,
        a.a + (b.a - a.a) * t,
    )
}

/// `src * src_factor + dst * dst_factor`, per channel group.
pub(crate) fn blend(src: Color, dst: Color, desc: &BlendDesc) -> Color {
    if !desc.enabled {
        return src;
    }
    let cs = desc.color_src.eval(src.a);
    let cd = desc.color_dst.eval(src.a);
    let as_ = desc.alpha_src.eval(src.a);
    let ad = desc.alpha_dst.eval(src.a);
    Color::from_premul(
        src.r * cs + dst.r * cd,
        src.g * cs + dst.g * cd,
        src.b * cs + dst.b * cd,
        src.a * as_ + dst.a * ad,
    )
}

/// Fills every texel of `target` with `color`.
pub(crate) fn clear(target: &mut [[u8; 4]], color: Color) {
    target.fill(color.to_rgba8());
}

/// Source-over fill of `rect`.
pub(crate) fn fill_rect(target: &mut [[u8; 4]], width: u32, height: u32, rect: Rect, color: Color) {
    let Some(span) = rect.pixel_span(width, height) else { return };
    for y in span.y0..span.y1 {
        let row = (y * width) as usize;
        for x in span.x0..span.x1 {
            let px = &mut target[row + x as usize];
            *px = blend(color, Color::from_rgba8(*px), &BlendDesc::PREMULTIPLIED_OVER).to_rgba8();
        }
    }
}

/// Source-over blit of an 8-bit coverage mask tinted with `color`, clipped to `clip`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn blit_coverage(
    target: &mut [[u8; 4]],
    width: u32,
    height: u32,
    clip: Rect,
    (x0, y0): (i64, i64),
    mask: &[u8],
    (mask_w, mask_h): (usize, usize),
    color: Color,
) {
    let Some(span) = clip.pixel_span(width, height) else { return };
    for my in 0..mask_h {
        let y = y0 + my as i64;
        if y < span.y0 as i64 || y >= span.y1 as i64 {
            continue;
        }
        for mx in 0..mask_w {
            let x = x0 + mx as i64;
            if x < span.x0 as i64 || x >= span.x1 as i64 {
                continue;
            }
            let coverage = mask[my * mask_w + mx];
            if coverage == 0 {
                continue;
            }
            let src = color.scale(coverage as f32 / 255.0);
            let px = &mut target[(y as u32 * width + x as u32) as usize];
            *px = blend(src, Color::from_rgba8(*px), &BlendDesc::PREMULTIPLIED_OVER).to_rgba8();
        }
    }
}

/// Fixed-function state of one textured draw.
pub(crate) struct QuadDraw<'a> {
    pub vertices: &'a [QuadVertex],
    pub source: Texels<'a>,
    pub filter: SamplerFilter,
    pub opacity: f32,
    pub blend: &'a BlendDesc,
    pub viewport: Viewport,
}

/// Draws a textured triangle strip into `target`.
///
/// Edges shared by adjacent triangles are rasterized exactly once, so
/// blending over a quad's diagonal is seamless.
pub(crate) fn draw_strip(target: &mut [[u8; 4]], width: u32, height: u32, draw: &QuadDraw<'_>) {
    let clip = match draw.viewport.rect().intersect(Rect::from_size(width, height)) {
        Some(clip) => clip,
        None => return,
    };

    let points: Vec<([f32; 2], [f32; 2])> = draw
        .vertices
        .iter()
        .map(|v| {
            let (x, y) = draw.viewport.ndc_to_pixel(v.pos[0], v.pos[1]);
            ([x, y], v.uv)
        })
        .collect();

    for tri in points.windows(3) {
        draw_triangle(target, width, height, clip, [tri[0], tri[1], tri[2]], draw);
    }
}

#[inline]
fn edge(a: [f32; 2], b: [f32; 2], p: [f32; 2]) -> f32 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

/// Tie-break for pixels exactly on an edge. Opposite traversal directions
/// of the same edge never both pass.
#[inline]
fn owns_edge(a: [f32; 2], b: [f32; 2]) -> bool {
    let dy = b[1] - a[1];
    let dx = b[0] - a[0];
    dy > 0.0 || (dy == 0.0 && dx < 0.0)
}

fn draw_triangle(
    target: &mut [[u8; 4]],
    width: u32,
    height: u32,
    clip: Rect,
    tri: [([f32; 2], [f32; 2]); 3],
    draw: &QuadDraw<'_>,
) {
    let [mut v0, mut v1, v2] = tri;
    let mut area = edge(v0.0, v1.0, v2.0);
    if area == 0.0 {
        return;
    }
    if area < 0.0 {
        core::mem::swap(&mut v0, &mut v1);
        area = -area;
    }

    let min_x = v0.0[0].min(v1.0[0]).min(v2.0[0]);
    let min_y = v0.0[1].min(v1.0[1]).min(v2.0[1]);
    let max_x = v0.0[0].max(v1.0[0]).max(v2.0[0]);
    let max_y = v0.0[1].max(v1.0[1]).max(v2.0[1]);
    let bounds = Rect::new(min_x, min_y, max_x - min_x, max_y - min_y);
    let Some(span) = bounds.intersect(clip).and_then(|r| r.pixel_span(width, height)) else {
        return;
    };

    let inside = |w: f32, a: [f32; 2], b: [f32; 2]| w > 0.0 || (w == 0.0 && owns_edge(a, b));

    for y in span.y0..span.y1 {
        for x in span.x0..span.x1 {
            let p = [x as f32 + 0.5, y as f32 + 0.5];
            let w0 = edge(v1.0, v2.0, p);
            let w1 = edge(v2.0, v0.0, p);
            let w2 = edge(v0.0, v1.0, p);
            if !(inside(w0, v1.0, v2.0) && inside(w1, v2.0, v0.0) && inside(w2, v0.0, v1.0)) {
                continue;
            }

            let (b0, b1, b2) = (w0 / area, w1 / area, w2 / area);
            let u = b0 * v0.1[0] + b1 * v1.1[0] + b2 * v2.1[0];
            let v = b0 * v0.1[1] + b1 * v1.1[1] + b2 * v2.1[1];

            let src = draw.source.sample(u, v, draw.filter).scale(draw.opacity);
            let px = &mut target[(y * width + x) as usize];
            *px = blend(src, Color::from_rgba8(*px), draw.blend).to_rgba8();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{BlendFactor, FULLSCREEN_QUAD};

    fn solid(width: u32, height: u32, px: [u8; 4]) -> Vec<[u8; 4]> {
        vec![px; (width * height) as usize]
    }

    #[test]
    fn premultiplied_over_on_opaque_background() {
        let src = Color::from_premul(0.5, 0.0, 0.0, 0.5);
        let out = blend(src, Color::from_premul(0.0, 0.0, 1.0, 1.0), &BlendDesc::PREMULTIPLIED_OVER);
        assert_eq!(out, Color::from_premul(0.5, 0.0, 0.5, 1.0));
    }

    #[test]
    fn disabled_blend_replaces() {
        let src = Color::from_premul(0.1, 0.2, 0.3, 0.4);
        assert_eq!(blend(src, Color::WHITE, &BlendDesc::REPLACE), src);
    }

    #[test]
    fn point_sampling_picks_nearest_texel() {
        let data = [[255, 0, 0, 255], [0, 255, 0, 255]];
        let tex = Texels { data: &data, width: 2, height: 1 };
        assert_eq!(tex.sample(0.1, 0.5, SamplerFilter::Point).r, 1.0);
        assert_eq!(tex.sample(0.9, 0.5, SamplerFilter::Point).g, 1.0);
    }

    #[test]
    fn linear_sampling_blends_at_midpoint() {
        let data = [[0, 0, 0, 255], [254, 254, 254, 255]];
        let tex = Texels { data: &data, width: 2, height: 1 };
        let c = tex.sample(0.5, 0.5, SamplerFilter::Linear);
        assert!((c.r - 127.0 / 255.0).abs() < 1e-4);
    }

    #[test]
    fn fill_rect_covers_pixel_centers_only() {
        let mut target = solid(4, 4, [0, 0, 0, 0]);
        fill_rect(&mut target, 4, 4, Rect::new(1.0, 1.0, 2.0, 1.0), Color::WHITE);
        let lit: Vec<usize> = (0..16).filter(|&i| target[i][3] == 255).collect();
        assert_eq!(lit, vec![5, 6]);
    }

    #[test]
    fn fullscreen_strip_covers_every_pixel_once() {
        let (w, h) = (7, 5);
        let half = [[0, 0, 0, 100]; 4];
        let mut target = solid(w, h, [0, 0, 0, 0]);
        // Additive blend exposes double coverage along the diagonal.
        let additive = BlendDesc {
            enabled: true,
            color_src: BlendFactor::One,
            color_dst: BlendFactor::One,
            alpha_src: BlendFactor::One,
            alpha_dst: BlendFactor::One,
        };
        let draw = QuadDraw {
            vertices: &FULLSCREEN_QUAD,
            source: Texels { data: &half, width: 2, height: 2 },
            filter: SamplerFilter::Point,
            opacity: 1.0,
            blend: &additive,
            viewport: Viewport::from_size(w, h),
        };
        draw_strip(&mut target, w, h, &draw);

        assert!(target.iter().all(|px| px[3] == 100), "{target:?}");
    }

    #[test]
    fn strip_maps_uv_corners() {
        let source = [
            [255, 0, 0, 255],
            [0, 255, 0, 255],
            [0, 0, 255, 255],
            [255, 255, 255, 255],
        ];
        let mut target = solid(4, 4, [0, 0, 0, 255]);
        let draw = QuadDraw {
            vertices: &FULLSCREEN_QUAD,
            source: Texels { data: &source, width: 2, height: 2 },
            filter: SamplerFilter::Point,
            opacity: 1.0,
            blend: &BlendDesc::PREMULTIPLIED_OVER,
            viewport: Viewport::from_size(4, 4),
        };
        draw_strip(&mut target, 4, 4, &draw);

        assert_eq!(target[0], [255, 0, 0, 255]);
        assert_eq!(target[3], [0, 255, 0, 255]);
        assert_eq!(target[12], [0, 0, 255, 255]);
        assert_eq!(target[15], [255, 255, 255, 255]);
    }

    #[test]
    fn viewport_limits_the_composite() {
        let source = [[255, 255, 255, 255]];
        let mut target = solid(4, 4, [0, 0, 0, 0]);
        let draw = QuadDraw {
            vertices: &FULLSCREEN_QUAD,
            source: Texels { data: &source, width: 1, height: 1 },
            filter: SamplerFilter::Point,
            opacity: 0.5,
            blend: &BlendDesc::PREMULTIPLIED_OVER,
            viewport: Viewport::from_size(2, 2),
        };
        draw_strip(&mut target, 4, 4, &draw);

        assert_eq!(target[0], [128, 128, 128, 128]);
        assert_eq!(target[2], [0, 0, 0, 0]);
        assert_eq!(target[8], [0, 0, 0, 0]);
    }
}
