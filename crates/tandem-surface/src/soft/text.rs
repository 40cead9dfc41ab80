use std::fmt;

use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};

use crate::coords::Rect;
use crate::paint::Color;

use super::raster;

/// Error returned by [`FontCollection::register`].
#[derive(Debug, Clone)]
pub struct FontLoadError(pub String);

impl fmt::Display for FontLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "font load error: {}", self.0)
    }
}

impl std::error::Error for FontLoadError {}

/// Fonts available to soft guest devices, by family name.
///
/// With no fonts registered, text renders in a built-in placeholder face that
/// draws every visible character as a box.
#[derive(Default)]
pub struct FontCollection {
    families: Vec<(String, fontdue::Font)>,
}

impl FontCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and stores a TrueType or OpenType font under `family`.
    pub fn register(&mut self, family: impl Into<String>, bytes: &[u8]) -> Result<(), FontLoadError> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| FontLoadError(e.to_string()))?;
        let family = family.into();
        log::debug!("FontCollection: registered family '{family}'");
        self.families.push((family, font));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Resolves a family, case-insensitively, falling back to the first font.
    pub(crate) fn resolve(&self, family: &str) -> Face {
        self.families
            .iter()
            .position(|(name, _)| name.eq_ignore_ascii_case(family))
            .or_else(|| (!self.families.is_empty()).then_some(0))
            .map_or(Face::Placeholder, Face::Font)
    }

    fn font(&self, face: Face) -> Option<&fontdue::Font> {
        match face {
            Face::Font(i) => self.families.get(i).map(|(_, f)| f),
            Face::Placeholder => None,
        }
    }
}

/// A resolved face inside a [`FontCollection`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Face {
    Font(usize),
    Placeholder,
}

/// Placeholder metrics, in ems.
const BOX_ADVANCE: f32 = 0.6;
const BOX_WIDTH: f32 = 0.5;
const BOX_ASCENT: f32 = 0.7;
const LINE_HEIGHT: f32 = 1.2;

/// Lays out `text` inside `layout` and blends it onto `target`.
///
/// Text wraps at the layout width and is clipped to the layout rect.
#[allow(clippy::too_many_arguments)]
pub(crate) fn draw_text(
    fonts: &FontCollection,
    face: Face,
    size: f32,
    target: &mut [[u8; 4]],
    width: u32,
    height: u32,
    text: &str,
    layout: Rect,
    color: Color,
) {
    let layout = layout.normalized();
    match fonts.font(face) {
        Some(font) => draw_with_font(font, size, target, width, height, text, layout, color),
        None => draw_placeholder(size, target, width, height, text, layout, color),
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_with_font(
    font: &fontdue::Font,
    size: f32,
    target: &mut [[u8; 4]],
    width: u32,
    height: u32,
    text: &str,
    layout: Rect,
    color: Color,
) {
    let mut lay: Layout<()> = Layout::new(CoordinateSystem::PositiveYDown);
    lay.reset(&LayoutSettings {
        x: layout.origin.x,
        y: layout.origin.y,
        max_width: Some(layout.size.x),
        ..LayoutSettings::default()
    });
    lay.append(&[font], &TextStyle::new(text, size, 0));

    for g in lay.glyphs() {
        if !g.char_data.rasterize() || g.width == 0 || g.height == 0 {
            continue;
        }
        let (metrics, bitmap) = font.rasterize_config(g.key);
        if metrics.width == 0 || metrics.height == 0 {
            continue;
        }
        raster::blit_coverage(
            target,
            width,
            height,
            layout,
            (g.x.round() as i64, g.y.round() as i64),
            &bitmap,
            (metrics.width, metrics.height),
            color,
        );
    }
}

fn draw_placeholder(
    size: f32,
    target: &mut [[u8; 4]],
    width: u32,
    height: u32,
    text: &str,
    layout: Rect,
    color: Color,
) {
    let advance = BOX_ADVANCE * size;
    let line = LINE_HEIGHT * size;
    let mut pen_x = layout.origin.x;
    let mut pen_y = layout.origin.y;

    for ch in text.chars() {
        if ch == '\n' {
            pen_x = layout.origin.x;
            pen_y += line;
            continue;
        }
        if pen_x + advance > layout.max().x && pen_x > layout.origin.x {
            pen_x = layout.origin.x;
            pen_y += line;
        }
        if !ch.is_whitespace() {
            let glyph = Rect::new(
                pen_x,
                pen_y + (LINE_HEIGHT - BOX_ASCENT) * size * 0.5,
                BOX_WIDTH * size,
                BOX_ASCENT * size,
            );
            if let Some(clipped) = glyph.intersect(layout) {
                raster::fill_rect(target, width, height, clipped, color);
            }
        }
        pen_x += advance;
    }
}

/// Locale of the current user as a BCP-47 name.
///
/// Reads `LC_ALL`, `LC_MESSAGES`, then `LANG`; `C`/`POSIX` and unset values
/// map to `en-US`.
pub fn locale_from_env() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.is_empty())
        .and_then(|v| posix_to_bcp47(&v))
        .unwrap_or_else(|| DEFAULT_LOCALE.to_owned())
}

pub const DEFAULT_LOCALE: &str = "en-US";

/// `en_US.UTF-8@euro` → `en-US`.
pub(crate) fn posix_to_bcp47(value: &str) -> Option<String> {
    let base = value.split(['.', '@']).next().unwrap_or_default();
    if base.is_empty() || base == "C" || base == "POSIX" {
        return None;
    }
    let mut parts = base.split('_');
    let lang = parts.next().filter(|l| l.chars().all(|c| c.is_ascii_alphabetic()))?;
    Some(match parts.next() {
        Some(region) if !region.is_empty() => {
            format!("{}-{}", lang.to_ascii_lowercase(), region.to_ascii_uppercase())
        }
        _ => lang.to_ascii_lowercase(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posix_locale_converts_to_bcp47() {
        assert_eq!(posix_to_bcp47("en_US.UTF-8").as_deref(), Some("en-US"));
        assert_eq!(posix_to_bcp47("de_de@euro").as_deref(), Some("de-DE"));
        assert_eq!(posix_to_bcp47("fr").as_deref(), Some("fr"));
    }

    #[test]
    fn c_locale_is_not_a_language() {
        assert_eq!(posix_to_bcp47("C.UTF-8"), None);
        assert_eq!(posix_to_bcp47("POSIX"), None);
        assert_eq!(posix_to_bcp47(""), None);
    }

    #[test]
    fn empty_collection_resolves_to_placeholder() {
        assert_eq!(FontCollection::new().resolve("Segoe UI"), Face::Placeholder);
    }

    #[test]
    fn bad_font_bytes_are_rejected() {
        let mut fonts = FontCollection::new();
        assert!(fonts.register("Broken", b"not a font").is_err());
        assert!(fonts.is_empty());
    }

    #[test]
    fn placeholder_draws_boxes_inside_layout() {
        let (w, h) = (64, 32);
        let mut target = vec![[0u8; 4]; (w * h) as usize];
        draw_text(
            &FontCollection::new(),
            Face::Placeholder,
            10.0,
            &mut target,
            w,
            h,
            "a b",
            Rect::new(0.0, 0.0, 64.0, 32.0),
            Color::WHITE,
        );

        let lit = |x: u32, y: u32| target[(y * w + x) as usize][3] == 255;
        // First box spans x in [0, 5), y in [2.5, 9.5).
        assert!(lit(2, 5));
        // Space between boxes stays empty.
        assert!(!lit(8, 5));
        // Third char starts at 2 * 6 px.
        assert!(lit(13, 5));
        assert!(!lit(2, 20));
    }

    #[test]
    fn placeholder_is_clipped_to_layout() {
        let (w, h) = (32, 32);
        let mut target = vec![[0u8; 4]; (w * h) as usize];
        draw_text(
            &FontCollection::new(),
            Face::Placeholder,
            10.0,
            &mut target,
            w,
            h,
            "x",
            Rect::new(0.0, 0.0, 3.0, 32.0),
            Color::WHITE,
        );
        assert!(target[(5 * w + 2) as usize][3] == 255);
        assert!(target[(5 * w + 3) as usize][3] == 0);
    }
}
