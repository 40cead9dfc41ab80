use std::fmt;

/// Font weight on the usual 1–999 scale.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct FontWeight(pub u16);

impl FontWeight {
    pub const THIN: Self = Self(100);
    pub const LIGHT: Self = Self(300);
    pub const NORMAL: Self = Self(400);
    pub const MEDIUM: Self = Self(500);
    pub const SEMI_BOLD: Self = Self(600);
    pub const BOLD: Self = Self(700);
    pub const BLACK: Self = Self(900);
}

impl Default for FontWeight {
    fn default() -> Self {
        Self::NORMAL
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum FontStyle {
    #[default]
    Normal,
    Oblique,
    Italic,
}

/// Width class, `1` (ultra condensed) to `9` (ultra expanded).
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum FontStretch {
    UltraCondensed = 1,
    ExtraCondensed = 2,
    Condensed = 3,
    SemiCondensed = 4,
    #[default]
    Normal = 5,
    SemiExpanded = 6,
    Expanded = 7,
    ExtraExpanded = 8,
    UltraExpanded = 9,
}

/// Everything needed to create a text format on a [`TextDevice`](super::TextDevice).
#[derive(Debug, Clone, PartialEq)]
pub struct TextFormatDesc {
    pub family: String,
    /// Em size in pixels.
    pub size: f32,
    pub weight: FontWeight,
    pub style: FontStyle,
    pub stretch: FontStretch,
    /// BCP-47 locale name, e.g. `en-US`.
    pub locale: String,
}

impl fmt::Display for TextFormatDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}px w{} {:?} ({})",
            self.family, self.size, self.weight.0, self.style, self.locale
        )
    }
}
