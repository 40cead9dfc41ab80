use core::ops::{BitOr, BitOrAssign};

/// Texel formats the interop layer knows how to share.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PixelFormat {
    /// 8-bit BGRA, premultiplied alpha. The only format both 2D and 3D
    /// backends are guaranteed to render into.
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgb10A2Unorm,
    Rgba16Float,
}

impl PixelFormat {
    #[inline]
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Rgba16Float => 8,
            _ => 4,
        }
    }

    #[inline]
    pub const fn is_srgb(self) -> bool {
        matches!(self, Self::Bgra8UnormSrgb | Self::Rgba8UnormSrgb)
    }
}

/// Pipeline stages a texture may be bound to.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct BindFlags(u32);

impl BindFlags {
    pub const NONE: Self = Self(0);
    pub const SHADER_RESOURCE: Self = Self(0x8);
    pub const RENDER_TARGET: Self = Self(0x20);
    pub const DEPTH_STENCIL: Self = Self(0x40);

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for BindFlags {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for BindFlags {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Miscellaneous resource flags.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct MiscFlags(u32);

impl MiscFlags {
    pub const NONE: Self = Self(0);
    /// Legacy shared resource without synchronization.
    pub const SHARED: Self = Self(0x2);
    /// Shared resource guarded by a keyed mutex.
    pub const SHARED_KEYED_MUTEX: Self = Self(0x100);

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for MiscFlags {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// 2D texture description, mirroring what a swap chain reports for its buffers.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub format: PixelFormat,
    pub bind: BindFlags,
    pub misc: MiscFlags,
}

impl TextureDesc {
    pub const fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            mip_levels: 1,
            format,
            bind: BindFlags::NONE,
            misc: MiscFlags::NONE,
        }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Derives the description of a surface that two devices can share.
    ///
    /// Size comes from `self`; format is forced to `format`; the result can be
    /// both rendered into and sampled, and carries a keyed mutex.
    pub fn shared_surface(&self, format: PixelFormat) -> Self {
        Self {
            width: self.width,
            height: self.height,
            mip_levels: 1,
            format,
            bind: BindFlags::RENDER_TARGET | BindFlags::SHADER_RESOURCE,
            misc: MiscFlags::SHARED_KEYED_MUTEX,
        }
    }

    /// True if the description satisfies the sharing requirements above.
    pub fn is_shareable(&self) -> bool {
        self.bind
            .contains(BindFlags::RENDER_TARGET | BindFlags::SHADER_RESOURCE)
            && self.misc.contains(MiscFlags::SHARED_KEYED_MUTEX)
    }
}

/// Shader-resource view description over a 2D texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ShaderResourceViewDesc {
    pub format: PixelFormat,
    pub most_detailed_mip: u32,
    pub mip_levels: u32,
}

impl ShaderResourceViewDesc {
    /// View covering every mip of `texture` in its own format.
    pub fn for_texture(texture: &TextureDesc) -> Self {
        Self {
            format: texture.format,
            most_detailed_mip: 0,
            mip_levels: texture.mip_levels.max(1),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SamplerFilter {
    Point,
    Linear,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    InvSrcAlpha,
}

impl BlendFactor {
    /// Evaluates the factor for a premultiplied source alpha.
    #[inline]
    pub fn eval(self, src_alpha: f32) -> f32 {
        match self {
            Self::Zero => 0.0,
            Self::One => 1.0,
            Self::SrcAlpha => src_alpha,
            Self::InvSrcAlpha => 1.0 - src_alpha,
        }
    }
}

/// Additive blend equation (`src * src_factor + dst * dst_factor`) for color and alpha.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BlendDesc {
    pub enabled: bool,
    pub color_src: BlendFactor,
    pub color_dst: BlendFactor,
    pub alpha_src: BlendFactor,
    pub alpha_dst: BlendFactor,
}

impl BlendDesc {
    /// Standard "over" compositing for premultiplied sources.
    pub const PREMULTIPLIED_OVER: Self = Self {
        enabled: true,
        color_src: BlendFactor::One,
        color_dst: BlendFactor::InvSrcAlpha,
        alpha_src: BlendFactor::One,
        alpha_dst: BlendFactor::InvSrcAlpha,
    };

    pub const REPLACE: Self = Self {
        enabled: false,
        color_src: BlendFactor::One,
        color_dst: BlendFactor::Zero,
        alpha_src: BlendFactor::One,
        alpha_dst: BlendFactor::Zero,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_surface_desc_forces_format_and_flags() {
        let mut back = TextureDesc::new(800, 600, PixelFormat::Rgba8UnormSrgb);
        back.bind = BindFlags::RENDER_TARGET;
        back.mip_levels = 3;

        let shared = back.shared_surface(PixelFormat::Bgra8Unorm);
        assert_eq!((shared.width, shared.height), (800, 600));
        assert_eq!(shared.format, PixelFormat::Bgra8Unorm);
        assert_eq!(shared.mip_levels, 1);
        assert!(shared.is_shareable());
        assert!(!back.is_shareable());
    }

    #[test]
    fn srv_desc_matches_texture_mips() {
        let mut tex = TextureDesc::new(4, 4, PixelFormat::Bgra8Unorm);
        tex.mip_levels = 0;
        let srv = ShaderResourceViewDesc::for_texture(&tex);
        assert_eq!(srv.mip_levels, 1);
        assert_eq!(srv.format, PixelFormat::Bgra8Unorm);
    }

    #[test]
    fn bind_flags_contains_union() {
        let both = BindFlags::RENDER_TARGET | BindFlags::SHADER_RESOURCE;
        assert!(both.contains(BindFlags::RENDER_TARGET));
        assert!(!BindFlags::RENDER_TARGET.contains(both));
    }

    #[test]
    fn inv_src_alpha_complements_alpha() {
        assert_eq!(BlendFactor::InvSrcAlpha.eval(0.25), 0.75);
        assert_eq!(BlendFactor::One.eval(0.25), 1.0);
    }
}
