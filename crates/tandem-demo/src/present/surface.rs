use winit::dpi::PhysicalSize;

use super::SurfaceErrorAction;

/// Formats soft frames can be copied into without conversion beyond a swizzle.
///
/// Soft texels already hold display-encoded values, so sRGB formats are skipped.
pub(crate) fn choose_surface_format(caps: &wgpu::SurfaceCapabilities) -> Option<wgpu::TextureFormat> {
    [wgpu::TextureFormat::Bgra8Unorm, wgpu::TextureFormat::Rgba8Unorm]
        .into_iter()
        .find(|f| caps.formats.contains(f))
}

pub(crate) fn choose_alpha_mode(
    caps: &wgpu::SurfaceCapabilities,
    requested: Option<wgpu::CompositeAlphaMode>,
) -> wgpu::CompositeAlphaMode {
    requested
        .filter(|m| caps.alpha_modes.contains(m))
        .or_else(|| caps.alpha_modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

pub(crate) fn apply_resize(
    surface: &wgpu::Surface,
    device: &wgpu::Device,
    config: &mut wgpu::SurfaceConfiguration,
    size: &mut PhysicalSize<u32>,
    new_size: PhysicalSize<u32>,
) {
    *size = new_size;
    if new_size.width == 0 || new_size.height == 0 {
        return;
    }

    config.width = new_size.width;
    config.height = new_size.height;
    surface.configure(device, config);
}

pub(crate) fn map_surface_error(
    surface: &wgpu::Surface,
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    err: wgpu::SurfaceError,
) -> SurfaceErrorAction {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
            if size.width > 0 && size.height > 0 {
                surface.configure(device, config);
            }
            SurfaceErrorAction::Reconfigured
        }
        wgpu::SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
        wgpu::SurfaceError::Timeout => SurfaceErrorAction::SkipFrame,
        wgpu::SurfaceError::Other => SurfaceErrorAction::SkipFrame,
    }
}

/// Packs premultiplied RGBA texels for `format`.
pub(crate) fn pack_texels(texels: &[[u8; 4]], format: wgpu::TextureFormat) -> Vec<u8> {
    match format {
        wgpu::TextureFormat::Bgra8Unorm => texels.iter().flat_map(|&[r, g, b, a]| [b, g, r, a]).collect(),
        _ => bytemuck::cast_slice(texels).to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgra_packing_swaps_red_and_blue() {
        let packed = pack_texels(&[[1, 2, 3, 4], [5, 6, 7, 8]], wgpu::TextureFormat::Bgra8Unorm);
        assert_eq!(packed, [3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn rgba_packing_is_a_plain_copy() {
        let packed = pack_texels(&[[1, 2, 3, 4]], wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(packed, [1, 2, 3, 4]);
    }
}
