use bytemuck::{Pod, Zeroable};

/// Vertex of the composite quad: NDC position plus surface UV.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
}

pub const QUAD_VERTEX_COUNT: u32 = 4;

/// Full-screen triangle strip (TL, TR, BL, BR).
pub const FULLSCREEN_QUAD: [QuadVertex; QUAD_VERTEX_COUNT as usize] = [
    QuadVertex { pos: [-1.0, 1.0], uv: [0.0, 0.0] },
    QuadVertex { pos: [1.0, 1.0], uv: [1.0, 0.0] },
    QuadVertex { pos: [-1.0, -1.0], uv: [0.0, 1.0] },
    QuadVertex { pos: [1.0, -1.0], uv: [1.0, 1.0] },
];

/// Pixel-shader constants of the composite pass.
///
/// Padded to 16 bytes (constant buffers are sized in float4 registers).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct CompositeConstants {
    pub opacity: f32,
    pub _pad: [f32; 3],
}

impl CompositeConstants {
    #[inline]
    pub fn new(opacity: f32) -> Self {
        Self {
            opacity: opacity.clamp(0.0, 1.0),
            _pad: [0.0; 3],
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Reads constants back from a buffer's contents.
    ///
    /// Short or misaligned input yields `None`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let size = core::mem::size_of::<Self>();
        bytes
            .get(..size)
            .and_then(|b| bytemuck::try_pod_read_unaligned(b).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_fill_one_register() {
        assert_eq!(core::mem::size_of::<CompositeConstants>(), 16);
        assert_eq!(CompositeConstants::new(0.5).as_bytes().len(), 16);
    }

    #[test]
    fn opacity_is_clamped() {
        assert_eq!(CompositeConstants::new(3.0).opacity, 1.0);
        assert_eq!(CompositeConstants::new(-1.0).opacity, 0.0);
    }

    #[test]
    fn constants_read_back_from_bytes() {
        let c = CompositeConstants::new(0.25);
        assert_eq!(CompositeConstants::from_bytes(c.as_bytes()), Some(c));
        assert_eq!(CompositeConstants::from_bytes(&[0u8; 4]), None);
    }

    #[test]
    fn quad_spans_full_ndc() {
        let xs: Vec<f32> = FULLSCREEN_QUAD.iter().map(|v| v.pos[0]).collect();
        assert!(xs.contains(&-1.0) && xs.contains(&1.0));
        assert_eq!(FULLSCREEN_QUAD[3].uv, [1.0, 1.0]);
    }
}
