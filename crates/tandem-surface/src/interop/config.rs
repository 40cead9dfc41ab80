use crate::device::{LockSide, LockTimeout, PixelFormat, SamplerFilter};

/// Configuration of an [`InteropSurface`](super::InteropSurface).
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceConfig {
    /// Format the shared surface is forced to, whatever the back buffer uses.
    pub format: PixelFormat,

    /// Key the owner acquires with. The guest releases with it.
    pub owner_key: u64,

    /// Key the guest acquires with. The owner releases with it.
    ///
    /// With distinct keys the sides strictly alternate, guest first: one
    /// guest draw, then one owner draw. Equal keys give plain mutual
    /// exclusion in any order.
    pub guest_key: u64,

    /// Timeout of the acquires done by `draw` and the auto-locking helpers.
    pub lock_timeout: LockTimeout,

    /// Whether `draw` brackets the replay with an owner acquire/release.
    pub lock_on_draw: bool,

    /// Composite opacity, written to the pixel-shader constant buffer.
    pub opacity: f32,

    /// Filter used when sampling the shared surface.
    pub sampler: SamplerFilter,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            format: PixelFormat::Bgra8Unorm,
            owner_key: 0,
            guest_key: 0,
            lock_timeout: LockTimeout::Infinite,
            lock_on_draw: true,
            opacity: 1.0,
            sampler: SamplerFilter::Point,
        }
    }
}

impl SurfaceConfig {
    /// Key `side` acquires with; the other side releases with it.
    #[inline]
    pub fn key(&self, side: LockSide) -> u64 {
        match side {
            LockSide::Owner => self.owner_key,
            LockSide::Guest => self.guest_key,
        }
    }
}
