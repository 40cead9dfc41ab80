use std::fmt;

use crate::device::{
    GuestDevice, LockSide, OwnerDevice, PixelFormat, Platform, SharedHandle, SwapChain, TextureDesc,
};
use crate::error::{InteropError, Result};

use super::{CrossContextLock, Guest, GuestLock, GuestSurface, Owner, OwnerLock, SwapChainOf, Texture};

/// A texture valid on both devices, with one lock capability per side.
pub struct SharedSurface<P: Platform> {
    texture: Texture<P>,
    guest_surface: GuestSurface<P>,
    handle: SharedHandle,
    desc: TextureDesc,
    owner_lock: CrossContextLock<OwnerLock<P>>,
    guest_lock: CrossContextLock<GuestLock<P>>,
}

impl<P: Platform> SharedSurface<P> {
    /// Allocates a surface matching the swap chain's back buffer in size, in
    /// `format`, renderable, sampleable and keyed-mutex shared.
    pub fn allocate_from_swap_chain(
        owner: &Owner<P>,
        guest: &Guest<P>,
        swap_chain: &SwapChainOf<P>,
        format: PixelFormat,
    ) -> Result<Self> {
        let back_buffer = swap_chain.back_buffer_desc()?;
        if back_buffer.is_empty() {
            return Err(InteropError::argument(format!(
                "back buffer is {}x{}",
                back_buffer.width, back_buffer.height
            )));
        }

        let desc = back_buffer.shared_surface(format);
        let texture = owner.create_texture(&desc)?;
        Self::open(owner, guest, texture)
    }

    /// Shares a texture the owner already allocated.
    pub fn from_texture(owner: &Owner<P>, guest: &Guest<P>, texture: Texture<P>) -> Result<Self> {
        let desc = owner.texture_desc(&texture);
        if desc.is_empty() || !desc.is_shareable() {
            return Err(InteropError::argument(
                "texture must be non-empty, bindable as render target and shader resource, \
                 and shared with a keyed mutex",
            ));
        }
        Self::open(owner, guest, texture)
    }

    fn open(owner: &Owner<P>, guest: &Guest<P>, texture: Texture<P>) -> Result<Self> {
        let desc = owner.texture_desc(&texture);
        let handle = owner.shared_handle(&texture)?;
        let guest_surface = guest.open_shared_surface(handle)?;

        let owner_lock = CrossContextLock::new(LockSide::Owner, owner.open_keyed_mutex(&texture)?);
        let guest_lock = CrossContextLock::new(LockSide::Guest, guest.open_keyed_mutex(&guest_surface)?);

        log::debug!(
            "SharedSurface: allocated {}x{} {:?}, handle {handle}",
            desc.width,
            desc.height,
            desc.format
        );
        Ok(Self {
            texture,
            guest_surface,
            handle,
            desc,
            owner_lock,
            guest_lock,
        })
    }

    pub fn texture(&self) -> &Texture<P> {
        &self.texture
    }

    pub fn guest_surface(&self) -> &GuestSurface<P> {
        &self.guest_surface
    }

    #[inline]
    pub fn handle(&self) -> SharedHandle {
        self.handle
    }

    #[inline]
    pub fn desc(&self) -> TextureDesc {
        self.desc
    }

    pub fn owner_lock(&self) -> &CrossContextLock<OwnerLock<P>> {
        &self.owner_lock
    }

    pub fn guest_lock(&self) -> &CrossContextLock<GuestLock<P>> {
        &self.guest_lock
    }
}

impl<P: Platform> fmt::Debug for SharedSurface<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSurface")
            .field("handle", &self.handle)
            .field("desc", &self.desc)
            .finish()
    }
}
