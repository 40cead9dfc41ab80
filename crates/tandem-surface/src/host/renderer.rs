use std::fmt;

use crate::device::{OwnerDevice, Platform, SwapChain, TextDevice};
use crate::error::Result;
use crate::interop::{Guest, SurfaceState, SwapChainOf, TextSurface};
use crate::paint::Color;

use super::RenderBackend;

/// Per-frame guest drawing, called with the frame index before compositing.
pub type GuestPass<P> = Box<dyn FnMut(&mut TextSurface<P>, u64) -> Result<()>>;

/// [`RenderBackend`] compositing a [`TextSurface`] onto an owner swap chain.
///
/// Each frame: clear the back buffer, run the guest pass, composite, present.
pub struct InteropRenderer<P: Platform>
where
    Guest<P>: TextDevice,
{
    surface: TextSurface<P>,
    swap_chain: SwapChainOf<P>,
    clear_color: Color,
    guest_pass: Option<GuestPass<P>>,
    frame: u64,
}

impl<P: Platform> InteropRenderer<P>
where
    Guest<P>: TextDevice,
{
    /// `swap_chain` must belong to the surface's owner device.
    pub fn new(surface: TextSurface<P>, swap_chain: SwapChainOf<P>) -> Self {
        Self {
            surface,
            swap_chain,
            clear_color: Color::BLACK,
            guest_pass: None,
            frame: 0,
        }
    }

    pub fn with_guest_pass(mut self, pass: GuestPass<P>) -> Self {
        self.guest_pass = Some(pass);
        self
    }

    pub fn set_guest_pass(&mut self, pass: GuestPass<P>) {
        self.guest_pass = Some(pass);
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    pub fn surface(&self) -> &TextSurface<P> {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut TextSurface<P> {
        &mut self.surface
    }

    pub fn swap_chain(&self) -> &SwapChainOf<P> {
        &self.swap_chain
    }

    pub fn swap_chain_mut(&mut self) -> &mut SwapChainOf<P> {
        &mut self.swap_chain
    }

    /// Frames drawn so far.
    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    fn back_buffer_size(&self) -> Result<(u32, u32)> {
        let desc = self.swap_chain.back_buffer_desc()?;
        Ok((desc.width, desc.height))
    }
}

impl<P: Platform> RenderBackend for InteropRenderer<P>
where
    Guest<P>: TextDevice,
{
    fn initialise(&mut self, width: u32, height: u32) -> Result<()> {
        if width != 0 && height != 0 && self.back_buffer_size()? != (width, height) {
            self.swap_chain.resize_buffers(width, height)?;
        }
        self.surface.initialise(&self.swap_chain)?;
        self.surface.owner_device().bind_back_buffer(&self.swap_chain)
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            log::debug!("InteropRenderer: ignoring resize to {width}x{height}");
            return Ok(());
        }
        let state = self.surface.state();
        if state == SurfaceState::Initialised && self.back_buffer_size()? == (width, height) {
            return Ok(());
        }

        // Nothing may reference the back buffer while it is resized.
        self.surface.owner_device().unbind_targets();
        self.surface.prepare_resize();
        self.swap_chain.resize_buffers(width, height)?;

        if state == SurfaceState::Uninitialised {
            self.surface.initialise(&self.swap_chain)?;
        } else {
            self.surface.resize(&self.swap_chain)?;
        }
        self.surface.owner_device().bind_back_buffer(&self.swap_chain)
    }

    fn draw(&mut self) -> Result<()> {
        self.surface.owner_device().clear_target(self.clear_color)?;
        if let Some(pass) = self.guest_pass.as_mut() {
            pass(&mut self.surface, self.frame)?;
        }
        self.surface.draw()?;
        self.frame += 1;
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        self.swap_chain.present()
    }
}

impl<P: Platform> fmt::Debug for InteropRenderer<P>
where
    Guest<P>: TextDevice,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteropRenderer")
            .field("surface", &*self.surface)
            .field("clear_color", &self.clear_color)
            .field("frame", &self.frame)
            .finish()
    }
}
