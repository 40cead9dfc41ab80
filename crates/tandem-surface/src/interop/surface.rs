use std::fmt;

use crate::device::{
    AcquireStatus, DeviceRegistry, GuestDevice, LockSide, LockTimeout, OwnerDevice, Platform,
    SharedHandle, TextureDesc,
};
use crate::error::{InteropError, Result};
use crate::paint::Color;

use super::cache::{record_composite, CommandCache};
use super::resources::{create_view, DeviceResources, IndependentResources};
use super::{
    BlendState, Brush, CommandList, CrossContextLock, Guest, GuestLock, Owner, OwnerLock,
    RenderTarget, Sampler, ShaderView, SharedSurface, SurfaceConfig, SwapChainOf, Texture,
};

/// Lifecycle of an [`InteropSurface`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceState {
    Uninitialised,
    Initialised,
    /// Between `prepare_resize` and `resize`.
    Resizing,
}

/// Shared surface plus everything needed to composite it.
///
/// `uninitialised → initialised → resizing → initialised → …`; dropping the
/// façade tears everything down.
pub struct InteropSurface<P: Platform> {
    // Field order is teardown order.
    cache: CommandCache<CommandList<P>>,
    resources: Option<DeviceResources<P>>,
    shared: Option<SharedSurface<P>>,
    independent: Option<IndependentResources<P>>,

    owner: Owner<P>,
    guest: Guest<P>,
    config: SurfaceConfig,
    state: SurfaceState,
    generation: u64,
}

impl<P: Platform> InteropSurface<P> {
    /// Façade on `adapter`: the owner device comes from the registry's
    /// per-adapter cache, the guest device is created fresh.
    pub fn new(registry: &DeviceRegistry<P>, adapter: &P::Adapter, config: SurfaceConfig) -> Result<Self> {
        let owner = registry.owner_device(adapter)?;
        let guest = registry.create_guest_device(adapter)?;
        Self::with_devices(owner, guest, config)
    }

    /// Façade over explicitly provided (possibly shared) devices.
    pub fn with_devices(owner: Owner<P>, guest: Guest<P>, config: SurfaceConfig) -> Result<Self> {
        if owner.adapter_id() != guest.adapter_id() {
            return Err(InteropError::argument(format!(
                "owner device is on {} but guest device is on {}",
                owner.adapter_id(),
                guest.adapter_id()
            )));
        }
        Ok(Self {
            cache: CommandCache::new(),
            resources: None,
            shared: None,
            independent: None,
            owner,
            guest,
            config,
            state: SurfaceState::Uninitialised,
            generation: 0,
        })
    }

    // ── lifecycle ──

    /// Allocates the shared surface to match `swap_chain`'s back buffer and
    /// builds the resource set. The composite list is built on first draw.
    pub fn initialise(&mut self, swap_chain: &SwapChainOf<P>) -> Result<()> {
        self.expect_state(SurfaceState::Uninitialised, "initialise")?;
        let format = self.config.format;
        self.build(|owner, guest| SharedSurface::allocate_from_swap_chain(owner, guest, swap_chain, format))
    }

    /// Like [`initialise`](Self::initialise), sharing a texture the owner
    /// already allocated.
    pub fn initialise_with_texture(&mut self, texture: Texture<P>) -> Result<()> {
        self.expect_state(SurfaceState::Uninitialised, "initialise")?;
        self.build(|owner, guest| SharedSurface::from_texture(owner, guest, texture))
    }

    /// Releases the command list, resource set, surface and lock handles so
    /// the host can resize its swap chain. Idempotent.
    pub fn prepare_resize(&mut self) {
        match self.state {
            SurfaceState::Initialised => {
                self.teardown();
                self.state = SurfaceState::Resizing;
                log::debug!("InteropSurface: prepared for resize (generation {})", self.generation);
            }
            SurfaceState::Resizing | SurfaceState::Uninitialised => {}
        }
    }

    /// Reallocates the surface and resource set against the resized swap chain.
    pub fn resize(&mut self, swap_chain: &SwapChainOf<P>) -> Result<()> {
        self.expect_state(SurfaceState::Resizing, "resize")?;
        let format = self.config.format;
        self.build(|owner, guest| SharedSurface::allocate_from_swap_chain(owner, guest, swap_chain, format))
    }

    /// All-or-nothing: nothing is replaced unless every step succeeds.
    fn build(
        &mut self,
        allocate: impl FnOnce(&Owner<P>, &Guest<P>) -> Result<SharedSurface<P>>,
    ) -> Result<()> {
        if self.independent.is_none() {
            self.independent = Some(IndependentResources::create(&self.owner, &self.config)?);
        }

        let shared = allocate(&self.owner, &self.guest)?;
        let resources = DeviceResources::create(&self.owner, &self.guest, &shared, &self.config)?;
        hand_to_guest(&shared, &self.config)?;

        self.teardown();
        let desc = shared.desc();
        self.shared = Some(shared);
        self.resources = Some(resources);
        self.generation += 1;
        self.state = SurfaceState::Initialised;

        log::info!(
            "InteropSurface: surface ready at {}x{} (generation {})",
            desc.width,
            desc.height,
            self.generation
        );
        Ok(())
    }

    fn teardown(&mut self) {
        self.cache.invalidate();
        self.resources = None;
        self.shared = None;
    }

    fn expect_state(&self, expected: SurfaceState, op: &str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(InteropError::invalid_operation(format!(
                "{op} requires state {expected:?}, surface is {:?}",
                self.state
            )))
        }
    }

    /// (Re)creates the owner's shader-resource view of the current surface.
    ///
    /// The old view is released first; the cached command list, which
    /// references it, is dropped.
    pub fn alloc_shader_res_view(&mut self) -> Result<()> {
        let shared = self.shared.as_ref().ok_or_else(|| InteropError::no_such_resource("shared surface"))?;
        let resources = self
            .resources
            .as_mut()
            .ok_or_else(|| InteropError::no_such_resource("device resources"))?;

        self.cache.invalidate();
        resources.view = None;
        resources.view = Some(create_view::<P>(&self.owner, shared)?);
        Ok(())
    }

    // ── owner side ──

    /// Composites the shared surface onto the owner's bound render target.
    ///
    /// Records the composite list on first use after (re)initialisation,
    /// then replays it under the owner lock.
    pub fn draw(&mut self) -> Result<()> {
        if self.state != SurfaceState::Initialised {
            return Err(InteropError::invalid_operation("resource not ready"));
        }
        let not_ready = || InteropError::invalid_operation("resource not ready");
        let shared = self.shared.as_ref().ok_or_else(not_ready)?;
        let resources = self.resources.as_ref().ok_or_else(not_ready)?;
        let independent = self.independent.as_ref().ok_or_else(not_ready)?;
        let view = resources
            .view
            .as_ref()
            .ok_or_else(|| InteropError::invalid_operation("shader resource view not allocated"))?;

        let owner = &self.owner;
        let list = self.cache.ensure_built(|| {
            record_composite(
                owner,
                &independent.pipeline,
                view,
                &resources.sampler,
                &independent.constants,
                &resources.blend,
            )
        })?;

        if !self.config.lock_on_draw {
            return owner.execute_command_list(list);
        }

        let guard = shared
            .owner_lock()
            .lock_handing_off(
                self.config.key(LockSide::Owner),
                self.config.key(LockSide::Guest),
                self.config.lock_timeout,
            )?;
        let executed = owner.execute_command_list(list);
        let released = guard.release();
        executed.and(released)
    }

    /// Sets composite opacity; takes effect on the next draw without a rebuild.
    pub fn set_opacity(&mut self, opacity: f32) -> Result<()> {
        self.config.opacity = opacity.clamp(0.0, 1.0);
        match &self.independent {
            Some(independent) => independent.set_opacity(&self.owner, self.config.opacity),
            None => Ok(()),
        }
    }

    // ── locks ──

    /// Acquires one side of the surface lock.
    ///
    /// A missed finite timeout is returned as [`AcquireStatus::TimedOut`].
    pub fn acquire(&self, side: LockSide, key: u64, timeout: LockTimeout) -> Result<AcquireStatus> {
        match side {
            LockSide::Owner => self.owner_lock()?.acquire(key, timeout),
            LockSide::Guest => self.guest_lock()?.acquire(key, timeout),
        }
    }

    pub fn release(&self, side: LockSide, key: u64) -> Result<()> {
        match side {
            LockSide::Owner => self.owner_lock()?.release(key),
            LockSide::Guest => self.guest_lock()?.release(key),
        }
    }

    pub fn owner_lock(&self) -> Result<&CrossContextLock<OwnerLock<P>>> {
        self.shared
            .as_ref()
            .map(SharedSurface::owner_lock)
            .ok_or_else(|| InteropError::no_such_resource("owner-side surface lock"))
    }

    pub fn guest_lock(&self) -> Result<&CrossContextLock<GuestLock<P>>> {
        self.shared
            .as_ref()
            .map(SharedSurface::guest_lock)
            .ok_or_else(|| InteropError::no_such_resource("guest-side surface lock"))
    }

    // ── guest side ──

    /// Runs `paint` against the guest render target.
    ///
    /// With `auto_lock`: guest acquire, begin-draw, `paint`, end-draw, guest
    /// release with the owner's key. The release happens even if end-draw fails, and the end-draw
    /// error wins. Without it the caller already holds the guest lock and has
    /// begun drawing.
    pub fn draw_guest(
        &mut self,
        auto_lock: bool,
        paint: impl FnOnce(&Guest<P>, &mut RenderTarget<P>),
    ) -> Result<()> {
        let not_ready = || InteropError::invalid_operation("guest drawing before initialise");
        let shared = self.shared.as_ref().ok_or_else(not_ready)?;
        let resources = self.resources.as_mut().ok_or_else(not_ready)?;
        let guest = &self.guest;
        let target = &mut resources.guest_target;

        if !auto_lock {
            paint(guest, target);
            return Ok(());
        }

        let guard = shared
            .guest_lock()
            .lock_handing_off(
                self.config.key(LockSide::Guest),
                self.config.key(LockSide::Owner),
                self.config.lock_timeout,
            )?;
        guest.begin_draw(target);
        paint(guest, &mut *target);
        let ended = guest.end_draw(target);
        let released = guard.release();
        if let Err(e) = &ended {
            log::warn!("InteropSurface: guest end_draw failed: {e}");
        }
        ended.and(released)
    }

    /// Opens a guest draw bracket for callers managing the lock themselves.
    pub fn begin_draw(&mut self) -> Result<()> {
        let resources = guest_resources(&mut self.resources, "begin_draw")?;
        self.guest.begin_draw(&mut resources.guest_target);
        Ok(())
    }

    pub fn end_draw(&mut self) -> Result<()> {
        let resources = guest_resources(&mut self.resources, "end_draw")?;
        self.guest.end_draw(&mut resources.guest_target)
    }

    pub fn create_solid_brush(&self, color: Color) -> Result<Brush<P>> {
        let resources = self
            .resources
            .as_ref()
            .ok_or_else(|| InteropError::invalid_operation("brush requested before initialise"))?;
        self.guest.create_solid_brush(&resources.guest_target, color)
    }

    // ── accessors ──

    #[inline]
    pub fn state(&self) -> SurfaceState {
        self.state
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state == SurfaceState::Initialised
    }

    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    pub fn owner_device(&self) -> &Owner<P> {
        &self.owner
    }

    pub fn guest_device(&self) -> &Guest<P> {
        &self.guest
    }

    /// Incremented by every successful `initialise`/`resize`.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cache_builds(&self) -> u64 {
        self.cache.builds()
    }

    pub fn command_list(&self) -> Option<&CommandList<P>> {
        self.cache.get()
    }

    pub fn shared_surface(&self) -> Option<&SharedSurface<P>> {
        self.shared.as_ref()
    }

    pub fn shared_handle(&self) -> Option<SharedHandle> {
        self.shared.as_ref().map(SharedSurface::handle)
    }

    pub fn surface_desc(&self) -> Option<TextureDesc> {
        self.shared.as_ref().map(SharedSurface::desc)
    }

    pub fn shared_texture(&self) -> Option<&Texture<P>> {
        self.shared.as_ref().map(SharedSurface::texture)
    }

    pub fn shader_resource_view(&self) -> Option<&ShaderView<P>> {
        self.resources.as_ref().and_then(|r| r.view.as_ref())
    }

    pub fn sampler(&self) -> Option<&Sampler<P>> {
        self.resources.as_ref().map(|r| &r.sampler)
    }

    pub fn blend_state(&self) -> Option<&BlendState<P>> {
        self.resources.as_ref().map(|r| &r.blend)
    }

    pub fn guest_render_target(&self) -> Option<&RenderTarget<P>> {
        self.resources.as_ref().map(|r| &r.guest_target)
    }
}

/// Moves a fresh surface from key 0 to the guest's key so the guest draws
/// first. No-op with a guest key of 0.
fn hand_to_guest<P: Platform>(shared: &SharedSurface<P>, config: &SurfaceConfig) -> Result<()> {
    let guest_key = config.key(LockSide::Guest);
    if guest_key == 0 {
        return Ok(());
    }
    let lock = shared.owner_lock();
    match lock.acquire(0, LockTimeout::IMMEDIATE)? {
        AcquireStatus::Acquired => lock.release(guest_key),
        AcquireStatus::TimedOut => {
            log::warn!("InteropSurface: surface not released at key 0, guest key {guest_key} left unset");
            Ok(())
        }
    }
}

fn guest_resources<'a, P: Platform>(
    resources: &'a mut Option<DeviceResources<P>>,
    op: &str,
) -> Result<&'a mut DeviceResources<P>> {
    resources
        .as_mut()
        .ok_or_else(|| InteropError::invalid_operation(format!("{op} before initialise")))
}

impl<P: Platform> Drop for InteropSurface<P> {
    fn drop(&mut self) {
        self.teardown();
        self.independent = None;
        log::debug!("InteropSurface: torn down after {} generation(s)", self.generation);
    }
}

impl<P: Platform> fmt::Debug for InteropSurface<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteropSurface")
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("cached", &self.cache.is_built())
            .field("surface", &self.surface_desc())
            .finish()
    }
}
