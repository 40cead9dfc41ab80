//! CPU implementation of the device traits.
//!
//! Models what the interop layer relies on from a real driver:
//! - shared handles resolved per adapter
//! - keyed mutexes with DXGI key/timeout semantics
//! - deferred command lists that pin the resources they reference
//! - a swap chain that refuses to resize while its buffers are referenced
//! - 2D begin/end-draw brackets with deferred errors
//!
//! Everything is observable through the adapter's [`SoftEvent`] journal, and
//! individual calls can be made to fail with [`SoftAdapter::inject_fault`].

mod adapter;
mod guest;
mod keyed;
mod memory;
mod owner;
mod raster;
mod swap_chain;
mod text;

use std::sync::Arc;

use parking_lot::RwLock;

use crate::device::{AdapterId, Platform};
use crate::error::Result;

pub use adapter::{DeviceId, DeviceRole, SoftAdapter, SoftEvent, SoftFault};
pub use guest::{SoftBrush, SoftGuestDevice, SoftGuestSurface, SoftRenderTarget2D, SoftTextFormat};
pub use keyed::SoftKeyedMutex;
pub use owner::{
    SoftBlendState, SoftBuffer, SoftCommand, SoftCommandList, SoftDeferredContext, SoftDevice,
    SoftOutput, SoftPipeline, SoftSampler, SoftShaderResourceView, SoftTexture,
};
pub use swap_chain::{PresentSink, SoftFrame, SoftSwapChain};
pub use text::{locale_from_env, FontCollection, FontLoadError, DEFAULT_LOCALE};

/// Soft backend entry point.
///
/// Clones share one font collection.
#[derive(Clone, Default)]
pub struct SoftPlatform {
    fonts: Arc<RwLock<FontCollection>>,
    locale: Option<String>,
}

impl SoftPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixes the locale guest devices report instead of reading the environment.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Makes a font available to every guest device of this platform.
    pub fn register_font(&self, family: impl Into<String>, bytes: &[u8]) -> std::result::Result<(), FontLoadError> {
        self.fonts.write().register(family, bytes)
    }

    pub fn font_count(&self) -> usize {
        self.fonts.read().len()
    }
}

impl Platform for SoftPlatform {
    type Adapter = SoftAdapter;
    type Owner = SoftDevice;
    type Guest = SoftGuestDevice;

    fn adapter_id(&self, adapter: &SoftAdapter) -> AdapterId {
        adapter.id()
    }

    fn create_owner_device(&self, adapter: &SoftAdapter) -> Result<SoftDevice> {
        SoftDevice::new(adapter.clone())
    }

    fn create_guest_device(&self, adapter: &SoftAdapter) -> Result<SoftGuestDevice> {
        SoftGuestDevice::new(adapter.clone(), Arc::clone(&self.fonts), self.locale.clone())
    }
}
