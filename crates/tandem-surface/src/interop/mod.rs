//! Shared-surface interop façade.
//!
//! Per frame:
//! - guest acquires, draws into the shared surface, releases
//! - owner acquires, replays the cached composite, releases, presents
//!
//! On resize the façade drops everything that references swap-chain buffers
//! before the host resizes them, then reallocates the surface and views and
//! rebuilds the composite lazily on the next draw.

mod cache;
mod config;
mod lock;
mod resources;
mod shared;
mod surface;
mod text;

pub use cache::{record_composite, CommandCache};
pub use config::SurfaceConfig;
pub use lock::{CrossContextLock, LockGuard};
pub use resources::{DeviceResources, IndependentResources};
pub use shared::SharedSurface;
pub use surface::{InteropSurface, SurfaceState};
pub use text::TextSurface;

use crate::device::{GuestDevice, OwnerDevice, Platform, TextDevice};

pub type Owner<P> = <P as Platform>::Owner;
pub type Guest<P> = <P as Platform>::Guest;

pub type SwapChainOf<P> = <Owner<P> as OwnerDevice>::SwapChain;
pub type Texture<P> = <Owner<P> as OwnerDevice>::Texture;
pub type OwnerLock<P> = <Owner<P> as OwnerDevice>::Lock;
pub type ShaderView<P> = <Owner<P> as OwnerDevice>::ShaderResourceView;
pub type Sampler<P> = <Owner<P> as OwnerDevice>::Sampler;
pub type BlendState<P> = <Owner<P> as OwnerDevice>::BlendState;
pub type Buffer<P> = <Owner<P> as OwnerDevice>::Buffer;
pub type Pipeline<P> = <Owner<P> as OwnerDevice>::Pipeline;
pub type CommandList<P> = <Owner<P> as OwnerDevice>::CommandList;

pub type GuestSurface<P> = <Guest<P> as GuestDevice>::Surface;
pub type GuestLock<P> = <Guest<P> as GuestDevice>::Lock;
pub type RenderTarget<P> = <Guest<P> as GuestDevice>::RenderTarget;
pub type Brush<P> = <Guest<P> as GuestDevice>::Brush;
pub type TextFormat<P> = <Guest<P> as TextDevice>::TextFormat;
