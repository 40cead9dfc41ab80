//! Backend-neutral device abstraction.
//!
//! The interop layer talks to two devices on one adapter:
//! - an **owner** device that allocates the shared surface and composites it
//! - a **guest** device that opens the same memory and draws 2D/text into it
//!
//! Backends (`soft`, `d3d11`) implement the traits in [`backend`]; the
//! descriptor types here are shared by all of them.

mod backend;
mod composite;
mod format;
mod lock;
mod registry;
mod text;

pub use backend::{
    AdapterId, DeferredContext, GuestDevice, OwnerDevice, Platform, SharedHandle, SwapChain,
    TextDevice,
};
pub use composite::{CompositeConstants, QuadVertex, FULLSCREEN_QUAD, QUAD_VERTEX_COUNT};
pub use format::{
    BindFlags, BlendDesc, BlendFactor, MiscFlags, PixelFormat, SamplerFilter,
    ShaderResourceViewDesc, TextureDesc,
};
pub use lock::{AcquireStatus, KeyedMutex, LockSide, LockTimeout};
pub use registry::DeviceRegistry;
pub use text::{FontStretch, FontStyle, FontWeight, TextFormatDesc};
