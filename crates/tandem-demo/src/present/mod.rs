//! Puts soft swap-chain frames on screen through a wgpu surface.
//!
//! The soft backend renders on the CPU; each presented frame is uploaded
//! straight into the window's surface texture.

mod config;
mod context;
mod error;
mod surface;

pub use config::PresentConfig;
pub use context::Presenter;
pub use error::SurfaceErrorAction;
