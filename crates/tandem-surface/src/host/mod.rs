//! Host-side composition.
//!
//! A [`HostWindow`] pairs one [`WindowBackend`] with one [`RenderBackend`]
//! and routes window events between them. [`InteropRenderer`] is the render
//! backend driving an owner swap chain plus a [`TextSurface`](crate::interop::TextSurface).

mod backend;
mod renderer;
mod window;

pub use backend::{HostControl, RenderBackend, WindowBackend, WindowEvent};
pub use renderer::{GuestPass, InteropRenderer};
pub use window::HostWindow;
