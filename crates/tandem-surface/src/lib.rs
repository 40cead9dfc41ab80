//! Tandem surface crate.
//!
//! Lets a guest 2D/text backend draw into a texture that an owner 3D backend
//! composites onto its swap chain, with a keyed mutex handing the surface
//! back and forth between the two devices.

pub mod device;
pub mod error;
pub mod host;
pub mod interop;

pub mod coords;
pub mod logging;
pub mod paint;

pub mod soft;

#[cfg(windows)]
pub mod d3d11;

pub use error::{InteropError, Result, ResultCode};
