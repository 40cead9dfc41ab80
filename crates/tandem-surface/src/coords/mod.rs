//! Geometry shared by the interop layer and its backends.
//!
//! Everything here is in physical pixels of the shared surface:
//! - origin top-left
//! - +X right, +Y down
//!
//! Backends convert to NDC when recording the composite pass.

mod rect;
mod vec2;
mod viewport;

pub use rect::{PixelSpan, Rect};
pub use vec2::Vec2;
pub use viewport::Viewport;
