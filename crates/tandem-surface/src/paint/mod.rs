//! Color model shared by both sides of the surface.
//!
//! Everything the guest draws and everything the owner composites is linear
//! premultiplied alpha; texel storage converts at the edges.

pub mod color;

pub use color::Color;
