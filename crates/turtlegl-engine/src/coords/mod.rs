//! Coordinate types.
//!
//! Two spaces are in play:
//! - logical (turtle) space: pixel-like units, origin at the window center, +Y up
//! - device space: normalized [-1, 1]^2, consumed directly by the vertex shader
//!
//! `Extent` converts between them.

mod extent;
mod vec2;

pub use extent::Extent;
pub use vec2::Vec2;
