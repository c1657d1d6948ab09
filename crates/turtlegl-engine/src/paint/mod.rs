//! Color model.
//!
//! Turtles carry a straight RGB pen color plus a separate alpha (pen state);
//! both are stamped into each vertex at append time.

pub mod color;

pub use color::{Rgb, Rgba};
