//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and the single turtle window, and ticks its
//! canvas once per redraw.

mod app;
mod runtime;

pub use app::TurtleApp;
pub use runtime::{Runtime, RuntimeConfig};
