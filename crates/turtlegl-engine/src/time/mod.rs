//! Time subsystem.
//!
//! One `FrameClock` per window; `tick()` once per presented frame. The
//! `elapsed` field of each `FrameTime` drives deferred turtle commands.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
