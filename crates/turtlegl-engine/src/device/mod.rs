//! GPU device + surface management.
//!
//! Creates the wgpu Instance/Adapter/Device/Queue for one window, keeps the
//! surface configured across resizes, and hands out per-frame encoders.

mod gpu;
mod init;

pub use gpu::{Gpu, GpuFrame};
pub use init::GpuInit;
