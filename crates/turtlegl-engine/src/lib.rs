//! Turtle graphics on a GPU line-strip pipeline.
//!
//! Each turtle owns a fixed-capacity vertex buffer that is filled by
//! incremental sub-range writes and drawn as one line strip. A canvas groups
//! the turtles of one window and runs a dirty/clean frame protocol: the user
//! routine runs only on dirty frames, clean frames re-present what is
//! already buffered.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`turtle`] | `Turtle`, `TurtleMut`, paths, deferred commands |
//! | [`canvas`] | `Canvas`, `FrameScheduler` |
//! | [`backend`] | `GraphicsBackend` seam, wgpu and headless recording backends |
//! | [`window`] | `winit` runtime and the `TurtleApp` builder |

pub mod backend;
pub mod canvas;
pub mod coords;
pub mod device;
pub mod error;
pub mod logging;
pub mod paint;
pub mod time;
pub mod turtle;
pub mod window;

pub use backend::{GraphicsBackend, PrimitiveKind, RecordingBackend, WgpuBackend};
pub use canvas::{Canvas, FrameState};
pub use coords::{Extent, Vec2};
pub use error::{BackendError, Result, TurtleError};
pub use paint::{Rgb, Rgba};
pub use turtle::{Append, Dispatch, PathData, Space, TurtleConfig, TurtleId, TurtleMut};
pub use window::TurtleApp;
