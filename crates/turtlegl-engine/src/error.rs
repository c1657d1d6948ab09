//! Error types for the turtle engine.

use thiserror::Error;

use crate::backend::{ArrayHandle, BufferHandle, ProgramHandle};
use crate::turtle::TurtleId;

/// Errors surfaced by canvas and turtle operations.
///
/// Buffer overflow is deliberately absent: a full vertex buffer truncates the
/// input, logs, and is reported through [`Append::dropped`](crate::turtle::Append)
/// instead of failing the call.
#[derive(Debug, Error)]
pub enum TurtleError {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid delay: {0} seconds")]
    InvalidDelay(f64),

    #[error("turtle {0} has no GPU resources (released or never set up)")]
    NotInitialized(TurtleId),

    #[error("unknown turtle {0}")]
    UnknownTurtle(TurtleId),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors raised by a [`GraphicsBackend`](crate::backend::GraphicsBackend).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferHandle),

    #[error("unknown program {0:?}")]
    UnknownProgram(ProgramHandle),

    #[error("unknown vertex array {0:?}")]
    UnknownArray(ArrayHandle),

    #[error("unknown uniform `{0}`")]
    UnknownUniform(String),

    #[error("unsupported vertex attributes {found:?}, expected {expected:?}")]
    Attributes {
        found: Vec<String>,
        expected: &'static [&'static str],
    },

    #[error("write of {len} bytes at offset {offset} exceeds buffer size {size}")]
    OutOfRange { offset: u64, len: u64, size: u64 },

    #[error("buffer of {size} bytes exceeds the device limit of {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("surface lost: {0}")]
    Surface(String),
}

pub type Result<T, E = TurtleError> = std::result::Result<T, E>;
