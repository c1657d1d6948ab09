//! Graphics backend seam.
//!
//! The turtle engine never touches wgpu directly. Everything it needs from the
//! GPU layer goes through [`GraphicsBackend`]:
//! - fixed-size vertex buffers with sub-range writes
//! - one line program with a `color` uniform
//! - vertex-array binding and a draw call parameterized by primitive kind
//!
//! [`WgpuBackend`] renders to a window surface; [`RecordingBackend`] keeps
//! everything in memory for headless use and tests.

mod recording;
mod vertex;
mod wgpu_backend;

pub use recording::{Call, DEFAULT_MAX_BUFFER_SIZE, RecordingBackend};
pub use vertex::{VERTEX_ATTRIBUTES, Vertex};
pub use wgpu_backend::WgpuBackend;

use crate::error::BackendError;

/// WGSL source of the line program (vertex entry `vs_main`, fragment entry `fs_main`).
pub const LINE_SHADER: &str = include_str!("shaders/line.wgsl");

/// Name of the tint uniform exposed by the line program.
pub const COLOR_UNIFORM: &str = "color";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub(crate) u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub(crate) u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrayHandle(pub(crate) u32);

/// Primitive assembly mode for a draw call.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// Consecutive vertices joined by line segments.
    #[default]
    LineStrip,
    /// Each vertex drawn as a single point.
    Points,
}

/// GPU operations required by the turtle engine.
///
/// All calls happen on the thread that drives the frame tick. Implementations
/// are free to batch draws until [`end_frame`](Self::end_frame).
pub trait GraphicsBackend {
    /// Allocates a buffer of `size` bytes and writes `initial` at offset 0.
    fn create_buffer(&mut self, size: u64, initial: &[u8]) -> Result<BufferHandle, BackendError>;

    /// Writes `bytes` at `offset`. The buffer never grows; out-of-range writes fail.
    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        bytes: &[u8],
    ) -> Result<(), BackendError>;

    fn release_buffer(&mut self, buffer: BufferHandle) -> Result<(), BackendError>;

    fn compile_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramHandle, BackendError>;

    /// Sets a named `vec4` uniform. Only [`COLOR_UNIFORM`] is defined.
    fn set_uniform(
        &mut self,
        program: ProgramHandle,
        name: &str,
        value: [f32; 4],
    ) -> Result<(), BackendError>;

    fn release_program(&mut self, program: ProgramHandle) -> Result<(), BackendError>;

    /// Sets the rasterized line width for subsequent draws.
    fn set_line_width(&mut self, width: f32);

    /// Binds `buffer` as the vertex source of `program`.
    ///
    /// `attributes` must name the [`Vertex`] fields in order ([`VERTEX_ATTRIBUTES`]).
    fn bind_vertex_array(
        &mut self,
        program: ProgramHandle,
        buffer: BufferHandle,
        attributes: &[&str],
    ) -> Result<ArrayHandle, BackendError>;

    fn release_array(&mut self, array: ArrayHandle) -> Result<(), BackendError>;

    /// Draws the first `vertex_count` vertices of `array`.
    fn draw(
        &mut self,
        array: ArrayHandle,
        kind: PrimitiveKind,
        vertex_count: u32,
    ) -> Result<(), BackendError>;

    /// Starts a new frame; draws issued before this call are discarded.
    fn begin_frame(&mut self) {}

    /// Presents the draws issued since [`begin_frame`](Self::begin_frame).
    fn end_frame(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Monotonic handle counter shared by backend implementations.
#[derive(Debug, Default)]
pub(crate) struct HandleAlloc {
    next: u32,
}

impl HandleAlloc {
    pub(crate) fn next(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }
}

pub(crate) fn check_attributes(attributes: &[&str]) -> Result<(), BackendError> {
    if attributes == VERTEX_ATTRIBUTES {
        return Ok(());
    }
    Err(BackendError::Attributes {
        found: attributes.iter().map(|a| a.to_string()).collect(),
        expected: VERTEX_ATTRIBUTES,
    })
}

pub(crate) fn check_range(offset: u64, len: u64, size: u64) -> Result<(), BackendError> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(BackendError::OutOfRange { offset, len, size }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_must_match_vertex_layout() {
        assert!(check_attributes(&["in_pos", "in_color"]).is_ok());
        assert!(check_attributes(&["in_pos"]).is_err());
        assert!(check_attributes(&["in_color", "in_pos"]).is_err());
    }

    #[test]
    fn range_check_is_inclusive_of_end() {
        assert!(check_range(0, 24, 24).is_ok());
        assert!(check_range(24, 1, 24).is_err());
        assert!(check_range(u64::MAX, 2, 24).is_err());
    }

    #[test]
    fn vertex_stride_is_six_floats() {
        assert_eq!(Vertex::STRIDE, 24);
    }
}
