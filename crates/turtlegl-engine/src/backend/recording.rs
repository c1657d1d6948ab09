use std::collections::HashMap;

use crate::error::BackendError;

use super::{
    ArrayHandle, BufferHandle, COLOR_UNIFORM, GraphicsBackend, HandleAlloc, PrimitiveKind,
    ProgramHandle, Vertex, check_attributes, check_range,
};

/// A backend call as observed by [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateBuffer { buffer: BufferHandle, size: u64 },
    WriteBuffer { buffer: BufferHandle, offset: u64, len: u64 },
    ReleaseBuffer(BufferHandle),
    CompileProgram(ProgramHandle),
    SetUniform { program: ProgramHandle, value: [f32; 4] },
    ReleaseProgram(ProgramHandle),
    LineWidth(f32),
    BindArray { array: ArrayHandle, program: ProgramHandle, buffer: BufferHandle },
    ReleaseArray(ArrayHandle),
    Draw { array: ArrayHandle, kind: PrimitiveKind, count: u32 },
}

/// Largest buffer [`RecordingBackend`] allocates by default, matching wgpu's
/// default `max_buffer_size` limit.
pub const DEFAULT_MAX_BUFFER_SIZE: u64 = 1 << 28;

/// Headless backend that keeps buffer contents in memory and logs every call.
///
/// Behaves like a GPU buffer store: allocations are fixed-size, bounded by
/// [`max_buffer_size`](Self::max_buffer_size), and writes outside them fail.
/// Useful for tests and for running turtle programs without a window.
#[derive(Debug)]
pub struct RecordingBackend {
    ids: HandleAlloc,
    max_buffer_size: u64,
    buffers: HashMap<BufferHandle, Vec<u8>>,
    programs: HashMap<ProgramHandle, [f32; 4]>,
    arrays: HashMap<ArrayHandle, (ProgramHandle, BufferHandle)>,
    line_width: f32,
    calls: Vec<Call>,
    frames: u64,
    fail_releases: bool,
    fail_uniforms: bool,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self {
            ids: HandleAlloc::default(),
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            buffers: HashMap::new(),
            programs: HashMap::new(),
            arrays: HashMap::new(),
            line_width: 1.0,
            calls: Vec::new(),
            frames: 0,
            fail_releases: false,
            fail_uniforms: false,
        }
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the size of a single buffer allocation.
    pub fn with_max_buffer_size(mut self, max: u64) -> Self {
        self.max_buffer_size = max;
        self
    }

    pub fn max_buffer_size(&self) -> u64 {
        self.max_buffer_size
    }

    /// Every call since creation (or the last [`clear_calls`](Self::clear_calls)).
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn draw_count(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, Call::Draw { .. })).count()
    }

    pub fn write_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::WriteBuffer { .. }))
            .count()
    }

    /// Number of completed frames.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn line_width(&self) -> f32 {
        self.line_width
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_arrays(&self) -> usize {
        self.arrays.len()
    }

    pub fn uniform(&self, program: ProgramHandle) -> Option<[f32; 4]> {
        self.programs.get(&program).copied()
    }

    /// Decodes the first `count` vertices stored in `buffer`.
    pub fn vertices(&self, buffer: BufferHandle, count: usize) -> Option<Vec<Vertex>> {
        let bytes = self.buffers.get(&buffer)?;
        let len = count.checked_mul(Vertex::STRIDE as usize)?;
        let bytes = bytes.get(..len)?;
        Some(
            bytes
                .chunks_exact(Vertex::STRIDE as usize)
                .map(bytemuck::pod_read_unaligned::<Vertex>)
                .collect(),
        )
    }

    /// Makes every subsequent `release_*` call fail.
    pub fn set_fail_releases(&mut self, fail: bool) {
        self.fail_releases = fail;
    }

    /// Makes every subsequent `set_uniform` call fail.
    pub fn set_fail_uniforms(&mut self, fail: bool) {
        self.fail_uniforms = fail;
    }
}

impl GraphicsBackend for RecordingBackend {
    fn create_buffer(&mut self, size: u64, initial: &[u8]) -> Result<BufferHandle, BackendError> {
        let max = self.max_buffer_size;
        if size > max {
            return Err(BackendError::TooLarge { size, max });
        }
        check_range(0, initial.len() as u64, size)?;
        let len = usize::try_from(size).map_err(|_| BackendError::TooLarge { size, max })?;
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|_| BackendError::TooLarge { size, max })?;
        bytes.resize(len, 0);
        bytes[..initial.len()].copy_from_slice(initial);

        let buffer = BufferHandle(self.ids.next());
        self.buffers.insert(buffer, bytes);
        self.calls.push(Call::CreateBuffer { buffer, size });
        Ok(buffer)
    }

    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        bytes: &[u8],
    ) -> Result<(), BackendError> {
        let store = self
            .buffers
            .get_mut(&buffer)
            .ok_or(BackendError::UnknownBuffer(buffer))?;
        check_range(offset, bytes.len() as u64, store.len() as u64)?;
        let start = offset as usize;
        store[start..start + bytes.len()].copy_from_slice(bytes);
        self.calls.push(Call::WriteBuffer {
            buffer,
            offset,
            len: bytes.len() as u64,
        });
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferHandle) -> Result<(), BackendError> {
        if self.fail_releases || self.buffers.remove(&buffer).is_none() {
            return Err(BackendError::UnknownBuffer(buffer));
        }
        self.calls.push(Call::ReleaseBuffer(buffer));
        Ok(())
    }

    fn compile_program(
        &mut self,
        _vertex_source: &str,
        _fragment_source: &str,
    ) -> Result<ProgramHandle, BackendError> {
        let program = ProgramHandle(self.ids.next());
        self.programs.insert(program, [1.0; 4]);
        self.calls.push(Call::CompileProgram(program));
        Ok(program)
    }

    fn set_uniform(
        &mut self,
        program: ProgramHandle,
        name: &str,
        value: [f32; 4],
    ) -> Result<(), BackendError> {
        if self.fail_uniforms || name != COLOR_UNIFORM {
            return Err(BackendError::UnknownUniform(name.to_string()));
        }
        let slot = self
            .programs
            .get_mut(&program)
            .ok_or(BackendError::UnknownProgram(program))?;
        *slot = value;
        self.calls.push(Call::SetUniform { program, value });
        Ok(())
    }

    fn release_program(&mut self, program: ProgramHandle) -> Result<(), BackendError> {
        if self.fail_releases || self.programs.remove(&program).is_none() {
            return Err(BackendError::UnknownProgram(program));
        }
        self.calls.push(Call::ReleaseProgram(program));
        Ok(())
    }

    fn set_line_width(&mut self, width: f32) {
        self.line_width = width;
        self.calls.push(Call::LineWidth(width));
    }

    fn bind_vertex_array(
        &mut self,
        program: ProgramHandle,
        buffer: BufferHandle,
        attributes: &[&str],
    ) -> Result<ArrayHandle, BackendError> {
        check_attributes(attributes)?;
        if !self.programs.contains_key(&program) {
            return Err(BackendError::UnknownProgram(program));
        }
        if !self.buffers.contains_key(&buffer) {
            return Err(BackendError::UnknownBuffer(buffer));
        }
        let array = ArrayHandle(self.ids.next());
        self.arrays.insert(array, (program, buffer));
        self.calls.push(Call::BindArray { array, program, buffer });
        Ok(array)
    }

    fn release_array(&mut self, array: ArrayHandle) -> Result<(), BackendError> {
        if self.fail_releases || self.arrays.remove(&array).is_none() {
            return Err(BackendError::UnknownArray(array));
        }
        self.calls.push(Call::ReleaseArray(array));
        Ok(())
    }

    fn draw(
        &mut self,
        array: ArrayHandle,
        kind: PrimitiveKind,
        vertex_count: u32,
    ) -> Result<(), BackendError> {
        let (_, buffer) = self
            .arrays
            .get(&array)
            .copied()
            .ok_or(BackendError::UnknownArray(array))?;
        let size = self.buffers.get(&buffer).map_or(0, |b| b.len() as u64);
        check_range(0, vertex_count as u64 * Vertex::STRIDE, size)?;
        self.calls.push(Call::Draw {
            array,
            kind,
            count: vertex_count,
        });
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        self.frames += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_outside_allocation_fail() {
        let mut backend = RecordingBackend::new();
        let buffer = backend.create_buffer(48, &[]).unwrap();
        assert!(backend.write_buffer(buffer, 24, &[0u8; 24]).is_ok());
        assert!(matches!(
            backend.write_buffer(buffer, 32, &[0u8; 24]),
            Err(BackendError::OutOfRange { .. })
        ));
    }

    #[test]
    fn oversized_buffer_is_too_large() {
        let mut backend = RecordingBackend::new().with_max_buffer_size(Vertex::STRIDE * 4);
        assert!(backend.create_buffer(Vertex::STRIDE * 4, &[]).is_ok());
        assert!(matches!(
            backend.create_buffer(Vertex::STRIDE * 5, &[]),
            Err(BackendError::TooLarge { size, max }) if size == Vertex::STRIDE * 5 && max == Vertex::STRIDE * 4
        ));
        assert_eq!(backend.live_buffers(), 1);

        let mut backend = RecordingBackend::new();
        assert!(matches!(
            backend.create_buffer(u32::MAX as u64 * Vertex::STRIDE, &[]),
            Err(BackendError::TooLarge { .. })
        ));
    }

    #[test]
    fn vertices_decode_written_bytes() {
        let mut backend = RecordingBackend::new();
        let v = Vertex::new([0.5, -0.5], [1.0, 0.0, 0.0, 1.0]);
        let buffer = backend
            .create_buffer(Vertex::STRIDE * 4, bytemuck::bytes_of(&v))
            .unwrap();
        assert_eq!(backend.vertices(buffer, 1).unwrap(), vec![v]);
        assert!(backend.vertices(buffer, 5).is_none());
    }

    #[test]
    fn unknown_uniform_is_rejected() {
        let mut backend = RecordingBackend::new();
        let program = backend.compile_program("", "").unwrap();
        assert!(backend.set_uniform(program, "colour", [0.0; 4]).is_err());
        backend.set_uniform(program, COLOR_UNIFORM, [0.5; 4]).unwrap();
        assert_eq!(backend.uniform(program), Some([0.5; 4]));
    }

    #[test]
    fn draw_beyond_buffer_is_rejected() {
        let mut backend = RecordingBackend::new();
        let program = backend.compile_program("", "").unwrap();
        let buffer = backend.create_buffer(Vertex::STRIDE * 2, &[]).unwrap();
        let array = backend
            .bind_vertex_array(program, buffer, &["in_pos", "in_color"])
            .unwrap();
        assert!(backend.draw(array, PrimitiveKind::LineStrip, 2).is_ok());
        assert!(backend.draw(array, PrimitiveKind::LineStrip, 3).is_err());
    }
}
