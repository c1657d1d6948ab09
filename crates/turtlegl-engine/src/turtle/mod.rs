//! Path buffer engine.
//!
//! Each turtle owns one fixed-capacity GPU vertex buffer, allocated once at
//! creation and written in sub-ranges `[count, count + n)`. The buffer is
//! never reallocated: appends beyond capacity are dropped and counted.
//!
//! Vertex 0 is the creation-time position, so every turtle always has a
//! drawable line strip. Color and alpha are stamped per vertex at append time.

mod deferred;
mod handle;
mod path;

pub use deferred::DeferredQueue;
pub use handle::TurtleMut;
pub use path::{PathData, Space};

pub(crate) use deferred::TurtleOp;

use std::fmt;
use std::time::Duration;

use crate::backend::{
    ArrayHandle, BufferHandle, COLOR_UNIFORM, GraphicsBackend, LINE_SHADER, PrimitiveKind,
    ProgramHandle, VERTEX_ATTRIBUTES, Vertex,
};
use crate::coords::{Extent, Vec2};
use crate::error::{Result, TurtleError};
use crate::paint::{Rgb, Rgba};

/// Default vertex capacity for [`TurtleConfig`].
pub const DEFAULT_MAX_VERTICES: usize = 65_536;

/// Identifier of a turtle within its canvas. Insertion order is draw order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurtleId(pub(crate) u32);

impl TurtleId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TurtleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Creation parameters for a turtle.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TurtleConfig {
    pub color: Rgb,
    /// Initial position in logical coordinates; becomes vertex 0.
    pub position: Vec2,
    /// Fixed vertex capacity, including vertex 0. Must be at least 1.
    pub max_vertices: usize,
}

impl TurtleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }

    pub fn position(mut self, position: impl Into<Vec2>) -> Self {
        self.position = position.into();
        self
    }

    pub fn max_vertices(mut self, max_vertices: usize) -> Self {
        self.max_vertices = max_vertices;
        self
    }
}

impl Default for TurtleConfig {
    fn default() -> Self {
        Self {
            color: Rgb::RED,
            position: Vec2::zero(),
            max_vertices: DEFAULT_MAX_VERTICES,
        }
    }
}

/// Result of an applied append.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Append {
    /// Points written to the vertex buffer.
    pub accepted: usize,
    /// Points dropped because the buffer was full.
    pub dropped: usize,
}

impl Append {
    #[inline]
    pub fn overflowed(&self) -> bool {
        self.dropped > 0
    }
}

/// Outcome of a mutating turtle call.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Dispatch {
    /// Applied synchronously.
    Applied(Append),
    /// Queued behind a [`defer`](TurtleMut::defer); runs at the first tick at
    /// or after `fire_at` on the canvas clock.
    Scheduled { fire_at: Duration },
}

impl Dispatch {
    pub fn append(&self) -> Option<Append> {
        match self {
            Dispatch::Applied(a) => Some(*a),
            Dispatch::Scheduled { .. } => None,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self, Dispatch::Scheduled { .. })
    }
}

#[derive(Debug, Copy, Clone)]
struct TurtleGpu {
    buffer: BufferHandle,
    program: ProgramHandle,
    array: ArrayHandle,
}

/// One path-drawing cursor and its vertex buffer.
///
/// Read access is public; mutation goes through [`TurtleMut`], which carries
/// the backend and the deferred-command queue.
#[derive(Debug)]
pub struct Turtle {
    id: TurtleId,
    position: Vec2,
    color: Rgb,
    alpha: f32,
    tint: Rgba,
    line_width: f32,
    render_mode: PrimitiveKind,

    /// Captured at creation; never re-queried.
    extent: Extent,
    capacity: usize,

    /// CPU mirror of `[0, count)` of the GPU buffer.
    vertices: Vec<Vertex>,
    pending_path: Vec<[f32; 2]>,
    pending_delay: Option<Duration>,

    overflowed: u64,
    warned_overflow: bool,

    gpu: Option<TurtleGpu>,
}

impl Turtle {
    /// Allocates GPU resources and writes vertex 0.
    pub(crate) fn create<B: GraphicsBackend>(
        id: TurtleId,
        config: TurtleConfig,
        extent: Extent,
        backend: &mut B,
    ) -> Result<Self> {
        if config.max_vertices == 0 || config.max_vertices > u32::MAX as usize {
            return Err(TurtleError::Configuration(format!(
                "max_vertices must be in 1..={}, got {}",
                u32::MAX,
                config.max_vertices
            )));
        }
        if !extent.is_valid() {
            return Err(TurtleError::Configuration(format!(
                "cannot create a turtle on a {}x{} window",
                extent.width, extent.height
            )));
        }
        if !config.position.is_finite() {
            return Err(TurtleError::InvalidGeometry(format!(
                "initial position is not finite: {:?}",
                config.position
            )));
        }

        let alpha = 1.0;
        let origin = Vertex::new(
            extent.to_device(config.position).to_array(),
            config.color.with_alpha(alpha),
        );
        let size = config.max_vertices as u64 * Vertex::STRIDE;

        let program = backend.compile_program(LINE_SHADER, LINE_SHADER)?;
        let buffer = match backend.create_buffer(size, bytemuck::bytes_of(&origin)) {
            Ok(buffer) => buffer,
            Err(e) => {
                discard(backend, program, None, None);
                return Err(e.into());
            }
        };
        let array = match backend.bind_vertex_array(program, buffer, VERTEX_ATTRIBUTES) {
            Ok(array) => array,
            Err(e) => {
                discard(backend, program, Some(buffer), None);
                return Err(e.into());
            }
        };
        let tint = Rgba::white();
        if let Err(e) = backend.set_uniform(program, COLOR_UNIFORM, tint.to_array()) {
            discard(backend, program, Some(buffer), Some(array));
            return Err(e.into());
        }

        log::debug!(
            "turtle {id} created at {:?} with capacity {}",
            config.position,
            config.max_vertices
        );

        let mut vertices = Vec::with_capacity(config.max_vertices.min(1024));
        vertices.push(origin);

        Ok(Self {
            id,
            position: config.position,
            color: config.color,
            alpha,
            tint,
            line_width: 1.0,
            render_mode: PrimitiveKind::LineStrip,
            extent,
            capacity: config.max_vertices,
            vertices,
            pending_path: Vec::new(),
            pending_delay: None,
            overflowed: 0,
            warned_overflow: false,
            gpu: Some(TurtleGpu {
                buffer,
                program,
                array,
            }),
        })
    }

    // ── read access ───────────────────────────────────────────────────────

    pub fn id(&self) -> TurtleId {
        self.id
    }

    /// Current logical position (last accepted point).
    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    /// 1.0 with the pen down, 0.0 with the pen up.
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn is_pen_down(&self) -> bool {
        self.alpha > 0.0
    }

    pub fn tint(&self) -> Rgba {
        self.tint
    }

    pub fn line_width(&self) -> f32 {
        self.line_width
    }

    pub fn render_mode(&self) -> PrimitiveKind {
        self.render_mode
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.vertices.len()
    }

    /// Device-space vertices `[0, count)`.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn pending_len(&self) -> usize {
        self.pending_path.len()
    }

    pub fn pending_delay(&self) -> Option<Duration> {
        self.pending_delay
    }

    /// Total number of points dropped because the buffer was full.
    pub fn overflowed(&self) -> u64 {
        self.overflowed
    }

    /// False once GPU resources have been released.
    pub fn is_live(&self) -> bool {
        self.gpu.is_some()
    }

    /// GPU buffer backing this turtle, while live.
    pub fn buffer(&self) -> Option<BufferHandle> {
        self.gpu.map(|g| g.buffer)
    }

    pub fn program(&self) -> Option<ProgramHandle> {
        self.gpu.map(|g| g.program)
    }

    // ── engine internals ──────────────────────────────────────────────────

    fn live(&self) -> Result<TurtleGpu> {
        self.gpu.ok_or(TurtleError::NotInitialized(self.id))
    }

    fn note_overflow(&mut self, dropped: usize) {
        self.overflowed += dropped as u64;
        if !self.warned_overflow {
            log::warn!(
                "turtle {}: vertex buffer full ({} vertices), dropped {dropped} point(s)",
                self.id,
                self.capacity
            );
            self.warned_overflow = true;
        } else {
            log::debug!("turtle {}: dropped {dropped} point(s)", self.id);
        }
    }

    /// Applies a captured operation immediately.
    pub(crate) fn apply<B: GraphicsBackend>(&mut self, backend: &mut B, op: TurtleOp) -> Result<Append> {
        match op {
            TurtleOp::MoveTo { point, color } => {
                if let Some(color) = color {
                    self.color = color;
                }
                self.append_point(backend, point)
            }
            TurtleOp::MovePath {
                points,
                space,
                color,
            } => {
                if let Some(color) = color {
                    self.color = color;
                }
                self.append_path(backend, &points, space)
            }
            TurtleOp::SetColor(color) => {
                self.color = color;
                Ok(Append::default())
            }
        }
    }

    /// Writes one vertex at `count` and redraws.
    pub(crate) fn append_point<B: GraphicsBackend>(&mut self, backend: &mut B, point: Vec2) -> Result<Append> {
        let gpu = self.live()?;
        if self.remaining() == 0 {
            self.note_overflow(1);
            return Ok(Append {
                accepted: 0,
                dropped: 1,
            });
        }

        let vertex = Vertex::new(
            self.extent.to_device(point).to_array(),
            self.color.with_alpha(self.alpha),
        );
        let offset = self.vertices.len() as u64 * Vertex::STRIDE;
        backend.write_buffer(gpu.buffer, offset, bytemuck::bytes_of(&vertex))?;

        self.vertices.push(vertex);
        self.position = point;
        self.draw(backend)?;

        Ok(Append {
            accepted: 1,
            dropped: 0,
        })
    }

    /// Writes the fitting prefix of `points` in one buffer write and one draw.
    pub(crate) fn append_path<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        points: &[[f32; 2]],
        space: Space,
    ) -> Result<Append> {
        let gpu = self.live()?;
        let accepted = points.len().min(self.remaining());
        let dropped = points.len() - accepted;
        if dropped > 0 {
            self.note_overflow(dropped);
        }
        if accepted == 0 {
            return Ok(Append { accepted, dropped });
        }

        let points = &points[..accepted];
        let color = self.color.with_alpha(self.alpha);
        let start = self.vertices.len();

        match space {
            Space::Logical => {
                let half = self.extent.half();
                self.vertices.extend(
                    points
                        .iter()
                        .map(|&[x, y]| Vertex::new([x / half.x, y / half.y], color)),
                );
            }
            Space::Device => {
                self.vertices
                    .extend(points.iter().map(|&pos| Vertex::new(pos, color)));
            }
        }

        let offset = start as u64 * Vertex::STRIDE;
        if let Err(err) = backend.write_buffer(
            gpu.buffer,
            offset,
            bytemuck::cast_slice(&self.vertices[start..]),
        ) {
            self.vertices.truncate(start);
            return Err(err.into());
        }

        let last = Vec2::from(points[accepted - 1]);
        self.position = match space {
            Space::Logical => last,
            Space::Device => self.extent.to_logical(last),
        };
        self.draw(backend)?;

        Ok(Append { accepted, dropped })
    }

    /// Queues a logical point for the end-of-frame flush.
    pub(crate) fn accumulate(&mut self, point: Vec2) -> Result<()> {
        self.live()?;
        if !point.is_finite() {
            return Err(TurtleError::InvalidGeometry(format!(
                "point is not finite: {point:?}"
            )));
        }
        self.pending_path.push(point.to_array());
        Ok(())
    }

    /// Appends the pending path as one logical batch, stamped with the
    /// current color/alpha, and clears it.
    pub(crate) fn flush_pending<B: GraphicsBackend>(&mut self, backend: &mut B) -> Result<Option<Append>> {
        if self.pending_path.is_empty() {
            return Ok(None);
        }
        let points = std::mem::take(&mut self.pending_path);
        self.append_path(backend, &points, Space::Logical).map(Some)
    }

    /// Re-issues the draw for `[0, count)` without touching the buffer.
    pub(crate) fn draw<B: GraphicsBackend>(&self, backend: &mut B) -> Result<()> {
        let gpu = self.live()?;
        backend.set_line_width(self.line_width);
        backend.draw(gpu.array, self.render_mode, self.vertices.len() as u32)?;
        Ok(())
    }

    pub(crate) fn set_tint<B: GraphicsBackend>(&mut self, backend: &mut B, tint: Rgba) -> Result<()> {
        let gpu = self.live()?;
        backend.set_uniform(gpu.program, COLOR_UNIFORM, tint.to_array())?;
        self.tint = tint;
        Ok(())
    }

    /// Releases GPU resources. Failures are logged, not propagated.
    pub(crate) fn release<B: GraphicsBackend>(&mut self, backend: &mut B) {
        let Some(gpu) = self.gpu.take() else { return };

        if let Err(e) = backend.release_array(gpu.array) {
            log::warn!("turtle {}: failed to release vertex array: {e}", self.id);
        }
        if let Err(e) = backend.release_buffer(gpu.buffer) {
            log::warn!("turtle {}: failed to release vertex buffer: {e}", self.id);
        }
        if let Err(e) = backend.release_program(gpu.program) {
            log::warn!("turtle {}: failed to release program: {e}", self.id);
        }
        self.pending_path.clear();
        log::debug!("turtle {} released", self.id);
    }
}

/// Releases whatever a failed [`Turtle::create`] managed to allocate.
fn discard<B: GraphicsBackend>(
    backend: &mut B,
    program: ProgramHandle,
    buffer: Option<BufferHandle>,
    array: Option<ArrayHandle>,
) {
    if let Some(array) = array {
        let _ = backend.release_array(array);
    }
    if let Some(buffer) = buffer {
        let _ = backend.release_buffer(buffer);
    }
    let _ = backend.release_program(program);
}
