use std::ops::Deref;
use std::time::Duration;

use crate::backend::{GraphicsBackend, PrimitiveKind};
use crate::coords::Vec2;
use crate::error::{Result, TurtleError};
use crate::paint::{Rgb, Rgba};

use super::{Append, Dispatch, PathData, Space, Turtle, TurtleOp};
use super::deferred::DeferredQueue;

/// Mutable access to one turtle for the duration of a borrow of its canvas.
///
/// Carries the backend, the canvas-wide deferred queue and the current host
/// time so that every call can either apply immediately or be scheduled.
pub struct TurtleMut<'a, B: GraphicsBackend> {
    turtle: &'a mut Turtle,
    backend: &'a mut B,
    deferred: &'a mut DeferredQueue,
    now: Duration,
}

impl<'a, B: GraphicsBackend> TurtleMut<'a, B> {
    pub(crate) fn new(
        turtle: &'a mut Turtle,
        backend: &'a mut B,
        deferred: &'a mut DeferredQueue,
        now: Duration,
    ) -> Self {
        Self {
            turtle,
            backend,
            deferred,
            now,
        }
    }

    /// Consumes a pending [`defer`](Self::defer), returning the fire time.
    fn take_schedule(&mut self) -> Option<Duration> {
        self.turtle
            .pending_delay
            .take()
            .map(|delay| self.now.saturating_add(delay))
    }

    fn schedule(&mut self, op: TurtleOp, fire_at: Duration) -> Dispatch {
        log::debug!(
            "turtle {}: {} deferred until {:.3}s",
            self.turtle.id,
            op.name(),
            fire_at.as_secs_f64()
        );
        self.deferred.push(self.turtle.id, op, fire_at);
        Dispatch::Scheduled { fire_at }
    }

    // ── path ──────────────────────────────────────────────────────────────

    /// Appends one logical point to the strip and redraws.
    ///
    /// `color`, when given, becomes the pen color for this and later vertices.
    /// A full buffer drops the point and reports it in [`Append::dropped`](super::Append).
    pub fn move_to(&mut self, point: impl Into<Vec2>, color: Option<Rgb>) -> Result<Dispatch> {
        let point = point.into();
        self.turtle.live()?;
        if !point.is_finite() {
            return Err(TurtleError::InvalidGeometry(format!(
                "point is not finite: {point:?}"
            )));
        }

        let op = TurtleOp::MoveTo { point, color };
        if let Some(fire_at) = self.take_schedule() {
            return Ok(self.schedule(op, fire_at));
        }
        self.turtle.apply(self.backend, op).map(Dispatch::Applied)
    }

    /// Appends a batch of points with one buffer write and one draw.
    ///
    /// With [`Space::Device`] the points are stored verbatim; the caller is
    /// responsible for them being in `[-1, 1]^2` and finite.
    pub fn move_path<'p>(
        &mut self,
        path: impl Into<PathData<'p>>,
        space: Space,
        color: Option<Rgb>,
    ) -> Result<Dispatch> {
        self.turtle.live()?;
        let points = path.into().points(space)?;

        if let Some(fire_at) = self.take_schedule() {
            let op = TurtleOp::MovePath {
                points: points.to_vec(),
                space,
                color,
            };
            return Ok(self.schedule(op, fire_at));
        }

        if let Some(color) = color {
            self.turtle.color = color;
        }
        self.turtle
            .append_path(self.backend, points, space)
            .map(Dispatch::Applied)
    }

    /// Queues a logical point for the end-of-frame flush. Touches no GPU state.
    pub fn accumulate(&mut self, point: impl Into<Vec2>) -> Result<()> {
        self.turtle.accumulate(point.into())
    }

    /// Appends everything accumulated so far as one batch.
    ///
    /// Ignores any pending delay. Returns `None` if nothing was accumulated.
    pub fn flush_pending(&mut self) -> Result<Option<Append>> {
        self.turtle.flush_pending(self.backend)
    }

    // ── pen ───────────────────────────────────────────────────────────────

    /// Changes the pen color for vertices appended from now on.
    pub fn set_color(&mut self, color: impl Into<Rgb>) -> Result<Dispatch> {
        self.turtle.live()?;
        let op = TurtleOp::SetColor(color.into());
        if let Some(fire_at) = self.take_schedule() {
            return Ok(self.schedule(op, fire_at));
        }
        self.turtle.apply(self.backend, op).map(Dispatch::Applied)
    }

    /// Later vertices are fully transparent.
    pub fn pen_up(&mut self) {
        self.turtle.alpha = 0.0;
    }

    /// Later vertices are fully opaque.
    pub fn pen_down(&mut self) {
        self.turtle.alpha = 1.0;
    }

    /// Defers the next `move_to`, `move_path` or `set_color` by `seconds`.
    ///
    /// Calling it again before a mutating call replaces the delay.
    pub fn defer(&mut self, seconds: f64) -> Result<()> {
        if !(seconds.is_finite() && seconds >= 0.0) {
            return Err(TurtleError::InvalidDelay(seconds));
        }
        let delay =
            Duration::try_from_secs_f64(seconds).map_err(|_| TurtleError::InvalidDelay(seconds))?;
        self.turtle.pending_delay = Some(delay);
        Ok(())
    }

    // ── appearance ────────────────────────────────────────────────────────

    /// Sets the program tint; applies retroactively to every vertex.
    pub fn set_tint(&mut self, tint: Rgba) -> Result<()> {
        if !tint.is_finite() {
            return Err(TurtleError::InvalidGeometry(format!(
                "tint is not finite: {tint:?}"
            )));
        }
        self.turtle.set_tint(self.backend, tint)
    }

    pub fn set_line_width(&mut self, width: f32) -> Result<()> {
        if !(width.is_finite() && width > 0.0) {
            return Err(TurtleError::InvalidGeometry(format!(
                "line width must be positive, got {width}"
            )));
        }
        self.turtle.line_width = width;
        Ok(())
    }

    pub fn set_render_mode(&mut self, mode: PrimitiveKind) {
        self.turtle.render_mode = mode;
    }

    /// Re-issues the draw for the whole strip without changing it.
    pub fn present(&mut self) -> Result<()> {
        self.turtle.draw(self.backend)
    }
}

impl<B: GraphicsBackend> Deref for TurtleMut<'_, B> {
    type Target = Turtle;

    fn deref(&self) -> &Turtle {
        self.turtle
    }
}
