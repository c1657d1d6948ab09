//! Canvas: the turtles of one window plus the frame protocol that drives them.
//!
//! Per tick, in order:
//! 1. deferred commands due at `now` are applied
//! 2. if the frame is dirty, it is marked clean and the routine runs
//! 3. accumulated paths of every turtle are flushed (dirty frames only)
//! 4. every turtle is drawn and the frame is handed to the backend
//!
//! Clean ticks only re-present what is already in the vertex buffers.

mod scheduler;

pub use scheduler::{FrameScheduler, FrameState};

use std::time::Duration;

use crate::backend::GraphicsBackend;
use crate::coords::Extent;
use crate::error::{Result, TurtleError};
use crate::turtle::{DeferredQueue, Turtle, TurtleConfig, TurtleId, TurtleMut};

/// Per-frame user routine. Errors are logged and the frame still completes.
pub type Routine<B> = Box<dyn FnMut(&mut Canvas<B>) -> anyhow::Result<()>>;

pub struct Canvas<B: GraphicsBackend> {
    backend: B,
    /// Extent handed to newly created turtles.
    extent: Extent,
    turtles: Vec<Turtle>,
    scheduler: FrameScheduler,
    deferred: DeferredQueue,

    /// Taken out while it runs.
    mainloop: Option<Routine<B>>,
    has_mainloop: bool,

    now: Duration,
    closed: bool,
}

impl<B: GraphicsBackend> Canvas<B> {
    pub fn new(backend: B, extent: Extent) -> Result<Self> {
        if !extent.is_valid() {
            return Err(TurtleError::Configuration(format!(
                "invalid window extent {}x{}",
                extent.width, extent.height
            )));
        }
        Ok(Self {
            backend,
            extent,
            turtles: Vec::new(),
            scheduler: FrameScheduler::new(),
            deferred: DeferredQueue::new(),
            mainloop: None,
            has_mainloop: false,
            now: Duration::ZERO,
            closed: false,
        })
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Updates the extent used by turtles created from now on.
    ///
    /// Existing turtles keep the extent they were created with. Invalid
    /// extents (minimized window) are ignored.
    pub fn set_extent(&mut self, extent: Extent) {
        if !extent.is_valid() {
            log::debug!("ignoring extent {}x{}", extent.width, extent.height);
            return;
        }
        self.extent = extent;
    }

    /// Host time of the current (or last) tick.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // ── turtles ───────────────────────────────────────────────────────────

    pub fn create_turtle(&mut self, config: TurtleConfig) -> Result<TurtleId> {
        if self.closed {
            return Err(TurtleError::Configuration(
                "cannot create a turtle on a closed canvas".into(),
            ));
        }
        let index = u32::try_from(self.turtles.len())
            .map_err(|_| TurtleError::Configuration("too many turtles".into()))?;
        let id = TurtleId(index);

        let turtle = Turtle::create(id, config, self.extent, &mut self.backend)?;
        self.turtles.push(turtle);
        Ok(id)
    }

    /// Mutable handle to one turtle.
    pub fn turtle(&mut self, id: TurtleId) -> Result<TurtleMut<'_, B>> {
        let turtle = self
            .turtles
            .get_mut(id.index())
            .ok_or(TurtleError::UnknownTurtle(id))?;
        Ok(TurtleMut::new(
            turtle,
            &mut self.backend,
            &mut self.deferred,
            self.now,
        ))
    }

    pub fn get(&self, id: TurtleId) -> Option<&Turtle> {
        self.turtles.get(id.index())
    }

    /// Turtles in creation (draw) order.
    pub fn turtles(&self) -> &[Turtle] {
        &self.turtles
    }

    pub fn pending_deferred(&self) -> usize {
        self.deferred.len()
    }

    // ── frame protocol ────────────────────────────────────────────────────

    /// Registers the per-frame routine. Only one may be registered.
    pub fn set_mainloop<F>(&mut self, routine: F) -> Result<()>
    where
        F: FnMut(&mut Canvas<B>) -> anyhow::Result<()> + 'static,
    {
        if self.has_mainloop {
            return Err(TurtleError::Configuration(
                "main loop is already set".into(),
            ));
        }
        self.mainloop = Some(Box::new(routine));
        self.has_mainloop = true;
        Ok(())
    }

    /// Marks the frame dirty so the routine runs on the next tick.
    pub fn request_redraw(&mut self) {
        self.scheduler.request_redraw();
    }

    pub fn frame_state(&self) -> FrameState {
        self.scheduler.state()
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Runs one frame at host time `now`.
    ///
    /// Returns the state the frame was processed in. A dirty frame without a
    /// routine is a configuration error; routine errors are only logged.
    pub fn tick(&mut self, now: Duration) -> Result<FrameState> {
        if self.closed {
            return Err(TurtleError::Configuration("canvas is closed".into()));
        }
        let state = self.scheduler.state();
        if state == FrameState::Dirty && self.mainloop.is_none() {
            return Err(TurtleError::Configuration(
                "frame is dirty but no main loop is set".into(),
            ));
        }

        self.now = now;
        self.backend.begin_frame();
        self.run_deferred();

        if self.scheduler.consume() {
            if let Some(mut routine) = self.mainloop.take() {
                if let Err(err) = routine(self) {
                    log::error!("frame routine failed: {err:#}");
                }
                if self.mainloop.is_none() && !self.closed {
                    self.mainloop = Some(routine);
                }
            }
            self.flush_pending();
        }

        self.present();
        self.backend.end_frame()?;
        Ok(state)
    }

    /// Applies every deferred command due at the current time.
    fn run_deferred(&mut self) -> usize {
        let mut ran = 0;
        while let Some(d) = self.deferred.pop_due(self.now) {
            let name = d.op.name();
            let result = match self.turtles.get_mut(d.turtle.index()) {
                Some(turtle) => turtle.apply(&mut self.backend, d.op),
                None => Err(TurtleError::UnknownTurtle(d.turtle)),
            };
            if let Err(e) = result {
                log::error!("deferred {name} on turtle {} failed: {e}", d.turtle);
            }
            ran += 1;
        }
        if ran > 0 {
            log::trace!("{ran} deferred command(s) applied at {:.3}s", self.now.as_secs_f64());
        }
        ran
    }

    /// Flushes the accumulated path of every live turtle.
    pub fn flush_pending(&mut self) {
        for turtle in self.turtles.iter_mut().filter(|t| t.is_live()) {
            if let Err(e) = turtle.flush_pending(&mut self.backend) {
                log::error!("turtle {}: flushing pending path failed: {e}", turtle.id());
            }
        }
    }

    /// Issues a draw for every live turtle.
    pub fn present(&mut self) {
        for turtle in self.turtles.iter().filter(|t| t.is_live()) {
            if let Err(e) = turtle.draw(&mut self.backend) {
                log::error!("turtle {}: draw failed: {e}", turtle.id());
            }
        }
    }

    /// Releases every turtle's GPU resources and stops the frame protocol.
    ///
    /// Release failures are logged. Outstanding deferred commands are dropped.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        for turtle in &mut self.turtles {
            turtle.release(&mut self.backend);
        }
        let dropped = self.deferred.clear();
        if dropped > 0 {
            log::debug!("dropped {dropped} deferred command(s) on close");
        }
        self.mainloop = None;
        self.closed = true;
        log::debug!("canvas closed ({} turtle(s))", self.turtles.len());
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::backend::{Call, RecordingBackend, Vertex};
    use crate::coords::Vec2;
    use crate::paint::Rgb;
    use crate::turtle::Space;

    fn canvas() -> Canvas<RecordingBackend> {
        Canvas::new(RecordingBackend::new(), Extent::new(500.0, 500.0)).unwrap()
    }

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn stored(canvas: &Canvas<RecordingBackend>, id: TurtleId) -> Vec<Vertex> {
        let t = canvas.get(id).unwrap();
        canvas
            .backend()
            .vertices(t.buffer().unwrap(), t.vertex_count())
            .unwrap()
    }

    fn positions(canvas: &Canvas<RecordingBackend>, id: TurtleId) -> Vec<[f32; 2]> {
        stored(canvas, id).iter().map(|v| v.pos).collect()
    }

    fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
        let c = Rc::new(Cell::new(0));
        (c.clone(), c)
    }

    // ── construction ──────────────────────────────────────────────────────

    #[test]
    fn invalid_extent_is_rejected() {
        assert!(matches!(
            Canvas::new(RecordingBackend::new(), Extent::new(0.0, 10.0)),
            Err(TurtleError::Configuration(_))
        ));
    }

    #[test]
    fn unknown_turtle_is_reported() {
        let mut c = canvas();
        assert!(matches!(
            c.turtle(TurtleId(3)),
            Err(TurtleError::UnknownTurtle(TurtleId(3)))
        ));
    }

    #[test]
    fn extent_is_captured_at_creation() {
        let mut c = canvas();
        let a = c.create_turtle(TurtleConfig::new()).unwrap();
        c.set_extent(Extent::new(1000.0, 1000.0));
        let b = c.create_turtle(TurtleConfig::new()).unwrap();

        c.turtle(a).unwrap().move_to((250.0, 0.0), None).unwrap();
        c.turtle(b).unwrap().move_to((250.0, 0.0), None).unwrap();
        assert_eq!(positions(&c, a)[1], [1.0, 0.0]);
        assert_eq!(positions(&c, b)[1], [0.5, 0.0]);
    }

    // ── scheduler ─────────────────────────────────────────────────────────

    #[test]
    fn dirty_tick_without_routine_is_a_configuration_error() {
        let mut c = canvas();
        assert!(matches!(c.tick(Duration::ZERO), Err(TurtleError::Configuration(_))));
    }

    #[test]
    fn second_mainloop_is_rejected() {
        let mut c = canvas();
        c.set_mainloop(|_| Ok(())).unwrap();
        assert!(matches!(
            c.set_mainloop(|_| Ok(())),
            Err(TurtleError::Configuration(_))
        ));
    }

    #[test]
    fn routine_runs_once_and_clean_ticks_are_idempotent() {
        let mut c = canvas();
        let id = c.create_turtle(TurtleConfig::new()).unwrap();
        let (runs, seen) = counter();
        c.set_mainloop(move |c| {
            seen.set(seen.get() + 1);
            c.turtle(id)?.move_to((100.0, 100.0), None)?;
            Ok(())
        })
        .unwrap();

        assert_eq!(c.tick(secs(0.0)).unwrap(), FrameState::Dirty);
        let after_first = stored(&c, id);
        assert_eq!(after_first.len(), 2);

        c.backend_mut().clear_calls();
        for i in 1..5 {
            assert_eq!(c.tick(secs(i as f64)).unwrap(), FrameState::Clean);
        }
        assert_eq!(runs.get(), 1);
        assert_eq!(stored(&c, id), after_first);
        assert_eq!(c.backend().write_count(), 0);
        assert_eq!(c.backend().draw_count(), 4);
    }

    #[test]
    fn request_redraw_runs_the_routine_again() {
        let mut c = canvas();
        let (runs, seen) = counter();
        c.set_mainloop(move |_| {
            seen.set(seen.get() + 1);
            Ok(())
        })
        .unwrap();

        c.tick(secs(0.0)).unwrap();
        c.tick(secs(0.1)).unwrap();
        c.request_redraw();
        c.tick(secs(0.2)).unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn redraw_requested_inside_routine_runs_next_tick() {
        let mut c = canvas();
        let (runs, seen) = counter();
        c.set_mainloop(move |c| {
            seen.set(seen.get() + 1);
            if seen.get() < 3 {
                c.request_redraw();
            }
            Ok(())
        })
        .unwrap();

        for i in 0..5 {
            c.tick(secs(i as f64)).unwrap();
        }
        assert_eq!(runs.get(), 3);
        assert_eq!(c.frame_state(), FrameState::Clean);
    }

    #[test]
    fn routine_error_still_cleans_the_frame() {
        let mut c = canvas();
        let (runs, seen) = counter();
        c.set_mainloop(move |_| {
            seen.set(seen.get() + 1);
            anyhow::bail!("boom")
        })
        .unwrap();

        assert!(c.tick(secs(0.0)).is_ok());
        assert_eq!(c.frame_state(), FrameState::Clean);
        c.tick(secs(1.0)).unwrap();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn accumulated_points_flush_at_end_of_dirty_frame() {
        let mut c = canvas();
        let id = c.create_turtle(TurtleConfig::new()).unwrap();
        c.set_mainloop(move |c| {
            let mut t = c.turtle(id)?;
            for i in 1..=10 {
                t.accumulate((i as f32, 0.0))?;
            }
            Ok(())
        })
        .unwrap();

        c.tick(secs(0.0)).unwrap();
        let t = c.get(id).unwrap();
        assert_eq!(t.vertex_count(), 11);
        assert_eq!(t.pending_len(), 0);
        assert_eq!(c.backend().write_count(), 1);
    }

    #[test]
    fn every_turtle_is_drawn_each_tick() {
        let mut c = canvas();
        c.create_turtle(TurtleConfig::new()).unwrap();
        c.create_turtle(TurtleConfig::new().color(Rgb::BLUE)).unwrap();
        c.set_mainloop(|_| Ok(())).unwrap();
        c.tick(secs(0.0)).unwrap();

        c.backend_mut().clear_calls();
        c.tick(secs(1.0)).unwrap();
        assert_eq!(c.backend().draw_count(), 2);
        assert_eq!(c.backend().frames(), 2);
    }

    // ── deferred ──────────────────────────────────────────────────────────

    #[test]
    fn deferred_move_appears_only_after_its_fire_time() {
        let mut c = canvas();
        let id = c.create_turtle(TurtleConfig::new()).unwrap();
        c.set_mainloop(|_| Ok(())).unwrap();

        {
            let mut t = c.turtle(id).unwrap();
            t.defer(2.0).unwrap();
            assert!(t.move_to((5.0, 5.0), None).unwrap().is_scheduled());
            t.move_to((1.0, 1.0), None).unwrap();
        }
        let one = 1.0 / 250.0;
        let five = 5.0 / 250.0;
        assert_eq!(positions(&c, id), vec![[0.0, 0.0], [one, one]]);

        c.tick(secs(0.0)).unwrap();
        c.tick(secs(1.999)).unwrap();
        assert_eq!(c.get(id).unwrap().vertex_count(), 2);

        c.tick(secs(2.0)).unwrap();
        assert_eq!(positions(&c, id), vec![[0.0, 0.0], [one, one], [five, five]]);
        assert_eq!(c.get(id).unwrap().position(), Vec2::new(5.0, 5.0));
        assert_eq!(c.pending_deferred(), 0);
    }

    #[test]
    fn deferred_path_fires_with_its_color_and_capacity() {
        let mut c = canvas();
        let id = c
            .create_turtle(TurtleConfig::new().max_vertices(3))
            .unwrap();
        c.set_mainloop(|_| Ok(())).unwrap();

        {
            let mut t = c.turtle(id).unwrap();
            t.defer(1.0).unwrap();
            let path: Vec<[f32; 2]> = vec![[0.5, -0.5], [1.0, 1.0], [0.0, 0.0]];
            assert!(t.move_path(&path, Space::Device, Some(Rgb::BLUE)).unwrap().is_scheduled());
        }
        c.tick(secs(0.5)).unwrap();
        assert_eq!(c.get(id).unwrap().vertex_count(), 1);
        assert_eq!(c.get(id).unwrap().color(), Rgb::RED);

        c.tick(secs(2.0)).unwrap();
        let t = c.get(id).unwrap();
        assert_eq!(t.vertex_count(), 3);
        assert_eq!(t.overflowed(), 1);
        assert_eq!(t.color(), Rgb::BLUE);
        assert_eq!(t.position(), Vec2::new(250.0, 250.0));
        assert_eq!(positions(&c, id)[1..], [[0.5, -0.5], [1.0, 1.0]]);
        assert!(stored(&c, id)[1..].iter().all(|v| v.color == [0.0, 0.0, 1.0, 1.0]));
        assert_eq!(c.pending_deferred(), 0);
    }

    #[test]
    fn deferred_calls_fire_by_time_then_registration() {
        let mut c = canvas();
        let id = c.create_turtle(TurtleConfig::new()).unwrap();
        c.set_mainloop(|_| Ok(())).unwrap();

        {
            let mut t = c.turtle(id).unwrap();
            t.defer(2.0).unwrap();
            t.move_to((2.0, 0.0), None).unwrap();
            t.defer(1.0).unwrap();
            t.move_to((1.0, 0.0), None).unwrap();
            t.defer(1.0).unwrap();
            t.move_to((3.0, 0.0), None).unwrap();
        }
        c.tick(secs(5.0)).unwrap();

        let xs: Vec<f32> = positions(&c, id).iter().map(|p| p[0]).collect();
        assert_eq!(xs, vec![0.0, 1.0 / 250.0, 3.0 / 250.0, 2.0 / 250.0]);
    }

    #[test]
    fn deferred_calls_run_relative_to_registration_time() {
        let mut c = canvas();
        let id = c.create_turtle(TurtleConfig::new()).unwrap();
        c.set_mainloop(move |c| {
            let mut t = c.turtle(id)?;
            t.defer(0.5)?;
            t.set_color(Rgb::GREEN)?;
            Ok(())
        })
        .unwrap();

        c.tick(secs(10.0)).unwrap();
        assert_eq!(c.get(id).unwrap().color(), Rgb::RED);
        c.tick(secs(10.4)).unwrap();
        assert_eq!(c.get(id).unwrap().color(), Rgb::RED);
        c.tick(secs(10.5)).unwrap();
        assert_eq!(c.get(id).unwrap().color(), Rgb::GREEN);
    }

    // ── close ─────────────────────────────────────────────────────────────

    #[test]
    fn close_releases_resources_and_later_ops_fail() {
        let mut c = canvas();
        let id = c.create_turtle(TurtleConfig::new()).unwrap();
        c.create_turtle(TurtleConfig::new()).unwrap();
        {
            let mut t = c.turtle(id).unwrap();
            t.defer(1.0).unwrap();
            t.move_to((1.0, 1.0), None).unwrap();
        }
        assert_eq!(c.backend().live_buffers(), 2);

        c.close();
        assert!(c.is_closed());
        assert_eq!(c.backend().live_buffers(), 0);
        assert_eq!(c.pending_deferred(), 0);
        let released = c
            .backend()
            .calls()
            .iter()
            .filter(|call| matches!(call, Call::ReleaseProgram(_)))
            .count();
        assert_eq!(released, 2);

        assert!(matches!(
            c.turtle(id).unwrap().move_to((1.0, 1.0), None),
            Err(TurtleError::NotInitialized(_))
        ));
        assert!(c.tick(secs(2.0)).is_err());
        assert!(c.create_turtle(TurtleConfig::new()).is_err());
    }

    #[test]
    fn close_survives_release_failures() {
        let mut c = canvas();
        c.create_turtle(TurtleConfig::new()).unwrap();
        c.backend_mut().set_fail_releases(true);
        c.close();
        assert!(c.is_closed());
        assert!(!c.turtles()[0].is_live());
    }
}
