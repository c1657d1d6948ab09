/// Whether the next tick must run the per-frame routine.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum FrameState {
    /// The routine runs on the next tick.
    #[default]
    Dirty,
    /// Ticks only present what is already buffered.
    Clean,
}

/// Dirty/clean flag driving [`Canvas::tick`](super::Canvas::tick).
///
/// Starts `Dirty` so the routine runs at least once.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    state: FrameState,
    redraws: u64,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.state == FrameState::Dirty
    }

    /// Forces the routine to run on the next tick.
    pub fn request_redraw(&mut self) {
        self.state = FrameState::Dirty;
    }

    pub fn mark_clean(&mut self) {
        self.state = FrameState::Clean;
    }

    /// Returns true (and transitions to `Clean`) if the frame was dirty.
    ///
    /// Called before the routine runs, so a redraw requested from inside the
    /// routine is kept for the following tick.
    pub(crate) fn consume(&mut self) -> bool {
        if self.state == FrameState::Clean {
            return false;
        }
        self.state = FrameState::Clean;
        self.redraws += 1;
        true
    }

    /// Number of dirty frames consumed so far.
    pub fn redraws(&self) -> u64 {
        self.redraws
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_dirty() {
        assert_eq!(FrameScheduler::new().state(), FrameState::Dirty);
    }

    #[test]
    fn consume_cleans_once() {
        let mut s = FrameScheduler::new();
        assert!(s.consume());
        assert!(!s.consume());
        assert_eq!(s.state(), FrameState::Clean);
        assert_eq!(s.redraws(), 1);
    }

    #[test]
    fn request_redraw_after_consume_survives() {
        let mut s = FrameScheduler::new();
        assert!(s.consume());
        s.request_redraw();
        assert!(s.is_dirty());
        assert!(s.consume());
    }
}
