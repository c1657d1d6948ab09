use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

use crate::coords::Vec2;
use crate::paint::Rgb;

use super::{Space, TurtleId};

/// A mutating turtle call captured as a value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TurtleOp {
    MoveTo { point: Vec2, color: Option<Rgb> },
    MovePath { points: Vec<[f32; 2]>, space: Space, color: Option<Rgb> },
    SetColor(Rgb),
}

impl TurtleOp {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            TurtleOp::MoveTo { .. } => "move_to",
            TurtleOp::MovePath { .. } => "move_path",
            TurtleOp::SetColor(_) => "set_color",
        }
    }
}

#[derive(Debug)]
pub(crate) struct Deferred {
    pub(crate) fire_at: Duration,
    seq: u64,
    pub(crate) turtle: TurtleId,
    pub(crate) op: TurtleOp,
}

impl Deferred {
    fn key(&self) -> (Duration, u64) {
        (self.fire_at, self.seq)
    }
}

impl PartialEq for Deferred {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Deferred {}

impl PartialOrd for Deferred {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Deferred {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Per-canvas queue of deferred turtle commands, ordered by fire time and
/// then by registration order.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    heap: BinaryHeap<Reverse<Deferred>>,
    next_seq: u64,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, turtle: TurtleId, op: TurtleOp, fire_at: Duration) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Deferred {
            fire_at,
            seq,
            turtle,
            op,
        }));
    }

    /// Pops the earliest command if it is due at `now`.
    pub(crate) fn pop_due(&mut self, now: Duration) -> Option<Deferred> {
        if self.heap.peek()?.0.fire_at > now {
            return None;
        }
        self.heap.pop().map(|Reverse(d)| d)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Fire time of the earliest queued command.
    pub fn next_fire_at(&self) -> Option<Duration> {
        self.heap.peek().map(|Reverse(d)| d.fire_at)
    }

    pub(crate) fn clear(&mut self) -> usize {
        let n = self.heap.len();
        self.heap.clear();
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn set_color(r: f32) -> TurtleOp {
        TurtleOp::SetColor(Rgb::new(r, 0.0, 0.0))
    }

    #[test]
    fn nothing_is_due_before_fire_time() {
        let mut q = DeferredQueue::new();
        q.push(TurtleId(0), set_color(1.0), secs(2.0));
        assert!(q.pop_due(secs(1.999)).is_none());
        assert!(q.pop_due(secs(2.0)).is_some());
        assert!(q.is_empty());
    }

    #[test]
    fn earlier_fire_time_wins_regardless_of_registration() {
        let mut q = DeferredQueue::new();
        q.push(TurtleId(0), set_color(0.1), secs(3.0));
        q.push(TurtleId(1), set_color(0.2), secs(1.0));
        assert_eq!(q.next_fire_at(), Some(secs(1.0)));
        assert_eq!(q.pop_due(secs(5.0)).unwrap().turtle, TurtleId(1));
        assert_eq!(q.pop_due(secs(5.0)).unwrap().turtle, TurtleId(0));
    }

    #[test]
    fn equal_fire_times_keep_registration_order() {
        let mut q = DeferredQueue::new();
        for i in 0..4 {
            q.push(TurtleId(i), set_color(0.0), secs(1.0));
        }
        let order: Vec<_> = std::iter::from_fn(|| q.pop_due(secs(1.0)))
            .map(|d| d.turtle)
            .collect();
        assert_eq!(order, vec![TurtleId(0), TurtleId(1), TurtleId(2), TurtleId(3)]);
    }
}
