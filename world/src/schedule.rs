//! Deterministic timer queue driven by the simulation clock.

use std::{collections::BTreeMap, time::Duration};

use pipeflow_core::{GroupId, NodeId};

/// Deferred work executed once the clock reaches its due time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Task {
    /// Spreads water from a node to its neighbours.
    Spread { node: NodeId },
    /// Fills the piece at `index` in the group's fill order.
    Fill { group: GroupId, index: usize },
}

/// Tasks ordered by due time, ties broken by scheduling order.
#[derive(Debug, Default)]
pub(crate) struct Scheduler {
    now: Duration,
    sequence: u64,
    queue: BTreeMap<(Duration, u64), Task>,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn now(&self) -> Duration {
        self.now
    }

    pub(crate) fn advance(&mut self, dt: Duration) {
        self.now = self.now.saturating_add(dt);
    }

    pub(crate) fn schedule_at(&mut self, due: Duration, task: Task) {
        let key = (due, self.sequence);
        self.sequence = self.sequence.wrapping_add(1);
        let _ = self.queue.insert(key, task);
    }

    /// Pops the earliest task whose due time has been reached.
    pub(crate) fn pop_due(&mut self) -> Option<(Duration, Task)> {
        let entry = self.queue.first_entry()?;
        if entry.key().0 > self.now {
            return None;
        }
        let ((due, _), task) = entry.remove_entry();
        Some((due, task))
    }

    /// Drops every pending task matching the predicate.
    pub(crate) fn cancel(&mut self, mut predicate: impl FnMut(&Task) -> bool) {
        self.queue.retain(|_, task| !predicate(task));
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    /// Drops every pending task without rewinding the clock.
    pub(crate) fn clear(&mut self) {
        self.queue.clear();
    }
}
