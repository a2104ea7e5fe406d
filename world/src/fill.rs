//! Sequential per-piece fill animation of a group.

use std::time::Duration;

use pipeflow_core::{Event, GroupId};
use tracing::debug;

use crate::{schedule::Task, World};

impl World {
    /// Drains the group and schedules the first fill step immediately.
    pub(crate) fn start_fill(&mut self, group: GroupId) {
        if self.groups.get(group).is_none() {
            debug!(?group, "ignoring fill of unknown group");
            return;
        }
        self.drain(group);
        let now = self.scheduler.now();
        self.scheduler.schedule_at(now, Task::Fill { group, index: 0 });
    }

    pub(crate) fn stop_fill(&mut self, group: GroupId, out_events: &mut Vec<Event>) {
        if self.groups.get(group).is_none() {
            return;
        }
        self.drain(group);
        out_events.push(Event::FillStopped { group });
    }

    /// Marks the piece at `index` as filled and queues the next one.
    pub(crate) fn fill_step(
        &mut self,
        group: GroupId,
        index: usize,
        due: Duration,
        out_events: &mut Vec<Event>,
    ) {
        let Some(piece) = self
            .groups
            .get(group)
            .and_then(|state| state.pieces.get(index).copied())
        else {
            return;
        };
        if let Some(state) = self.pieces.get_mut(piece) {
            state.filled = true;
        }
        out_events.push(Event::FillStepped {
            group,
            piece,
            index,
        });

        let next = due.saturating_add(self.config.fill_step_delay());
        self.scheduler.schedule_at(
            next,
            Task::Fill {
                group,
                index: index + 1,
            },
        );
    }

    fn drain(&mut self, group: GroupId) {
        self.scheduler
            .cancel(|task| matches!(task, Task::Fill { group: pending, .. } if *pending == group));
        let Some(state) = self.groups.get(group) else {
            return;
        };
        for piece in &state.pieces {
            if let Some(piece) = self.pieces.get_mut(*piece) {
                piece.filled = false;
            }
        }
    }
}
