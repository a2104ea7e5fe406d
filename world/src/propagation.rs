//! Source flood-fill over the connector graph.
//!
//! A node's `has_water` flag doubles as the visited marker: a run stops as soon
//! as it reaches a node that is already wet, which keeps loops finite without
//! a separate visited set. Each wet node spreads to its neighbours after the
//! configured propagation delay.

use std::time::Duration;

use pipeflow_core::{Event, NodeId};
use tracing::{debug, trace};

use crate::{schedule::Task, World};

impl World {
    pub(crate) fn toggle_source(&mut self, node: NodeId, out_events: &mut Vec<Event>) {
        let Some(state) = self.connectors.get_mut(node) else {
            debug!(?node, "ignoring toggle of unknown connector");
            return;
        };
        state.is_source = !state.is_source;
        out_events.push(Event::SourceToggled {
            node,
            is_source: state.is_source,
        });
        self.refresh_water(out_events);
    }

    /// Clears every water flag and restarts a run from each source.
    pub(crate) fn refresh_water(&mut self, out_events: &mut Vec<Event>) {
        self.scheduler
            .cancel(|task| matches!(task, Task::Spread { .. }));

        let mut sources = Vec::new();
        for node in self.connectors.iter_mut() {
            if node.has_water {
                node.has_water = false;
                out_events.push(Event::WaterChanged {
                    node: node.id,
                    has_water: false,
                });
            }
            if node.is_source {
                sources.push(node.id);
            }
        }

        debug!(sources = sources.len(), "refreshing water");
        let now = self.scheduler.now();
        for source in sources {
            self.begin_run(source, now, out_events);
        }
    }

    fn begin_run(&mut self, node: NodeId, base: Duration, out_events: &mut Vec<Event>) {
        let Some(state) = self.connectors.get_mut(node) else {
            return;
        };
        if state.has_water {
            return;
        }
        state.has_water = true;
        out_events.push(Event::WaterChanged {
            node,
            has_water: true,
        });
        let due = base.saturating_add(self.config.propagation_delay());
        self.scheduler.schedule_at(due, Task::Spread { node });
    }

    /// Continues a run once its delay elapsed.
    pub(crate) fn spread(&mut self, node: NodeId, due: Duration, out_events: &mut Vec<Event>) {
        let neighbors = self.connectors.neighbors(node);
        trace!(?node, reached = neighbors.len(), "spreading water");
        for neighbor in neighbors {
            self.begin_run(neighbor, due, out_events);
        }
    }
}
