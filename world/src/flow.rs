//! Walkers travelling along group paths.

use std::time::Duration;

use pipeflow_core::{Event, GroupId, Point};
use tracing::{debug, trace};

use crate::{
    walkers::{run_path, Step, Walker},
    World,
};

impl World {
    /// Spawns one walker on a group path.
    ///
    /// The walker starts at `start` when provided, otherwise at the head of
    /// the run path. Unknown groups and empty paths are ignored.
    pub(crate) fn spawn_flow(
        &mut self,
        group: GroupId,
        path: usize,
        start: Option<Point>,
        out_events: &mut Vec<Event>,
    ) {
        let Some(waypoints) = self
            .groups
            .get(group)
            .and_then(|state| state.paths.get(path))
        else {
            debug!(?group, path, "ignoring flow on unknown path");
            return;
        };
        let run = run_path(waypoints, self.config.spawn_offset);
        let Some(head) = run.first().copied() else {
            return;
        };

        let position = start.unwrap_or(head);
        let id = self.walkers.allocate();
        self.walkers
            .insert(Walker::begin_journey(id, group, path, run, position));
        out_events.push(Event::WalkerSpawned {
            walker: id,
            group,
            path,
            position,
        });
    }

    /// Moves every walker and seeds branch walkers at newly reached junctions.
    pub(crate) fn advance_walkers(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        let distance = self.config.walker_speed * dt.as_secs_f32();
        let arrival_epsilon = self.config.arrival_epsilon;
        let junction_tolerance = self.config.junction_tolerance;

        let mut finished = Vec::new();
        let mut branches: Vec<(GroupId, usize)> = Vec::new();
        for walker in self.walkers.iter_mut() {
            let mut budget = distance;
            loop {
                match walker.step(&mut budget, arrival_epsilon) {
                    Step::Moving => break,
                    Step::Finished => {
                        finished.push(walker.id);
                        break;
                    }
                    Step::Arrived { waypoint, position } => {
                        out_events.push(Event::WalkerAdvanced {
                            walker: walker.id,
                            waypoint,
                            position,
                        });
                        let Some(junction) = walker.claim_junction() else {
                            continue;
                        };
                        let Some(group) = self.groups.get(walker.group) else {
                            continue;
                        };
                        for (index, candidate) in group.paths.iter().enumerate() {
                            let starts_here = candidate
                                .first()
                                .is_some_and(|head| head.distance(junction) < junction_tolerance);
                            if starts_here && !walker.follows(index, candidate) {
                                trace!(walker = ?walker.id, path = index, "branching at junction");
                                branches.push((walker.group, index));
                            }
                        }
                    }
                }
            }
        }

        for walker in finished {
            let _ = self.walkers.remove(walker);
            out_events.push(Event::WalkerFinished { walker });
        }
        for (group, path) in branches {
            self.spawn_flow(group, path, None, out_events);
        }
    }

    pub(crate) fn despawn_walkers_of(&mut self, group: GroupId, out_events: &mut Vec<Event>) {
        let doomed: Vec<_> = self
            .walkers
            .iter()
            .filter(|walker| walker.group == group)
            .map(|walker| walker.id)
            .collect();
        for walker in doomed {
            let _ = self.walkers.remove(walker);
            out_events.push(Event::WalkerFinished { walker });
        }
    }
}
