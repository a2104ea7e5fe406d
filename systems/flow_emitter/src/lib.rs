#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Continuous flow system that periodically spawns walkers on toggled groups.

use std::{collections::BTreeMap, time::Duration};

use pipeflow_core::{Command, Event, GroupId, GroupSnapshot};

const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Configuration parameters required to construct the flow emitter.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    interval: Duration,
}

impl Config {
    /// Creates a new configuration using the provided spawn cadence.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

#[derive(Clone, Copy, Debug)]
struct Emitter {
    accumulator: Duration,
    primed: bool,
}

/// Pure system that emits one walker per interval for every flowing group.
#[derive(Debug)]
pub struct FlowEmitter {
    interval: Duration,
    emitters: BTreeMap<GroupId, Emitter>,
}

impl FlowEmitter {
    /// Creates a new flow emitter using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            interval: config.interval,
            emitters: BTreeMap::new(),
        }
    }

    /// Flips the flowing state of a group and reports the new state.
    ///
    /// A group that starts flowing spawns on the next call to [`Self::handle`].
    pub fn toggle(&mut self, group: GroupId) -> bool {
        if self.emitters.remove(&group).is_some() {
            return false;
        }
        let _ = self.emitters.insert(
            group,
            Emitter {
                accumulator: Duration::ZERO,
                primed: true,
            },
        );
        true
    }

    /// Reports whether the group is currently flowing.
    #[must_use]
    pub fn is_flowing(&self, group: GroupId) -> bool {
        self.emitters.contains_key(&group)
    }

    /// Consumes events and group snapshots to emit spawn commands.
    pub fn handle(&mut self, events: &[Event], groups: &[GroupSnapshot], out: &mut Vec<Command>) {
        let mut accumulated = Duration::ZERO;
        for event in events {
            match event {
                Event::TimeAdvanced { dt } => accumulated = accumulated.saturating_add(*dt),
                Event::GroupRemoved { group } => {
                    let _ = self.emitters.remove(group);
                }
                Event::NetworkCleared | Event::ConfigApplied => self.emitters.clear(),
                _ => {}
            }
        }

        let interval = self.interval;
        self.emitters.retain(|group, emitter| {
            let Some(snapshot) = groups.iter().find(|snapshot| snapshot.id == *group) else {
                return false;
            };
            let Some(path) = snapshot.paths.iter().position(|path| !path.is_empty()) else {
                return true;
            };

            let mut spawns = usize::from(emitter.primed);
            emitter.primed = false;
            if !interval.is_zero() {
                emitter.accumulator = emitter.accumulator.saturating_add(accumulated);
                while emitter.accumulator >= interval {
                    emitter.accumulator -= interval;
                    spawns += 1;
                }
            }

            for _ in 0..spawns {
                out.push(Command::SpawnFlow {
                    group: *group,
                    path,
                    start: None,
                });
            }
            true
        });
    }
}
