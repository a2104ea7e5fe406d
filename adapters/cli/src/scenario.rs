//! Scenario files and the runner that replays them against the world.

use std::{
    collections::{BTreeMap, VecDeque},
    fmt::Write as _,
    fs,
    path::Path,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use pipeflow_core::{Command, Event, GridPosition, GroupId, NodeId, PieceId, Point};
use pipeflow_rendering::Scene;
use pipeflow_system_builder::{Builder, BuilderInput};
use pipeflow_system_flow_emitter::FlowEmitter;
use pipeflow_world::{self as world, query, World};
use serde::Deserialize;
use tracing::{debug, info};

use crate::manifest::Settings;

/// Ordered list of steps replayed by the runner.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Scenario {
    /// Steps executed in file order.
    #[serde(default, rename = "step")]
    pub(crate) steps: Vec<Step>,
}

/// Single scenario action.
///
/// Groups are referenced by the order in which they were built, starting at
/// zero. Connectors are referenced by the name given when attaching them.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub(crate) enum Step {
    /// Builds one group directly from a batch of polylines.
    Build { paths: Vec<Vec<[f32; 2]>> },
    /// Draws segments through the drafting pen, one build per segment.
    Draw { points: Vec<[f32; 2]> },
    /// Selects a group and deletes it through the drafting system.
    RemoveGroup { group: usize },
    /// Removes the cell containing a point.
    RemoveCell { position: [f32; 2] },
    /// Attaches a named external connector.
    Attach {
        name: String,
        anchor: [f32; 2],
        #[serde(default)]
        points: Vec<[f32; 2]>,
    },
    /// Toggles the source flag of a named connector.
    ToggleSource { connector: String },
    /// Recomputes water from every source.
    Refresh,
    /// Spawns a single walker.
    SpawnFlow {
        group: usize,
        #[serde(default)]
        path: usize,
    },
    /// Toggles continuous flow on a group.
    ToggleFlow { group: usize },
    /// Starts the sequential fill animation.
    StartFill { group: usize },
    /// Stops and drains the fill animation.
    StopFill { group: usize },
    /// Cycles the water tint of a group.
    CycleTint { group: usize },
    /// Removes every group and piece.
    Clear,
    /// Advances simulated time in fixed ticks.
    Tick { seconds: f32 },
}

/// Reads the scenario stored at `path`.
pub(crate) fn load(path: &Path) -> Result<Scenario> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario at {}", path.display()))?;
    parse(&contents).with_context(|| format!("invalid scenario at {}", path.display()))
}

fn parse(contents: &str) -> Result<Scenario> {
    toml::from_str(contents).context("failed to parse scenario toml contents")
}

fn point([x, y]: [f32; 2]) -> Point {
    Point::new(x, y)
}

/// Drives the world and its systems through scenario steps.
#[derive(Debug)]
pub(crate) struct Runner {
    world: World,
    builder: Builder,
    emitter: FlowEmitter,
    tick: Duration,
    groups: Vec<GroupId>,
    connectors: BTreeMap<String, NodeId>,
}

impl Runner {
    /// Creates a runner whose world uses the provided settings.
    pub(crate) fn new(settings: Settings, tick: Duration) -> Self {
        let mut runner = Self {
            world: World::new(),
            builder: Builder::new(),
            emitter: FlowEmitter::new(settings.emitter),
            tick,
            groups: Vec::new(),
            connectors: BTreeMap::new(),
        };
        runner.submit(Command::Configure {
            config: settings.network,
        });
        runner
    }

    /// Replays every step of the scenario in order.
    pub(crate) fn run(&mut self, scenario: &Scenario) -> Result<()> {
        for (index, step) in scenario.steps.iter().enumerate() {
            debug!(index, ?step, "running scenario step");
            self.step(step)
                .with_context(|| format!("step {index} ({step:?}) failed"))?;
        }
        Ok(())
    }

    fn step(&mut self, step: &Step) -> Result<()> {
        match step {
            Step::Build { paths } => {
                let paths = paths
                    .iter()
                    .map(|path| path.iter().copied().map(point).collect())
                    .collect();
                self.submit(Command::BuildBatch { paths });
            }
            Step::Draw { points } => self.draw(points),
            Step::RemoveGroup { group } => {
                let group = self.group(*group)?;
                self.drive_builder(BuilderInput {
                    selected_group: Some(group),
                    delete_selected: true,
                    ..BuilderInput::default()
                });
            }
            Step::RemoveCell { position } => self.submit(Command::RemoveCell {
                position: point(*position),
            }),
            Step::Attach {
                name,
                anchor,
                points,
            } => {
                if self.connectors.contains_key(name) {
                    bail!("connector {name:?} is already attached");
                }
                let points = if points.is_empty() {
                    vec![point(*anchor)]
                } else {
                    points.iter().copied().map(point).collect()
                };
                let events = self.execute(Command::AttachConnector {
                    anchor: point(*anchor),
                    points,
                });
                if let Some(node) = events.iter().find_map(|event| match event {
                    Event::ConnectorAttached { node } => Some(*node),
                    _ => None,
                }) {
                    let _ = self.connectors.insert(name.clone(), node);
                }
            }
            Step::ToggleSource { connector } => {
                let Some(node) = self.connectors.get(connector).copied() else {
                    bail!("unknown connector {connector:?}");
                };
                self.submit(Command::ToggleSource { node });
            }
            Step::Refresh => self.submit(Command::RefreshWater),
            Step::SpawnFlow { group, path } => {
                let group = self.group(*group)?;
                self.submit(Command::SpawnFlow {
                    group,
                    path: *path,
                    start: None,
                });
            }
            Step::ToggleFlow { group } => {
                let group = self.group(*group)?;
                let flowing = self.emitter.toggle(group);
                info!(?group, flowing, "toggled continuous flow");
            }
            Step::StartFill { group } => {
                let group = self.group(*group)?;
                self.submit(Command::StartFill { group });
            }
            Step::StopFill { group } => {
                let group = self.group(*group)?;
                self.submit(Command::StopFill { group });
            }
            Step::CycleTint { group } => {
                let group = self.group(*group)?;
                self.submit(Command::CycleWaterTint { group });
            }
            Step::Clear => self.submit(Command::ClearNetwork),
            Step::Tick { seconds } => {
                if !(seconds.is_finite() && *seconds >= 0.0) {
                    bail!("tick duration must be non-negative (received {seconds})");
                }
                let ticks = (seconds / self.tick.as_secs_f32()).ceil() as u64;
                for _ in 0..ticks {
                    self.submit(Command::Tick { dt: self.tick });
                }
            }
        }
        Ok(())
    }

    fn group(&self, index: usize) -> Result<GroupId> {
        match self.groups.get(index) {
            Some(group) => Ok(*group),
            None => bail!(
                "group index {index} out of range ({} built)",
                self.groups.len()
            ),
        }
    }

    fn draw(&mut self, points: &[[f32; 2]]) {
        if !self.builder.is_drafting() {
            self.drive_builder(BuilderInput {
                toggle_drafting: true,
                ..BuilderInput::default()
            });
        }
        for segment in points.windows(2) {
            for corner in segment {
                self.drive_builder(BuilderInput {
                    place_point: Some(point(*corner)),
                    ..BuilderInput::default()
                });
            }
        }
        self.drive_builder(BuilderInput {
            cancel: true,
            ..BuilderInput::default()
        });
    }

    fn drive_builder(&mut self, input: BuilderInput) {
        let grid_size = query::config(&self.world).grid_size;
        let mut commands = Vec::new();
        self.builder.handle(&[], input, grid_size, &mut commands);
        for command in commands {
            self.submit(command);
        }
    }

    fn submit(&mut self, command: Command) {
        let _ = self.execute(command);
    }

    /// Applies a command plus every follow-up the systems emit, returning the
    /// events of the first command.
    fn execute(&mut self, command: Command) -> Vec<Event> {
        let grid_size = query::config(&self.world).grid_size;
        let mut first = None;
        let mut queue = VecDeque::from([command]);
        while let Some(command) = queue.pop_front() {
            let mut events = Vec::new();
            world::apply(&mut self.world, command, &mut events);
            for event in &events {
                if let Event::GroupBuilt { group, paths } = event {
                    info!(?group, paths, "group built");
                    self.groups.push(*group);
                }
            }

            let mut follow_ups = Vec::new();
            self.builder
                .handle(&events, BuilderInput::default(), grid_size, &mut follow_ups);
            self.emitter
                .handle(&events, &query::groups(&self.world), &mut follow_ups);
            queue.extend(follow_ups);

            if first.is_none() {
                first = Some(events);
            }
        }
        first.unwrap_or_default()
    }

    /// Renders a plain-text summary of the network.
    pub(crate) fn summary(&self) -> String {
        let scene = Scene::from_views(
            &query::piece_view(&self.world),
            &query::connectors(&self.world),
            &query::walker_view(&self.world),
            &query::groups(&self.world),
        );

        let mut out = String::new();
        let _ = writeln!(
            out,
            "tick {} at {:.2}s, {} pieces ({} wet), {} walkers",
            query::tick_index(&self.world),
            query::now(&self.world).as_secs_f32(),
            scene.pieces.len(),
            scene.wet_pieces(),
            scene.walkers.len()
        );
        let cells: BTreeMap<PieceId, GridPosition> = query::piece_view(&self.world)
            .iter()
            .map(|snapshot| (snapshot.id, snapshot.position))
            .collect();
        for piece in &scene.pieces {
            let Some(cell) = cells.get(&piece.piece) else {
                continue;
            };
            let position = cell.to_point();
            let _ = writeln!(
                out,
                "  ({:.2}, {:.2}) {:?} {:.0}deg{}",
                position.x,
                position.y,
                piece.archetype,
                piece.rotation_radians.to_degrees(),
                if piece.water.is_some() { " wet" } else { "" }
            );
        }
        for (name, node) in &self.connectors {
            if let Some(connector) = scene.connectors.iter().find(|scene_node| scene_node.node == *node) {
                let _ = writeln!(
                    out,
                    "  connector {name}: source={} water={}",
                    connector.is_source, connector.has_water
                );
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Runner {
        let scenario = parse(source).expect("scenario parses");
        let mut runner = Runner::new(Settings::default(), Duration::from_millis(50));
        runner.run(&scenario).expect("scenario runs");
        runner
    }

    #[test]
    fn parses_tagged_steps() {
        let scenario = parse(
            r#"
                [[step]]
                action = "build"
                paths = [[[0.0, 0.0], [2.0, 0.0]]]

                [[step]]
                action = "tick"
                seconds = 0.5

                [[step]]
                action = "refresh"
            "#,
        )
        .expect("scenario parses");
        assert_eq!(scenario.steps.len(), 3);
        assert!(matches!(scenario.steps[2], Step::Refresh));
    }

    #[test]
    fn rejects_unknown_actions() {
        assert!(parse("[[step]]\naction = \"explode\"").is_err());
    }

    #[test]
    fn water_reaches_a_built_line_from_a_named_source() {
        let runner = run(r#"
            [[step]]
            action = "build"
            paths = [[[0.0, 0.0], [2.0, 0.0]]]

            [[step]]
            action = "attach"
            name = "tank"
            anchor = [0.5, 0.0]

            [[step]]
            action = "attach"
            name = "pump"
            anchor = [-1.0, 0.0]
            points = [[0.5, 0.0], [-1.0, 0.0]]

            [[step]]
            action = "toggle_source"
            connector = "tank"

            [[step]]
            action = "tick"
            seconds = 2.0
        "#);

        let summary = runner.summary();
        assert!(summary.contains("3 pieces (3 wet)"), "{summary}");
        assert!(summary.contains("connector pump: source=false water=true"), "{summary}");
        assert!(summary.contains("connector tank: source=true water=true"), "{summary}");
    }

    #[test]
    fn drawn_segments_build_one_group_each() {
        let runner = run(r#"
            [[step]]
            action = "draw"
            points = [[0.0, 0.0], [2.0, 0.0], [2.0, 2.0]]
        "#);

        assert_eq!(runner.groups.len(), 2);
        assert!(!runner.builder.is_drafting());
        let summary = runner.summary();
        assert!(summary.contains("(2.00, 0.00) Corner"), "{summary}");
    }

    #[test]
    fn removing_through_the_builder_clears_the_group() {
        let runner = run(r#"
            [[step]]
            action = "build"
            paths = [[[0.0, 0.0], [1.0, 0.0]]]

            [[step]]
            action = "remove_group"
            group = 0
        "#);

        assert!(query::piece_view(&runner.world).is_empty());
        assert_eq!(runner.builder.selected(), None);
    }

    #[test]
    fn continuous_flow_spawns_walkers_on_ticks() {
        let runner = run(r#"
            [[step]]
            action = "build"
            paths = [[[0.0, 0.0], [10.0, 0.0]]]

            [[step]]
            action = "toggle_flow"
            group = 0

            [[step]]
            action = "tick"
            seconds = 1.0
        "#);

        assert_eq!(query::walker_view(&runner.world).len(), 3);
        assert!(runner.summary().starts_with("tick 20 at 1.00s"));
    }

    #[test]
    fn unknown_group_indices_fail_the_step() {
        let scenario = parse(
            r#"
                [[step]]
                action = "start_fill"
                group = 3
            "#,
        )
        .expect("scenario parses");
        let mut runner = Runner::new(Settings::default(), Duration::from_millis(50));
        assert!(runner.run(&scenario).is_err());
    }
}
