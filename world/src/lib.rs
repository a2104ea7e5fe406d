#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative pipe network state.
//!
//! The world owns the grid index, pieces, groups, connector graph, scheduled
//! tasks and walkers. Every mutation goes through [`apply`]; read access goes
//! through the [`query`] module.

use std::collections::BTreeMap;

use pipeflow_core::{Command, Event, GridPosition, GroupId, NetworkConfig};
use tracing::{debug, warn};

mod connectors;
mod fill;
mod flow;
mod grid;
mod network;
mod pieces;
mod propagation;
mod schedule;
mod walkers;

use connectors::ConnectorGraph;
use grid::GridIndex;
use network::GroupRegistry;
use pieces::PieceRegistry;
use schedule::{Scheduler, Task};
use walkers::WalkerRegistry;

/// Represents the authoritative pipe network simulation.
#[derive(Debug)]
pub struct World {
    config: NetworkConfig,
    grid: GridIndex,
    owners: BTreeMap<GridPosition, GroupId>,
    pieces: PieceRegistry,
    groups: GroupRegistry,
    connectors: ConnectorGraph,
    scheduler: Scheduler,
    walkers: WalkerRegistry,
    tick_index: u64,
}

impl World {
    /// Creates an empty network using the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(NetworkConfig::default())
    }

    fn with_config(config: NetworkConfig) -> Self {
        Self {
            grid: GridIndex::new(config.grid_size),
            owners: BTreeMap::new(),
            pieces: PieceRegistry::new(),
            groups: GroupRegistry::new(),
            connectors: ConnectorGraph::new(config.connector_tolerance),
            scheduler: Scheduler::new(),
            walkers: WalkerRegistry::new(),
            tick_index: 0,
            config,
        }
    }

    fn run_due_tasks(&mut self, out_events: &mut Vec<Event>) {
        while let Some((due, task)) = self.scheduler.pop_due() {
            match task {
                Task::Spread { node } => self.spread(node, due, out_events),
                Task::Fill { group, index } => self.fill_step(group, index, due, out_events),
            }
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Configure { config } => {
            if let Err(error) = config.validate() {
                warn!(%error, "rejecting network configuration");
                return;
            }
            *world = World::with_config(config);
            out_events.push(Event::ConfigApplied);
        }
        Command::Tick { dt } => {
            world.tick_index = world.tick_index.saturating_add(1);
            out_events.push(Event::TimeAdvanced { dt });
            world.scheduler.advance(dt);
            world.run_due_tasks(out_events);
            world.advance_walkers(dt, out_events);
        }
        Command::BuildBatch { paths } => world.build_batch(paths, out_events),
        Command::RemoveGroup { group } => world.remove_group(group, out_events),
        Command::RemoveCell { position } => {
            world.remove_cell(GridPosition::from_point(position), out_events);
        }
        Command::ClearNetwork => world.clear_network(out_events),
        Command::AttachConnector { anchor, points } => {
            let node = world.connectors.attach(anchor, points, None);
            out_events.push(Event::ConnectorAttached { node });
        }
        Command::DetachConnector { node } => {
            if world
                .connectors
                .get(node)
                .map_or(true, |state| state.piece.is_some())
            {
                debug!(?node, "only external connectors can be detached");
                return;
            }
            world
                .scheduler
                .cancel(|task| matches!(task, Task::Spread { node: pending } if *pending == node));
            let _ = world.connectors.detach(node);
            out_events.push(Event::ConnectorDetached { node });
        }
        Command::ToggleSource { node } => world.toggle_source(node, out_events),
        Command::RefreshWater => world.refresh_water(out_events),
        Command::SpawnFlow { group, path, start } => {
            world.spawn_flow(group, path, start, out_events);
        }
        Command::StartFill { group } => world.start_fill(group),
        Command::StopFill { group } => world.stop_fill(group, out_events),
        Command::CycleWaterTint { group } => {
            if let Some(state) = world.groups.get_mut(group) {
                state.tint = state.tint.next();
                out_events.push(Event::WaterTintChanged {
                    group,
                    tint: state.tint,
                });
            }
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use super::World;
    use pipeflow_core::{
        ConnectionMask, ConnectorSnapshot, GridPosition, GroupId, GroupSnapshot, NetworkConfig,
        NodeId, PieceView, WalkerSnapshot,
    };

    /// Configuration the world is currently running with.
    #[must_use]
    pub fn config(world: &World) -> &NetworkConfig {
        &world.config
    }

    /// Simulated time elapsed since the last configuration.
    #[must_use]
    pub fn now(world: &World) -> Duration {
        world.scheduler.now()
    }

    /// Number of ticks processed since the last configuration.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Connection mask stored for a cell; empty when absent.
    #[must_use]
    pub fn mask_at(world: &World, position: GridPosition) -> ConnectionMask {
        world.grid.mask_at(position)
    }

    /// Every present cell with its mask, ordered by position.
    #[must_use]
    pub fn masks(world: &World) -> Vec<(GridPosition, ConnectionMask)> {
        world.grid.iter().collect()
    }

    /// Captures a read-only view of the instantiated pieces.
    #[must_use]
    pub fn piece_view(world: &World) -> PieceView {
        let layer = world.config.pipe_layer.as_str();
        PieceView::from_snapshots(
            world
                .pieces
                .iter()
                .map(|piece| piece.snapshot(layer))
                .collect(),
        )
    }

    /// Group that owns the cell, if any.
    #[must_use]
    pub fn group_at(world: &World, position: GridPosition) -> Option<GroupId> {
        world.owners.get(&position).copied()
    }

    /// Captures a snapshot of a single group.
    #[must_use]
    pub fn group(world: &World, group: GroupId) -> Option<GroupSnapshot> {
        world.groups.get(group).map(|state| state.snapshot())
    }

    /// Captures snapshots of every group ordered by identifier.
    #[must_use]
    pub fn groups(world: &World) -> Vec<GroupSnapshot> {
        world.groups.iter().map(|state| state.snapshot()).collect()
    }

    /// Connector node owned by the piece at the cell.
    #[must_use]
    pub fn node_at(world: &World, position: GridPosition) -> Option<NodeId> {
        world.pieces.at(position).map(|piece| piece.node)
    }

    /// Captures a snapshot of a single connector node.
    #[must_use]
    pub fn connector(world: &World, node: NodeId) -> Option<ConnectorSnapshot> {
        world.connectors.get(node).map(|state| state.snapshot())
    }

    /// Captures snapshots of every connector node ordered by identifier.
    #[must_use]
    pub fn connectors(world: &World) -> Vec<ConnectorSnapshot> {
        world.connectors.iter().map(|state| state.snapshot()).collect()
    }

    /// Captures snapshots of every walker ordered by identifier.
    #[must_use]
    pub fn walker_view(world: &World) -> Vec<WalkerSnapshot> {
        world.walkers.iter().map(|walker| walker.snapshot()).collect()
    }

    /// Number of scheduled tasks still waiting for their due time.
    #[must_use]
    pub fn pending_tasks(world: &World) -> usize {
        world.scheduler.len()
    }
}
