#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the pipeflow engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired network mutations, the world executes those commands via
//! its `apply` entry point, and then broadcasts [`Event`] values for systems to
//! react to deterministically. Systems consume event streams, query immutable
//! snapshots, and respond exclusively with new command batches.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod config;
pub mod shape;

pub use config::{ArchetypeVisual, ArchetypeVisuals, ConfigError, NetworkConfig};
pub use glam::Vec2 as Point;
pub use shape::{resolve, Archetype, DrawTier, Shape};

/// Number of quantization steps per world unit applied to grid positions.
pub const QUANTIZATION_STEPS: f64 = 100_000.0;

/// Commands that express all permissible network mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Replaces the active configuration and clears the network.
    Configure {
        /// Configuration that should become active.
        config: NetworkConfig,
    },
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Builds one network group out of a batch of user-drawn polylines.
    BuildBatch {
        /// Polylines expressed in world units, in drawing order.
        paths: Vec<Vec<Point>>,
    },
    /// Removes a previously built group together with every cell it owns.
    RemoveGroup {
        /// Identifier of the group targeted for removal.
        group: GroupId,
    },
    /// Removes the single cell located at the provided position.
    RemoveCell {
        /// World-space position of the cell; quantized before lookup.
        position: Point,
    },
    /// Removes every group, piece, connector, walker and scheduled task.
    ClearNetwork,
    /// Registers an external connector node such as a tank or a pump.
    AttachConnector {
        /// Position that anchors the connector.
        anchor: Point,
        /// Connection points used for proximity neighbour lookup.
        points: Vec<Point>,
    },
    /// Removes an external connector node.
    DetachConnector {
        /// Identifier of the connector node to detach.
        node: NodeId,
    },
    /// Flips the source flag of a connector node and refreshes water.
    ToggleSource {
        /// Identifier of the connector node to toggle.
        node: NodeId,
    },
    /// Recomputes which connector nodes carry water.
    RefreshWater,
    /// Spawns one walker on a path owned by a group.
    SpawnFlow {
        /// Group that owns the path.
        group: GroupId,
        /// Index of the path inside the group.
        path: usize,
        /// Initial walker position; `None` starts at the head of the run path.
        start: Option<Point>,
    },
    /// Starts the sequential per-piece fill animation of a group.
    StartFill {
        /// Group whose pieces should fill.
        group: GroupId,
    },
    /// Stops the fill animation of a group and drains its pieces.
    StopFill {
        /// Group whose pieces should drain.
        group: GroupId,
    },
    /// Advances the water tint of a group to the next variant.
    CycleWaterTint {
        /// Group whose tint should change.
        group: GroupId,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Confirms that a configuration replaced the previous one.
    ConfigApplied,
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that a batch produced a new network group.
    GroupBuilt {
        /// Identifier allocated to the group.
        group: GroupId,
        /// Number of merged paths owned by the group.
        paths: usize,
    },
    /// Confirms that a group and its cells were removed.
    GroupRemoved {
        /// Identifier of the removed group.
        group: GroupId,
    },
    /// Announces that a piece was instantiated at a cell.
    PiecePlaced {
        /// Identifier allocated to the piece.
        piece: PieceId,
        /// Group that owns the piece.
        group: GroupId,
        /// Cell occupied by the piece.
        position: GridPosition,
        /// Shape class of the piece.
        archetype: Archetype,
        /// Rotation in degrees including the configured rotation offset.
        rotation: f32,
    },
    /// Announces that a piece was destroyed.
    PieceRemoved {
        /// Identifier of the destroyed piece.
        piece: PieceId,
        /// Cell the piece occupied.
        position: GridPosition,
    },
    /// Reports that a resolved shape had no configured visual.
    VisualMissing {
        /// Cell that was left without a piece.
        position: GridPosition,
        /// Archetype that lacked a visual.
        archetype: Archetype,
    },
    /// Confirms that a connector node joined the graph.
    ConnectorAttached {
        /// Identifier allocated to the node.
        node: NodeId,
    },
    /// Confirms that a connector node left the graph.
    ConnectorDetached {
        /// Identifier of the removed node.
        node: NodeId,
    },
    /// Reports the new source flag of a toggled node.
    SourceToggled {
        /// Identifier of the toggled node.
        node: NodeId,
        /// Source flag after toggling.
        is_source: bool,
    },
    /// Reports that a connector node gained or lost water.
    WaterChanged {
        /// Identifier of the node whose state changed.
        node: NodeId,
        /// Water flag after the change.
        has_water: bool,
    },
    /// Confirms that a walker began its journey.
    WalkerSpawned {
        /// Identifier allocated to the walker.
        walker: WalkerId,
        /// Group whose path the walker follows.
        group: GroupId,
        /// Index of the followed path inside the group.
        path: usize,
        /// Position of the walker before motion starts.
        position: Point,
    },
    /// Reports that a walker reached a waypoint.
    WalkerAdvanced {
        /// Identifier of the walker.
        walker: WalkerId,
        /// Index of the reached waypoint within the run path.
        waypoint: usize,
        /// Position of the walker on arrival.
        position: Point,
    },
    /// Reports that a walker left the simulation.
    WalkerFinished {
        /// Identifier of the walker.
        walker: WalkerId,
    },
    /// Reports that the fill animation reached another piece.
    FillStepped {
        /// Group being filled.
        group: GroupId,
        /// Piece that became filled.
        piece: PieceId,
        /// Position of the piece in the fill order.
        index: usize,
    },
    /// Reports that a fill animation was stopped and drained.
    FillStopped {
        /// Group that was drained.
        group: GroupId,
    },
    /// Reports the new tint of a group's water.
    WaterTintChanged {
        /// Group whose tint changed.
        group: GroupId,
        /// Tint after the change.
        tint: WaterTint,
    },
    /// Confirms that the whole network was cleared.
    NetworkCleared,
}

/// Axis directions leaving a grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Toward increasing x.
    Right,
    /// Toward increasing y.
    Up,
    /// Toward decreasing x.
    Left,
    /// Toward decreasing y.
    Down,
}

impl Direction {
    /// Every direction in mask bit order.
    pub const ALL: [Direction; 4] = [
        Direction::Right,
        Direction::Up,
        Direction::Left,
        Direction::Down,
    ];

    /// Mask bit representing the direction.
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::Right => 1,
            Self::Up => 2,
            Self::Left => 4,
            Self::Down => 8,
        }
    }

    /// Direction pointing the opposite way.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Right => Self::Left,
            Self::Up => Self::Down,
            Self::Left => Self::Right,
            Self::Down => Self::Up,
        }
    }

    /// Unit vector pointing along the direction.
    #[must_use]
    pub const fn unit(self) -> Point {
        match self {
            Self::Right => Point::new(1.0, 0.0),
            Self::Up => Point::new(0.0, 1.0),
            Self::Left => Point::new(-1.0, 0.0),
            Self::Down => Point::new(0.0, -1.0),
        }
    }

    /// Classifies a displacement into the dominant axis direction.
    ///
    /// The displacement is normalized first; a component must exceed one half
    /// to count, so diagonal or zero displacements yield `None`.
    #[must_use]
    pub fn from_delta(delta: Point) -> Option<Self> {
        let dir = delta.normalize_or_zero();
        if dir.x > 0.5 {
            Some(Self::Right)
        } else if dir.y > 0.5 {
            Some(Self::Up)
        } else if dir.x < -0.5 {
            Some(Self::Left)
        } else if dir.y < -0.5 {
            Some(Self::Down)
        } else {
            None
        }
    }
}

/// Four-bit record of the directions a cell connects toward.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ConnectionMask(u8);

impl ConnectionMask {
    /// Mask without any connection.
    pub const EMPTY: Self = Self(0);

    /// Creates a mask containing the provided directions.
    #[must_use]
    pub fn from_directions(directions: &[Direction]) -> Self {
        directions
            .iter()
            .fold(Self::EMPTY, |mask, direction| mask.with(*direction))
    }

    /// Raw bit representation.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns a copy with the direction set.
    #[must_use]
    pub const fn with(self, direction: Direction) -> Self {
        Self(self.0 | direction.bit())
    }

    /// Returns a copy with the direction cleared.
    #[must_use]
    pub const fn without(self, direction: Direction) -> Self {
        Self(self.0 & !direction.bit())
    }

    /// Reports whether the direction is set.
    #[must_use]
    pub const fn contains(self, direction: Direction) -> bool {
        self.0 & direction.bit() != 0
    }

    /// Number of connected directions.
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Reports whether no direction is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the set directions in bit order.
    pub fn directions(self) -> impl Iterator<Item = Direction> {
        Direction::ALL
            .into_iter()
            .filter(move |direction| self.contains(*direction))
    }
}

/// World position quantized to a fixed precision so it can key hash maps.
///
/// Coordinates are rounded to `1 / QUANTIZATION_STEPS` world units, which
/// absorbs the floating drift accumulated by visual placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    x: i64,
    y: i64,
}

impl GridPosition {
    /// Quantizes a world-space point.
    #[must_use]
    pub fn from_point(point: Point) -> Self {
        Self {
            x: quantize(point.x),
            y: quantize(point.y),
        }
    }

    /// Converts the position back into world space.
    #[must_use]
    pub fn to_point(self) -> Point {
        Point::new(
            (self.x as f64 / QUANTIZATION_STEPS) as f32,
            (self.y as f64 / QUANTIZATION_STEPS) as f32,
        )
    }

    /// Position one grid step away in the provided direction.
    #[must_use]
    pub fn step(self, direction: Direction, grid_size: f32) -> Self {
        Self::from_point(self.to_point() + direction.unit() * grid_size)
    }

    /// Axis-neighbour positions paired with the direction leading to them.
    #[must_use]
    pub fn neighbors(self, grid_size: f32) -> [(Direction, GridPosition); 4] {
        Direction::ALL.map(|direction| (direction, self.step(direction, grid_size)))
    }
}

fn quantize(value: f32) -> i64 {
    (f64::from(value) * QUANTIZATION_STEPS).round() as i64
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(u32);

        impl $name {
            /// Creates a new identifier with the provided numeric value.
            #[must_use]
            pub const fn new(value: u32) -> Self {
                Self(value)
            }

            /// Retrieves the numeric representation of the identifier.
            #[must_use]
            pub const fn get(&self) -> u32 {
                self.0
            }

            /// Identifier that follows this one.
            #[must_use]
            pub const fn next(&self) -> Self {
                Self(self.0.wrapping_add(1))
            }
        }
    };
}

numeric_id!(
    /// Unique identifier assigned to a network group.
    GroupId
);
numeric_id!(
    /// Unique identifier assigned to an instantiated piece.
    PieceId
);
numeric_id!(
    /// Unique identifier assigned to a connector node.
    NodeId
);
numeric_id!(
    /// Unique identifier assigned to a walker token.
    WalkerId
);

/// Colour variant of the water carried by a group.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum WaterTint {
    /// Fresh water.
    #[default]
    Clean,
    /// Waste water.
    Dirty,
    /// Chemically treated water.
    Chemical,
}

impl WaterTint {
    /// Tint that follows this one in the cycle.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Clean => Self::Dirty,
            Self::Dirty => Self::Chemical,
            Self::Chemical => Self::Clean,
        }
    }
}

/// Immutable representation of a single piece used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct PieceSnapshot {
    /// Identifier allocated to the piece.
    pub id: PieceId,
    /// Group that owns the piece.
    pub group: GroupId,
    /// Cell occupied by the piece.
    pub position: GridPosition,
    /// Connection mask the piece was resolved from.
    pub mask: ConnectionMask,
    /// Shape class of the piece.
    pub archetype: Archetype,
    /// Rotation in degrees including the configured rotation offset.
    pub rotation: f32,
    /// Render scale; always one for straight pieces.
    pub scale: Point,
    /// World-space translation after applying the configured nudge.
    pub translation: Point,
    /// Draw-order tier of the piece.
    pub tier: DrawTier,
    /// Collision layer tag shared by the piece and its sub-parts.
    pub layer: String,
    /// Reference visual configured for the archetype.
    pub visual: String,
    /// Connector node owned by the piece.
    pub node: NodeId,
    /// Indicates whether the fill animation reached the piece.
    pub filled: bool,
}

/// Read-only snapshot describing all pieces within the network.
#[derive(Clone, Debug, Default)]
pub struct PieceView {
    snapshots: Vec<PieceSnapshot>,
}

impl PieceView {
    /// Creates a new piece view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<PieceSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured piece snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &PieceSnapshot> {
        self.snapshots.iter()
    }

    /// Finds the piece occupying the provided cell.
    #[must_use]
    pub fn at(&self, position: GridPosition) -> Option<&PieceSnapshot> {
        self.snapshots
            .iter()
            .find(|snapshot| snapshot.position == position)
    }

    /// Number of captured pieces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view contains no pieces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<PieceSnapshot> {
        self.snapshots
    }
}

/// Immutable representation of a connector node used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectorSnapshot {
    /// Identifier allocated to the node.
    pub id: NodeId,
    /// Position anchoring the node.
    pub anchor: Point,
    /// Piece owning the node, `None` for external connectors.
    pub piece: Option<PieceId>,
    /// Indicates whether the node currently feeds water.
    pub is_source: bool,
    /// Indicates whether water reached the node.
    pub has_water: bool,
}

/// Immutable representation of a walker used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct WalkerSnapshot {
    /// Identifier allocated to the walker.
    pub id: WalkerId,
    /// Group whose path the walker follows.
    pub group: GroupId,
    /// Index of the followed path inside the group.
    pub path: usize,
    /// Current world-space position.
    pub position: Point,
    /// Heading in degrees, measured counter-clockwise from +x.
    pub heading: f32,
    /// Index of the waypoint the walker is heading toward.
    pub target_index: usize,
    /// Fixed signed offset along the segment normal.
    pub lateral_offset: f32,
    /// Fixed signed offset along the segment direction.
    pub forward_offset: f32,
}

/// Immutable representation of a network group used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupSnapshot {
    /// Identifier allocated to the group.
    pub id: GroupId,
    /// Merged paths owned by the group.
    pub paths: Vec<Vec<Point>>,
    /// Pieces owned by the group in creation order.
    pub pieces: Vec<PieceId>,
    /// Tint of the water carried by the group.
    pub tint: WaterTint,
}
