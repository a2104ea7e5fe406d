//! Externally supplied configuration consumed by the network.

use std::{f32::consts::FRAC_1_SQRT_2, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Archetype, Point};

const DEFAULT_GRID_SIZE: f32 = 1.0;
const DEFAULT_PIPE_LAYER: &str = "Default";
const DEFAULT_PROPAGATION_DELAY_MS: u64 = 200;
const DEFAULT_FILL_STEP_DELAY_MS: u64 = 2_000;
const DEFAULT_WALKER_SPEED: f32 = 2.0;
const DEFAULT_ARRIVAL_EPSILON: f32 = 0.01;
const DEFAULT_MERGE_TOLERANCE: f32 = 0.01;
const DEFAULT_JUNCTION_TOLERANCE: f32 = 0.2;
const DEFAULT_CONNECTOR_TOLERANCE: f32 = 0.1;

/// Reference visual and placement adjustments for one archetype.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchetypeVisual {
    /// Asset key of the reference visual.
    pub reference: String,
    /// Degrees added to the resolved rotation.
    pub rotation_offset: f32,
    /// Render scale; ignored for straight pieces.
    pub scale: Point,
    /// World-space nudge added to the cell centre; ignored for straight pieces.
    pub offset: Point,
}

impl ArchetypeVisual {
    /// Creates a visual with no adjustments.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            ..Self::default()
        }
    }
}

impl Default for ArchetypeVisual {
    fn default() -> Self {
        Self {
            reference: String::new(),
            rotation_offset: 0.0,
            scale: Point::ONE,
            offset: Point::ZERO,
        }
    }
}

/// Reference visuals keyed by archetype.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchetypeVisuals {
    /// Visual used for straight pieces and dead ends.
    pub straight: Option<ArchetypeVisual>,
    /// Visual used for corner connectors.
    pub corner: Option<ArchetypeVisual>,
    /// Visual used for tee connectors.
    pub tee: Option<ArchetypeVisual>,
    /// Visual used for cross connectors.
    pub cross: Option<ArchetypeVisual>,
}

impl ArchetypeVisuals {
    /// Visuals named after each archetype, without adjustments.
    #[must_use]
    pub fn named() -> Self {
        Self {
            straight: Some(ArchetypeVisual::new("straight")),
            corner: Some(ArchetypeVisual::new("corner")),
            tee: Some(ArchetypeVisual::new("tee")),
            cross: Some(ArchetypeVisual::new("cross")),
        }
    }

    /// Looks up the visual for an archetype; dead ends share the straight entry.
    #[must_use]
    pub fn get(&self, archetype: Archetype) -> Option<&ArchetypeVisual> {
        match archetype {
            Archetype::DeadEnd | Archetype::Straight => self.straight.as_ref(),
            Archetype::Corner => self.corner.as_ref(),
            Archetype::Tee => self.tee.as_ref(),
            Archetype::Cross => self.cross.as_ref(),
        }
    }

    fn iter(&self) -> impl Iterator<Item = (&'static str, &ArchetypeVisual)> {
        [
            ("straight", self.straight.as_ref()),
            ("corner", self.corner.as_ref()),
            ("tee", self.tee.as_ref()),
            ("cross", self.cross.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, visual)| visual.map(|visual| (name, visual)))
    }
}

/// Configuration shared by every network subsystem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Side length of a grid cell in world units.
    pub grid_size: f32,
    /// Collision layer tag applied to pieces and their sub-parts.
    pub pipe_layer: String,
    /// Reference visuals per archetype.
    pub visuals: ArchetypeVisuals,
    /// Delay between a node receiving water and water reaching its neighbours.
    pub propagation_delay_ms: u64,
    /// Delay between consecutive pieces of the fill animation.
    pub fill_step_delay_ms: u64,
    /// Walker speed in world units per second.
    pub walker_speed: f32,
    /// Distance below which a walker counts as arrived.
    pub arrival_epsilon: f32,
    /// Fraction of the first segment a run path is extended backwards.
    pub spawn_offset: f32,
    /// Endpoint distance under which polylines of a batch are spliced.
    pub merge_tolerance: f32,
    /// Distance under which a path start counts as a walker junction.
    pub junction_tolerance: f32,
    /// Distance under which two connection points touch.
    pub connector_tolerance: f32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            pipe_layer: DEFAULT_PIPE_LAYER.to_owned(),
            visuals: ArchetypeVisuals::named(),
            propagation_delay_ms: DEFAULT_PROPAGATION_DELAY_MS,
            fill_step_delay_ms: DEFAULT_FILL_STEP_DELAY_MS,
            walker_speed: DEFAULT_WALKER_SPEED,
            arrival_epsilon: DEFAULT_ARRIVAL_EPSILON,
            spawn_offset: 0.0,
            merge_tolerance: DEFAULT_MERGE_TOLERANCE,
            junction_tolerance: DEFAULT_JUNCTION_TOLERANCE,
            connector_tolerance: DEFAULT_CONNECTOR_TOLERANCE,
        }
    }
}

impl NetworkConfig {
    /// Delay applied before a propagation run spreads to neighbours.
    #[must_use]
    pub const fn propagation_delay(&self) -> Duration {
        Duration::from_millis(self.propagation_delay_ms)
    }

    /// Delay between consecutive fill animation steps.
    #[must_use]
    pub const fn fill_step_delay(&self) -> Duration {
        Duration::from_millis(self.fill_step_delay_ms)
    }

    /// Checks that every numeric field is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.grid_size.is_finite() && self.grid_size > 0.0) {
            return Err(ConfigError::GridSize(self.grid_size));
        }
        if !(self.walker_speed.is_finite() && self.walker_speed >= 0.0) {
            return Err(ConfigError::WalkerSpeed(self.walker_speed));
        }
        if !(self.spawn_offset.is_finite() && (0.0..=1.0).contains(&self.spawn_offset)) {
            return Err(ConfigError::SpawnOffset(self.spawn_offset));
        }

        let tolerances = [
            ("arrival_epsilon", self.arrival_epsilon),
            ("merge_tolerance", self.merge_tolerance),
            ("junction_tolerance", self.junction_tolerance),
            ("connector_tolerance", self.connector_tolerance),
        ];
        for (name, value) in tolerances {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Tolerance { name, value });
            }
        }
        // Openings of unconnected diagonal neighbours sit grid_size/sqrt(2) apart.
        if self.connector_tolerance >= self.grid_size * FRAC_1_SQRT_2 {
            return Err(ConfigError::ConnectorReach {
                tolerance: self.connector_tolerance,
                grid_size: self.grid_size,
            });
        }

        for (name, visual) in self.visuals.iter() {
            let finite = visual.rotation_offset.is_finite()
                && visual.scale.is_finite()
                && visual.offset.is_finite();
            if !finite {
                return Err(ConfigError::Visual { archetype: name });
            }
        }

        Ok(())
    }
}

/// Reasons a configuration may be rejected.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// Grid cells must have a positive, finite size.
    #[error("grid_size must be positive and finite (received {0})")]
    GridSize(f32),
    /// Walkers cannot move backwards or at an undefined speed.
    #[error("walker_speed must be non-negative and finite (received {0})")]
    WalkerSpeed(f32),
    /// The spawn offset is a fraction of the first segment.
    #[error("spawn_offset must lie within 0.0..=1.0 (received {0})")]
    SpawnOffset(f32),
    /// Distance thresholds must be positive.
    #[error("{name} must be positive and finite (received {value})")]
    Tolerance {
        /// Name of the offending field.
        name: &'static str,
        /// Value that failed validation.
        value: f32,
    },
    /// Connector reach would join openings of cells that are not connected.
    #[error(
        "connector_tolerance {tolerance} reaches across cells of grid_size {grid_size}; \
         it must stay below grid_size / sqrt(2)"
    )]
    ConnectorReach {
        /// Configured connector tolerance.
        tolerance: f32,
        /// Configured grid size.
        grid_size: f32,
    },
    /// A visual carried a non-finite adjustment.
    #[error("visual for {archetype} has a non-finite adjustment")]
    Visual {
        /// Name of the archetype whose visual failed validation.
        archetype: &'static str,
    },
}
