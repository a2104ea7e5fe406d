#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for pipeflow adapters.
//!
//! A [`Scene`] is assembled from world snapshots and carries everything a
//! renderer or physics layer needs per piece: transform, draw tier, collision
//! layer and the colour of any water inside it.

use std::collections::BTreeMap;

use glam::Vec2;
use pipeflow_core::{
    Archetype, ConnectorSnapshot, DrawTier, GroupId, GroupSnapshot, NodeId, PieceId, PieceView,
    WalkerId, WalkerSnapshot, WaterTint,
};

/// RGBA color used when presenting frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red channel intensity in the range 0.0..=1.0.
    pub red: f32,
    /// Green channel intensity in the range 0.0..=1.0.
    pub green: f32,
    /// Blue channel intensity in the range 0.0..=1.0.
    pub blue: f32,
    /// Alpha channel intensity in the range 0.0..=1.0.
    pub alpha: f32,
}

impl Color {
    /// Opaque white, used for pipes without water.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    /// Creates a new color from floating point channels.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Creates an opaque color from floating point channels.
    #[must_use]
    pub const fn opaque(red: f32, green: f32, blue: f32) -> Self {
        Self::new(red, green, blue, 1.0)
    }
}

/// Colour of water carrying the provided tint.
#[must_use]
pub const fn tint_color(tint: WaterTint) -> Color {
    match tint {
        WaterTint::Clean => Color::opaque(0.5, 0.8, 1.0),
        WaterTint::Dirty => Color::opaque(0.45, 0.3, 0.15),
        WaterTint::Chemical => Color::opaque(0.6, 0.85, 0.6),
    }
}

/// Presentation of a single pipe piece.
#[derive(Clone, Debug, PartialEq)]
pub struct ScenePiece {
    /// Identifier of the presented piece.
    pub piece: PieceId,
    /// Shape class of the piece.
    pub archetype: Archetype,
    /// Reference visual to draw.
    pub visual: String,
    /// World-space translation of the piece.
    pub translation: Vec2,
    /// Rotation around the piece centre, counter-clockwise.
    pub rotation_radians: f32,
    /// Render scale.
    pub scale: Vec2,
    /// Draw-order tier.
    pub tier: DrawTier,
    /// Collision layer applied to the piece and its connector.
    pub layer: String,
    /// Colour of the water inside the piece, `None` when dry.
    pub water: Option<Color>,
}

impl ScenePiece {
    /// Colour the piece body should be tinted with.
    #[must_use]
    pub fn fill_color(&self) -> Color {
        self.water.unwrap_or(Color::WHITE)
    }
}

/// Presentation of a walker token.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneWalker {
    /// Identifier of the presented walker.
    pub walker: WalkerId,
    /// World-space position.
    pub position: Vec2,
    /// Heading, counter-clockwise from +x.
    pub heading_radians: f32,
    /// Colour of the water the walker carries.
    pub color: Color,
}

/// Presentation of a connector node's water state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneConnector {
    /// Identifier of the presented node.
    pub node: NodeId,
    /// Anchor position of the node.
    pub anchor: Vec2,
    /// Whether the node feeds water into the network.
    pub is_source: bool,
    /// Whether water reached the node.
    pub has_water: bool,
}

/// Scene description combining pieces, walkers and connectors.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    /// Pieces in draw order: back tier first, then by identifier.
    pub pieces: Vec<ScenePiece>,
    /// Walkers ordered by identifier.
    pub walkers: Vec<SceneWalker>,
    /// Connector nodes ordered by identifier.
    pub connectors: Vec<SceneConnector>,
}

impl Scene {
    /// Assembles a scene from world snapshots.
    ///
    /// A piece shows water when its connector is wet or the fill animation
    /// reached it; the colour follows its group's tint.
    #[must_use]
    pub fn from_views(
        pieces: &PieceView,
        connectors: &[ConnectorSnapshot],
        walkers: &[WalkerSnapshot],
        groups: &[GroupSnapshot],
    ) -> Self {
        let tints: BTreeMap<GroupId, WaterTint> =
            groups.iter().map(|group| (group.id, group.tint)).collect();
        let tint_of = |group: GroupId| tint_color(tints.get(&group).copied().unwrap_or_default());
        let wet: BTreeMap<NodeId, bool> = connectors
            .iter()
            .map(|node| (node.id, node.has_water))
            .collect();

        let mut scene_pieces: Vec<ScenePiece> = pieces
            .iter()
            .map(|piece| {
                let has_water = piece.filled || wet.get(&piece.node).copied().unwrap_or(false);
                ScenePiece {
                    piece: piece.id,
                    archetype: piece.archetype,
                    visual: piece.visual.clone(),
                    translation: piece.translation,
                    rotation_radians: piece.rotation.to_radians(),
                    scale: piece.scale,
                    tier: piece.tier,
                    layer: piece.layer.clone(),
                    water: has_water.then(|| tint_of(piece.group)),
                }
            })
            .collect();
        scene_pieces.sort_by_key(|piece| (piece.tier.sorting_order(), piece.piece));

        let scene_walkers = walkers
            .iter()
            .map(|walker| SceneWalker {
                walker: walker.id,
                position: walker.position,
                heading_radians: walker.heading.to_radians(),
                color: tint_of(walker.group),
            })
            .collect();

        let scene_connectors = connectors
            .iter()
            .map(|node| SceneConnector {
                node: node.id,
                anchor: node.anchor,
                is_source: node.is_source,
                has_water: node.has_water,
            })
            .collect();

        Self {
            pieces: scene_pieces,
            walkers: scene_walkers,
            connectors: scene_connectors,
        }
    }

    /// Number of pieces currently showing water.
    #[must_use]
    pub fn wet_pieces(&self) -> usize {
        self.pieces.iter().filter(|piece| piece.water.is_some()).count()
    }
}
