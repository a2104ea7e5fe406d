//! Authoritative piece state management utilities.

use std::collections::BTreeMap;

use pipeflow_core::{
    Archetype, ConnectionMask, GridPosition, GroupId, NodeId, PieceId, PieceSnapshot, Point,
};

/// Snapshot of a piece stored inside the world.
#[derive(Clone, Debug)]
pub(crate) struct PieceState {
    /// Identifier allocated by the world for the piece.
    pub(crate) id: PieceId,
    /// Group the piece belongs to.
    pub(crate) group: GroupId,
    /// Cell occupied by the piece.
    pub(crate) position: GridPosition,
    /// Mask the piece was resolved from.
    pub(crate) mask: ConnectionMask,
    /// Shape class selected for the mask.
    pub(crate) archetype: Archetype,
    /// Rotation in degrees including the visual's offset.
    pub(crate) rotation: f32,
    /// Render scale.
    pub(crate) scale: Point,
    /// World-space translation of the piece.
    pub(crate) translation: Point,
    /// Reference visual the piece was instantiated from.
    pub(crate) visual: String,
    /// Connector node owned by the piece.
    pub(crate) node: NodeId,
    /// Whether the fill animation has reached the piece.
    pub(crate) filled: bool,
}

impl PieceState {
    pub(crate) fn snapshot(&self, layer: &str) -> PieceSnapshot {
        PieceSnapshot {
            id: self.id,
            group: self.group,
            position: self.position,
            mask: self.mask,
            archetype: self.archetype,
            rotation: self.rotation,
            scale: self.scale,
            translation: self.translation,
            tier: self.archetype.draw_tier(),
            layer: layer.to_owned(),
            visual: self.visual.clone(),
            node: self.node,
            filled: self.filled,
        }
    }
}

/// Registry that stores pieces, indexes them by cell and allocates identifiers.
#[derive(Debug)]
pub(crate) struct PieceRegistry {
    entries: BTreeMap<PieceId, PieceState>,
    by_position: BTreeMap<GridPosition, PieceId>,
    next_piece_id: PieceId,
}

impl PieceRegistry {
    /// Creates an empty registry with a reset identifier counter.
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            by_position: BTreeMap::new(),
            next_piece_id: PieceId::new(0),
        }
    }

    /// Reserves the identifier for the next inserted piece.
    pub(crate) fn allocate(&mut self) -> PieceId {
        let id = self.next_piece_id;
        self.next_piece_id = id.next();
        id
    }

    /// Stores a piece, replacing whatever occupied its cell.
    pub(crate) fn insert(&mut self, state: PieceState) -> Option<PieceState> {
        let replaced = self
            .by_position
            .insert(state.position, state.id)
            .and_then(|previous| self.entries.remove(&previous));
        let _ = self.entries.insert(state.id, state);
        replaced
    }

    /// Removes the piece occupying the cell.
    pub(crate) fn remove_at(&mut self, position: GridPosition) -> Option<PieceState> {
        let id = self.by_position.remove(&position)?;
        self.entries.remove(&id)
    }

    pub(crate) fn at(&self, position: GridPosition) -> Option<&PieceState> {
        let id = self.by_position.get(&position)?;
        self.entries.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: PieceId) -> Option<&mut PieceState> {
        self.entries.get_mut(&id)
    }

    /// Iterates pieces in identifier order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &PieceState> {
        self.entries.values()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.by_position.clear();
    }
}
