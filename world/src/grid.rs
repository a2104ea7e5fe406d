//! Canonical store of per-cell connection masks.

use std::collections::BTreeMap;

use pipeflow_core::{ConnectionMask, Direction, GridPosition};

/// Symmetric connectivity graph laid out on the grid.
///
/// A bit set on one cell toward a neighbour is always mirrored on that
/// neighbour. Cells whose mask drops to zero are removed, so an absent entry
/// and an empty mask mean the same thing.
#[derive(Clone, Debug)]
pub(crate) struct GridIndex {
    grid_size: f32,
    masks: BTreeMap<GridPosition, ConnectionMask>,
}

impl GridIndex {
    /// Creates an empty index for cells of the provided size.
    pub(crate) fn new(grid_size: f32) -> Self {
        Self {
            grid_size,
            masks: BTreeMap::new(),
        }
    }

    /// Side length of a cell in world units.
    pub(crate) fn grid_size(&self) -> f32 {
        self.grid_size
    }

    /// Connects two adjacent cells in both directions.
    ///
    /// Returns `false` without touching the index when the cells are not
    /// exactly one grid step apart along an axis.
    pub(crate) fn connect(&mut self, a: GridPosition, b: GridPosition) -> bool {
        let Some(direction) = Direction::from_delta(b.to_point() - a.to_point()) else {
            return false;
        };
        if a.step(direction, self.grid_size) != b {
            return false;
        }

        let mask_a = self.masks.entry(a).or_default();
        *mask_a = mask_a.with(direction);
        let mask_b = self.masks.entry(b).or_default();
        *mask_b = mask_b.with(direction.opposite());
        true
    }

    /// Removes a cell and clears every neighbour bit that pointed back at it.
    ///
    /// Returns the mask the cell held, or an empty mask when it was absent.
    pub(crate) fn disconnect_all(&mut self, position: GridPosition) -> ConnectionMask {
        let removed = self.masks.remove(&position).unwrap_or_default();

        for (direction, neighbor) in position.neighbors(self.grid_size) {
            let Some(mask) = self.masks.get_mut(&neighbor) else {
                continue;
            };
            *mask = mask.without(direction.opposite());
            if mask.is_empty() {
                let _ = self.masks.remove(&neighbor);
            }
        }

        removed
    }

    /// Mask stored for the cell, empty when absent.
    pub(crate) fn mask_at(&self, position: GridPosition) -> ConnectionMask {
        self.masks.get(&position).copied().unwrap_or_default()
    }

    /// Iterates every present cell in deterministic order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (GridPosition, ConnectionMask)> + '_ {
        self.masks.iter().map(|(position, mask)| (*position, *mask))
    }

    /// Removes every cell.
    pub(crate) fn clear(&mut self) {
        self.masks.clear();
    }
}
