//! Network builder and remover.
//!
//! Building merges a batch of polylines, connects every stepped sub-segment in
//! the grid index and regenerates pieces over the touched cells and their
//! neighbours. Removal clears a group's cells and then repairs the shapes of
//! whatever still borders the hole.

use std::collections::{BTreeMap, BTreeSet};

use pipeflow_core::{
    resolve, Event, GridPosition, GroupId, GroupSnapshot, PieceId, Point, WaterTint,
};
use tracing::{debug, warn};

use crate::{pieces::PieceState, schedule::Task, World};

/// Upper bound on the cells a single drawn segment may span.
const MAX_SEGMENT_STEPS: usize = 4_096;

/// Pieces and paths produced by one build batch.
#[derive(Clone, Debug)]
pub(crate) struct NetworkGroup {
    pub(crate) id: GroupId,
    /// Merged paths walkers can follow.
    pub(crate) paths: Vec<Vec<Point>>,
    /// Owned pieces in creation order; also the fill order.
    pub(crate) pieces: Vec<PieceId>,
    pub(crate) tint: WaterTint,
}

impl NetworkGroup {
    /// Drops a piece from the fill order, returning the slot it occupied.
    fn forget_piece(&mut self, piece: PieceId) -> Option<usize> {
        let slot = self.pieces.iter().position(|candidate| *candidate == piece)?;
        let _ = self.pieces.remove(slot);
        Some(slot)
    }

    pub(crate) fn snapshot(&self) -> GroupSnapshot {
        GroupSnapshot {
            id: self.id,
            paths: self.paths.clone(),
            pieces: self.pieces.clone(),
            tint: self.tint,
        }
    }
}

/// Registry that stores groups and allocates their identifiers.
#[derive(Debug)]
pub(crate) struct GroupRegistry {
    entries: BTreeMap<GroupId, NetworkGroup>,
    next_group_id: GroupId,
}

impl GroupRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_group_id: GroupId::new(0),
        }
    }

    fn create(&mut self, paths: Vec<Vec<Point>>) -> GroupId {
        let id = self.next_group_id;
        self.next_group_id = id.next();
        let _ = self.entries.insert(
            id,
            NetworkGroup {
                id,
                paths,
                pieces: Vec::new(),
                tint: WaterTint::default(),
            },
        );
        id
    }

    pub(crate) fn get(&self, id: GroupId) -> Option<&NetworkGroup> {
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: GroupId) -> Option<&mut NetworkGroup> {
        self.entries.get_mut(&id)
    }

    fn remove(&mut self, id: GroupId) -> Option<NetworkGroup> {
        self.entries.remove(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &NetworkGroup> {
        self.entries.values()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Splices polylines whose endpoints coincide into longer paths.
///
/// Each incoming polyline is appended to the first merged path ending at its
/// start, or prepended to the first one starting at its end. Polylines with
/// fewer than two points are dropped.
pub(crate) fn merge_paths(batch: Vec<Vec<Point>>, tolerance: f32) -> Vec<Vec<Point>> {
    let mut merged: Vec<Vec<Point>> = Vec::new();

    for segment in batch {
        let [head, .., tail] = segment.as_slice() else {
            continue;
        };
        let (head, tail) = (*head, *tail);

        let mut absorbed = false;
        for existing in &mut merged {
            let (Some(first), Some(last)) = (existing.first().copied(), existing.last().copied())
            else {
                continue;
            };
            if last.distance(head) <= tolerance {
                existing.extend_from_slice(&segment[1..]);
                absorbed = true;
                break;
            }
            if first.distance(tail) <= tolerance {
                let mut joined = segment[..segment.len() - 1].to_vec();
                joined.append(existing);
                *existing = joined;
                absorbed = true;
                break;
            }
        }

        if !absorbed {
            merged.push(segment);
        }
    }

    merged
}

/// Breaks a segment into consecutive grid-step pairs.
///
/// The step count is the segment length divided by the grid size, rounded;
/// zero-length segments and segments above the step limit yield nothing.
pub(crate) fn stepped_segments(
    start: Point,
    end: Point,
    grid_size: f32,
) -> Vec<(GridPosition, GridPosition)> {
    let delta = end - start;
    let length = delta.length();
    if length <= f32::EPSILON {
        return Vec::new();
    }

    let steps = (length / grid_size).round();
    if steps > MAX_SEGMENT_STEPS as f32 {
        warn!(?start, ?end, steps, "skipping segment longer than the step limit");
        return Vec::new();
    }
    let steps = steps as usize;

    let direction = delta / length;
    let at = |step: usize| GridPosition::from_point(start + direction * (step as f32 * grid_size));
    (0..steps).map(|step| (at(step), at(step + 1))).collect()
}

fn quantized(path: Vec<Point>) -> Vec<Point> {
    path.into_iter()
        .map(|point| GridPosition::from_point(point).to_point())
        .collect()
}

impl World {
    pub(crate) fn build_batch(&mut self, batch: Vec<Vec<Point>>, out_events: &mut Vec<Event>) {
        let batch: Vec<Vec<Point>> = batch.into_iter().map(quantized).collect();
        let paths = merge_paths(batch, self.config.merge_tolerance);
        if paths.is_empty() {
            debug!("ignoring batch without a usable polyline");
            return;
        }

        let mut touched = BTreeSet::new();
        for path in &paths {
            for pair in path.windows(2) {
                for (a, b) in stepped_segments(pair[0], pair[1], self.grid.grid_size()) {
                    if self.grid.connect(a, b) {
                        let _ = touched.insert(a);
                        let _ = touched.insert(b);
                    } else {
                        debug!(?a, ?b, "skipping segment that is not one axis step long");
                    }
                }
            }
        }

        let path_count = paths.len();
        let group = self.groups.create(paths);
        out_events.push(Event::GroupBuilt {
            group,
            paths: path_count,
        });

        let mut affected = touched.clone();
        for position in &touched {
            for (_, neighbor) in position.neighbors(self.grid.grid_size()) {
                let _ = affected.insert(neighbor);
            }
        }
        for position in affected {
            self.regenerate_cell(position, Some(group), out_events);
        }

        debug!(?group, cells = touched.len(), "built network group");
    }

    pub(crate) fn remove_group(&mut self, group: GroupId, out_events: &mut Vec<Event>) {
        if self.groups.get(group).is_none() {
            debug!(?group, "ignoring removal of unknown group");
            return;
        }

        let cells: Vec<GridPosition> = self
            .owners
            .iter()
            .filter(|(_, owner)| **owner == group)
            .map(|(position, _)| *position)
            .collect();
        for position in &cells {
            let _ = self.destroy_piece_at(*position, out_events);
            let _ = self.grid.disconnect_all(*position);
            let _ = self.owners.remove(position);
        }
        for position in &cells {
            for (_, neighbor) in position.neighbors(self.grid.grid_size()) {
                self.regenerate_cell(neighbor, None, out_events);
            }
        }

        self.scheduler
            .cancel(|task| matches!(task, Task::Fill { group: owner, .. } if *owner == group));
        self.despawn_walkers_of(group, out_events);
        let _ = self.groups.remove(group);
        out_events.push(Event::GroupRemoved { group });
        debug!(?group, cells = cells.len(), "removed network group");
    }

    pub(crate) fn remove_cell(&mut self, position: GridPosition, out_events: &mut Vec<Event>) {
        if self.grid.mask_at(position).is_empty() {
            return;
        }

        let _ = self.destroy_piece_at(position, out_events);
        let _ = self.grid.disconnect_all(position);
        let _ = self.owners.remove(&position);
        for (_, neighbor) in position.neighbors(self.grid.grid_size()) {
            self.regenerate_cell(neighbor, None, out_events);
        }
    }

    pub(crate) fn clear_network(&mut self, out_events: &mut Vec<Event>) {
        self.grid.clear();
        self.owners.clear();
        self.pieces.clear();
        self.groups.clear();
        let _ = self.connectors.detach_piece_nodes();
        self.scheduler.clear();
        self.walkers.clear();
        out_events.push(Event::NetworkCleared);
    }

    /// Brings the piece at a cell in line with the cell's current mask.
    ///
    /// Cells that already belong to a group keep it; otherwise the piece joins
    /// `fallback`. A cell with neither is left without a piece.
    fn regenerate_cell(
        &mut self,
        position: GridPosition,
        fallback: Option<GroupId>,
        out_events: &mut Vec<Event>,
    ) {
        let mask = self.grid.mask_at(position);
        if mask.is_empty() {
            let _ = self.destroy_piece_at(position, out_events);
            let _ = self.owners.remove(&position);
            return;
        }

        if self
            .pieces
            .at(position)
            .is_some_and(|piece| piece.mask == mask)
        {
            return;
        }

        let Some(group) = self.owners.get(&position).copied().or(fallback) else {
            return;
        };
        let slot = self.destroy_piece_at(position, out_events);
        let _ = self.owners.insert(position, group);

        let Some(shape) = resolve(mask) else {
            return;
        };
        let Some(visual) = self.config.visuals.get(shape.archetype) else {
            warn!(archetype = ?shape.archetype, ?position, "no visual configured for archetype");
            out_events.push(Event::VisualMissing {
                position,
                archetype: shape.archetype,
            });
            return;
        };

        let center = position.to_point();
        let (scale, translation) = if shape.archetype.receives_adjustments() {
            (visual.scale, center + visual.offset)
        } else {
            (Point::ONE, center)
        };
        let rotation = f32::from(shape.rotation) + visual.rotation_offset;
        let reference = visual.reference.clone();

        let half_step = self.grid.grid_size() * 0.5;
        let openings = mask
            .directions()
            .map(|direction| center + direction.unit() * half_step)
            .collect();
        let id = self.pieces.allocate();
        let node = self.connectors.attach(center, openings, Some(id));

        let _ = self.pieces.insert(PieceState {
            id,
            group,
            position,
            mask,
            archetype: shape.archetype,
            rotation,
            scale,
            translation,
            visual: reference,
            node,
            filled: false,
        });
        if let Some(state) = self.groups.get_mut(group) {
            match slot {
                Some(slot) if slot <= state.pieces.len() => state.pieces.insert(slot, id),
                _ => state.pieces.push(id),
            }
        }

        out_events.push(Event::PiecePlaced {
            piece: id,
            group,
            position,
            archetype: shape.archetype,
            rotation,
        });
    }

    /// Destroys the piece at a cell together with its connector node.
    ///
    /// Returns the slot the piece held in its group's fill order.
    fn destroy_piece_at(
        &mut self,
        position: GridPosition,
        out_events: &mut Vec<Event>,
    ) -> Option<usize> {
        let piece = self.pieces.remove_at(position)?;
        let node = piece.node;
        self.scheduler
            .cancel(|task| matches!(task, Task::Spread { node: pending } if *pending == node));
        let _ = self.connectors.detach(node);
        out_events.push(Event::PieceRemoved {
            piece: piece.id,
            position,
        });
        self.groups
            .get_mut(piece.group)
            .and_then(|group| group.forget_piece(piece.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(raw: &[(f32, f32)]) -> Vec<Point> {
        raw.iter().map(|(x, y)| Point::new(*x, *y)).collect()
    }

    #[test]
    fn touching_polylines_are_appended() {
        let merged = merge_paths(
            vec![
                points(&[(0.0, 0.0), (1.0, 0.0)]),
                points(&[(1.0, 0.0), (1.0, 1.0)]),
            ],
            0.01,
        );
        assert_eq!(merged, vec![points(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)])]);
    }

    #[test]
    fn polylines_ending_at_a_path_start_are_prepended() {
        let merged = merge_paths(
            vec![
                points(&[(1.0, 0.0), (2.0, 0.0)]),
                points(&[(0.0, 0.0), (1.005, 0.0)]),
            ],
            0.01,
        );
        assert_eq!(merged, vec![points(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)])]);
    }

    #[test]
    fn disjoint_and_degenerate_polylines() {
        let merged = merge_paths(
            vec![
                points(&[(0.0, 0.0), (1.0, 0.0)]),
                points(&[(5.0, 5.0)]),
                Vec::new(),
                points(&[(3.0, 0.0), (4.0, 0.0)]),
            ],
            0.01,
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1], points(&[(3.0, 0.0), (4.0, 0.0)]));
    }

    #[test]
    fn segments_step_one_cell_at_a_time() {
        let steps = stepped_segments(Point::new(0.0, 0.0), Point::new(0.0, 3.0), 1.0);
        let expected: Vec<_> = (0..3)
            .map(|i| {
                (
                    GridPosition::from_point(Point::new(0.0, i as f32)),
                    GridPosition::from_point(Point::new(0.0, (i + 1) as f32)),
                )
            })
            .collect();
        assert_eq!(steps, expected);
    }

    #[test]
    fn zero_length_segments_are_skipped() {
        assert!(stepped_segments(Point::ONE, Point::ONE, 1.0).is_empty());
    }

    #[test]
    fn far_off_segments_are_skipped() {
        assert!(stepped_segments(Point::ZERO, Point::new(1.0e9, 0.0), 1.0).is_empty());
        assert_eq!(
            stepped_segments(Point::ZERO, Point::new(MAX_SEGMENT_STEPS as f32, 0.0), 1.0).len(),
            MAX_SEGMENT_STEPS
        );
    }
}
