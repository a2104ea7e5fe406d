//! Walker kinematics along a waypoint path.
//!
//! A walker keeps the lateral and forward offset it had relative to the first
//! segment for its whole journey. Each segment re-projects those offsets onto
//! its own frame, so a walker spawned beside the path stays in its lane through
//! corners.

use std::collections::{BTreeMap, BTreeSet};

use pipeflow_core::{GridPosition, GroupId, Point, WalkerId, WalkerSnapshot};

/// Distance under which a path's second point counts as the walker's next waypoint.
const SAME_BRANCH_TOLERANCE: f32 = 0.1;

/// Outcome of a single motion step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Step {
    /// Budget ran out before the target was reached.
    Moving,
    /// The walker reached the waypoint at the given run-path index.
    Arrived { waypoint: usize, position: Point },
    /// The walker is past its final waypoint.
    Finished,
}

/// Token travelling along one path of a group.
#[derive(Clone, Debug)]
pub(crate) struct Walker {
    pub(crate) id: WalkerId,
    pub(crate) group: GroupId,
    pub(crate) path: usize,
    waypoints: Vec<Point>,
    target_index: usize,
    position: Point,
    heading: f32,
    lateral_offset: f32,
    forward_offset: f32,
    visited: BTreeSet<GridPosition>,
}

impl Walker {
    /// Places a walker at `position` and captures its lane offsets.
    ///
    /// Offsets are measured against the first segment; a single-point path
    /// snaps the walker onto that point and finishes it immediately.
    pub(crate) fn begin_journey(
        id: WalkerId,
        group: GroupId,
        path: usize,
        waypoints: Vec<Point>,
        position: Point,
    ) -> Self {
        let mut walker = Self {
            id,
            group,
            path,
            waypoints,
            target_index: 1,
            position,
            heading: 0.0,
            lateral_offset: 0.0,
            forward_offset: 0.0,
            visited: BTreeSet::new(),
        };

        match walker.waypoints.as_slice() {
            [] => walker.target_index = 0,
            [only] => walker.position = *only,
            [first, second, ..] => {
                let direction = (*second - *first).normalize_or_zero();
                let offset = position - *first;
                walker.lateral_offset = offset.dot(direction.perp());
                walker.forward_offset = offset.dot(direction);
                walker.heading = heading_of(direction);
            }
        }

        walker
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.target_index >= self.waypoints.len()
    }

    /// Lane-adjusted point the walker currently steers toward.
    fn lane_target(&self) -> Option<Point> {
        let start = *self.waypoints.get(self.target_index.checked_sub(1)?)?;
        let end = *self.waypoints.get(self.target_index)?;
        let direction = (end - start).normalize_or_zero();
        Some(end + direction.perp() * self.lateral_offset + direction * self.forward_offset)
    }

    /// Moves toward the current target, consuming at most `budget` distance.
    pub(crate) fn step(&mut self, budget: &mut f32, arrival_epsilon: f32) -> Step {
        let Some(target) = self.lane_target() else {
            return Step::Finished;
        };

        let to_target = target - self.position;
        let distance = to_target.length();
        if distance > f32::EPSILON {
            self.heading = heading_of(to_target);
        }

        if distance <= *budget {
            self.position = target;
            *budget -= distance;
        } else {
            self.position += to_target / distance * *budget;
            *budget = 0.0;
        }

        if self.position.distance(target) < arrival_epsilon {
            let waypoint = self.target_index;
            self.target_index += 1;
            return Step::Arrived {
                waypoint,
                position: self.position,
            };
        }

        Step::Moving
    }

    /// Marks the waypoint just reached as visited, returning it on first visit.
    ///
    /// Nothing is claimed once the walker has passed its final waypoint.
    pub(crate) fn claim_junction(&mut self) -> Option<Point> {
        if self.is_finished() {
            return None;
        }
        let junction = *self.waypoints.get(self.target_index.checked_sub(1)?)?;
        if self.visited.insert(GridPosition::from_point(junction)) {
            Some(junction)
        } else {
            None
        }
    }

    /// Reports whether a candidate path is the one this walker already follows.
    pub(crate) fn follows(&self, index: usize, candidate: &[Point]) -> bool {
        if index == self.path {
            return true;
        }
        match (self.waypoints.get(self.target_index), candidate.get(1)) {
            (Some(next), Some(second)) => next.distance(*second) <= SAME_BRANCH_TOLERANCE,
            _ => false,
        }
    }

    pub(crate) fn snapshot(&self) -> WalkerSnapshot {
        WalkerSnapshot {
            id: self.id,
            group: self.group,
            path: self.path,
            position: self.position,
            heading: self.heading,
            target_index: self.target_index,
            lateral_offset: self.lateral_offset,
            forward_offset: self.forward_offset,
        }
    }
}

fn heading_of(direction: Point) -> f32 {
    direction.y.atan2(direction.x).to_degrees()
}

/// Extends a path backwards along its first segment by `offset` of its length.
pub(crate) fn run_path(path: &[Point], offset: f32) -> Vec<Point> {
    let mut run = Vec::with_capacity(path.len() + 1);
    if let [first, second, ..] = path {
        if offset > 0.0 {
            run.push(*first - (*second - *first) * offset);
        }
    }
    run.extend_from_slice(path);
    run
}

/// Walkers keyed by identifier.
#[derive(Debug)]
pub(crate) struct WalkerRegistry {
    entries: BTreeMap<WalkerId, Walker>,
    next_walker_id: WalkerId,
}

impl WalkerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_walker_id: WalkerId::new(0),
        }
    }

    pub(crate) fn allocate(&mut self) -> WalkerId {
        let id = self.next_walker_id;
        self.next_walker_id = id.next();
        id
    }

    pub(crate) fn insert(&mut self, walker: Walker) {
        let _ = self.entries.insert(walker.id, walker);
    }

    pub(crate) fn remove(&mut self, id: WalkerId) -> Option<Walker> {
        self.entries.remove(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Walker> {
        self.entries.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Walker> {
        self.entries.values_mut()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 0.01;

    fn points(raw: &[(f32, f32)]) -> Vec<Point> {
        raw.iter().map(|(x, y)| Point::new(*x, *y)).collect()
    }

    fn walker(path: &[(f32, f32)], start: Point) -> Walker {
        Walker::begin_journey(WalkerId::new(0), GroupId::new(0), 0, points(path), start)
    }

    fn run_to_completion(walker: &mut Walker, budget_per_tick: f32) -> Vec<(usize, Point)> {
        let mut arrivals = Vec::new();
        for _ in 0..1_000 {
            let mut budget = budget_per_tick;
            loop {
                match walker.step(&mut budget, EPSILON) {
                    Step::Arrived { waypoint, position } => arrivals.push((waypoint, position)),
                    Step::Moving => break,
                    Step::Finished => return arrivals,
                }
            }
        }
        panic!("walker never finished");
    }

    fn assert_near(actual: Point, expected: Point) {
        assert!(
            actual.distance(expected) < 1e-4,
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn lane_offset_survives_a_corner() {
        let mut walker = walker(
            &[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (2.0, 1.0)],
            Point::new(0.0, -0.2),
        );
        assert!((walker.lateral_offset + 0.2).abs() < 1e-6);
        assert!(walker.forward_offset.abs() < 1e-6);

        let arrivals = run_to_completion(&mut walker, 0.3);

        assert_eq!(arrivals.len(), 3);
        assert_near(arrivals[0].1, Point::new(1.0, -0.2));
        assert_near(arrivals[1].1, Point::new(2.0, -0.2));
        assert_near(arrivals[2].1, Point::new(2.2, 1.0));
        assert!(walker.is_finished());
    }

    #[test]
    fn leftover_budget_carries_into_the_next_segment() {
        let mut walker = walker(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)], Point::ZERO);
        let mut budget = 1.5;

        assert!(matches!(
            walker.step(&mut budget, EPSILON),
            Step::Arrived { waypoint: 1, .. }
        ));
        assert_eq!(walker.step(&mut budget, EPSILON), Step::Moving);
        assert_near(walker.position, Point::new(1.0, 0.5));
        assert!((walker.heading - 90.0).abs() < 1e-3);
    }

    #[test]
    fn single_point_path_finishes_in_place() {
        let mut walker = walker(&[(3.0, 4.0)], Point::ZERO);
        assert_eq!(walker.position, Point::new(3.0, 4.0));
        assert!(walker.is_finished());
        let mut budget = 1.0;
        assert_eq!(walker.step(&mut budget, EPSILON), Step::Finished);
    }

    #[test]
    fn junctions_are_claimed_once() {
        let mut walker = walker(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)], Point::ZERO);
        let mut budget = 1.0;
        let _ = walker.step(&mut budget, EPSILON);

        assert_eq!(walker.claim_junction(), Some(Point::new(1.0, 0.0)));
        assert_eq!(walker.claim_junction(), None);
    }

    #[test]
    fn final_leg_claims_nothing() {
        let mut walker = walker(&[(0.0, 0.0), (1.0, 0.0)], Point::ZERO);
        let mut budget = 5.0;
        let _ = walker.step(&mut budget, EPSILON);
        assert_eq!(walker.claim_junction(), None);
    }

    #[test]
    fn follows_recognises_the_current_branch() {
        let mut walker = walker(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)], Point::ZERO);
        let mut budget = 1.0;
        let _ = walker.step(&mut budget, EPSILON);

        assert!(walker.follows(0, &points(&[(9.0, 9.0)])));
        assert!(walker.follows(3, &points(&[(1.0, 0.0), (2.05, 0.0)])));
        assert!(!walker.follows(3, &points(&[(1.0, 0.0), (1.0, 1.0)])));
        assert!(!walker.follows(3, &points(&[(1.0, 0.0)])));
    }

    #[test]
    fn run_path_prepends_a_tip_against_the_first_segment() {
        let path = points(&[(0.0, 0.0), (2.0, 0.0), (2.0, 2.0)]);
        let run = run_path(&path, 0.15);
        assert_eq!(run.len(), 4);
        assert_near(run[0], Point::new(-0.3, 0.0));
        assert_eq!(&run[1..], path.as_slice());
        assert_eq!(run_path(&path, 0.0), path);
    }
}
