#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure drafting system that turns pen input into network build and removal commands.

use pipeflow_core::{Command, Event, GroupId, Point};

/// Distance under which a placed point duplicates the previous one.
const DUPLICATE_POINT_DISTANCE: f32 = 0.1;
/// Tolerance used when comparing snapped coordinates.
const ALIGNMENT_EPSILON: f32 = 1e-5;

/// Input snapshot distilled from adapter-provided frame input data.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BuilderInput {
    /// Enters or leaves drafting mode.
    pub toggle_drafting: bool,
    /// World-space point placed by the user on this frame.
    pub place_point: Option<Point>,
    /// Lifts the pen, committing the current draft.
    pub lift_pen: bool,
    /// Builds every stored draft as one batch.
    pub build_all: bool,
    /// Group picked by the user on this frame, replacing the selection.
    pub selected_group: Option<GroupId>,
    /// Requests removal of the selected group.
    pub delete_selected: bool,
    /// Leaves drafting mode, or clears the selection when not drafting.
    pub cancel: bool,
}

/// Drafting system that accumulates polylines and emits build batches.
#[derive(Clone, Debug, Default)]
pub struct Builder {
    drafting: bool,
    current: Vec<Point>,
    stored: Vec<Vec<Point>>,
    selected: Option<GroupId>,
}

impl Builder {
    /// Creates a new builder system instance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            drafting: false,
            current: Vec::new(),
            stored: Vec::new(),
            selected: None,
        }
    }

    /// Reports whether the builder currently captures points.
    #[must_use]
    pub const fn is_drafting(&self) -> bool {
        self.drafting
    }

    /// Points of the polyline being drawn.
    #[must_use]
    pub fn draft(&self) -> &[Point] {
        &self.current
    }

    /// Group that delete requests apply to.
    #[must_use]
    pub const fn selected(&self) -> Option<GroupId> {
        self.selected
    }

    /// Replaces the selected group.
    pub fn select(&mut self, group: Option<GroupId>) {
        self.selected = group;
    }

    /// Consumes world events and adapter-derived input to emit builder commands.
    pub fn handle(
        &mut self,
        events: &[Event],
        input: BuilderInput,
        grid_size: f32,
        out: &mut Vec<Command>,
    ) {
        for event in events {
            match event {
                Event::GroupRemoved { group } if self.selected == Some(*group) => {
                    self.selected = None;
                }
                Event::NetworkCleared | Event::ConfigApplied => self.selected = None,
                _ => {}
            }
        }

        if let Some(group) = input.selected_group {
            self.selected = Some(group);
        }

        if input.cancel {
            if self.drafting {
                self.set_drafting(false);
            } else {
                self.selected = None;
            }
            return;
        }

        if !self.drafting && input.delete_selected {
            if let Some(group) = self.selected.take() {
                out.push(Command::RemoveGroup { group });
            }
            return;
        }

        if input.toggle_drafting {
            self.set_drafting(!self.drafting);
        }

        if !self.drafting {
            return;
        }

        if input.lift_pen {
            self.lift_pen(out);
        }
        if let Some(point) = input.place_point {
            self.place(snap_to_grid(point, grid_size), out);
        }
        if input.build_all {
            self.build_all(out);
        }
    }

    fn set_drafting(&mut self, drafting: bool) {
        self.drafting = drafting;
        if !drafting {
            self.current.clear();
            self.stored.clear();
        }
    }

    fn place(&mut self, point: Point, out: &mut Vec<Command>) {
        let (Some(first), Some(last)) = (self.current.first(), self.current.last()) else {
            self.current.push(point);
            return;
        };

        if last.distance(point) < DUPLICATE_POINT_DISTANCE {
            return;
        }
        let aligned = (first.x - point.x).abs() < ALIGNMENT_EPSILON
            || (first.y - point.y).abs() < ALIGNMENT_EPSILON;
        if !aligned {
            return;
        }

        self.current.push(point);
        if self.current.len() >= 2 {
            self.lift_pen(out);
        }
    }

    fn lift_pen(&mut self, out: &mut Vec<Command>) {
        if self.current.is_empty() {
            return;
        }
        let draft = std::mem::take(&mut self.current);
        if draft.len() < 2 {
            return;
        }
        self.stored.push(draft);
        self.build_all(out);
    }

    fn build_all(&mut self, out: &mut Vec<Command>) {
        if self.stored.is_empty() {
            return;
        }
        out.push(Command::BuildBatch {
            paths: std::mem::take(&mut self.stored),
        });
    }
}

/// Rounds a point onto the nearest grid intersection.
#[must_use]
pub fn snap_to_grid(point: Point, grid_size: f32) -> Point {
    (point / grid_size).round() * grid_size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapping_rounds_to_the_nearest_intersection() {
        assert_eq!(snap_to_grid(Point::new(1.4, -0.6), 1.0), Point::new(1.0, -1.0));
        assert_eq!(snap_to_grid(Point::new(0.74, 0.26), 0.5), Point::new(0.5, 0.5));
    }

    #[test]
    fn leaving_drafting_mode_discards_everything() {
        let mut builder = Builder::new();
        builder.set_drafting(true);
        builder.current.push(Point::ZERO);
        builder.stored.push(vec![Point::ZERO, Point::X]);

        builder.set_drafting(false);

        assert!(builder.current.is_empty());
        assert!(builder.stored.is_empty());
    }
}
