//! Shape resolution that maps a connection mask onto a piece archetype.
//!
//! The rotation rules are a fixed table rather than a derived formula: pieces
//! must line up with the reference visuals exactly as authored.

use serde::{Deserialize, Serialize};

use crate::{ConnectionMask, Direction};

/// Shape classes a piece can be rendered as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Archetype {
    /// Single connection; rendered with the straight visual.
    DeadEnd,
    /// Two opposite connections.
    Straight,
    /// Two adjacent connections.
    Corner,
    /// Three connections.
    Tee,
    /// Four connections.
    Cross,
}

impl Archetype {
    /// Every archetype in resolution order.
    pub const ALL: [Archetype; 5] = [
        Archetype::DeadEnd,
        Archetype::Straight,
        Archetype::Corner,
        Archetype::Tee,
        Archetype::Cross,
    ];

    /// Reports whether the archetype is drawn with the straight visual.
    #[must_use]
    pub const fn is_straight(self) -> bool {
        matches!(self, Self::DeadEnd | Self::Straight)
    }

    /// Draw-order tier applied to the archetype.
    #[must_use]
    pub const fn draw_tier(self) -> DrawTier {
        if self.is_straight() {
            DrawTier::Back
        } else {
            DrawTier::Front
        }
    }

    /// Reports whether configured scale and nudge apply to the archetype.
    #[must_use]
    pub const fn receives_adjustments(self) -> bool {
        !self.is_straight()
    }
}

/// Render-order tier of a piece.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DrawTier {
    /// Drawn behind connectors.
    Back,
    /// Drawn in front of straight pieces.
    Front,
}

impl DrawTier {
    /// Numeric sorting order consumed by renderers.
    #[must_use]
    pub const fn sorting_order(self) -> i32 {
        match self {
            Self::Back => 0,
            Self::Front => 1,
        }
    }
}

/// Archetype and orientation resolved from a connection mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Shape {
    /// Shape class of the piece.
    pub archetype: Archetype,
    /// Rotation in degrees, one of 0, 90, 180 or 270.
    pub rotation: u16,
}

impl Shape {
    const fn new(archetype: Archetype, rotation: u16) -> Self {
        Self {
            archetype,
            rotation,
        }
    }
}

/// Resolves the archetype and rotation for a connection mask.
///
/// Returns `None` for an empty mask; callers treat that cell as vacant.
#[must_use]
pub fn resolve(mask: ConnectionMask) -> Option<Shape> {
    let right = mask.contains(Direction::Right);
    let up = mask.contains(Direction::Up);
    let left = mask.contains(Direction::Left);
    let down = mask.contains(Direction::Down);

    match mask.count() {
        1 => {
            let rotation = if right {
                0
            } else if up {
                90
            } else if left {
                180
            } else {
                270
            };
            Some(Shape::new(Archetype::DeadEnd, rotation))
        }
        2 if right && left => Some(Shape::new(Archetype::Straight, 0)),
        2 if up && down => Some(Shape::new(Archetype::Straight, 90)),
        2 => {
            // Reference corner connects down and right at zero rotation.
            let rotation = if down && right {
                0
            } else if right && up {
                90
            } else if up && left {
                180
            } else {
                270
            };
            Some(Shape::new(Archetype::Corner, rotation))
        }
        3 => {
            // Reference tee connects left, right and down; rotate by the gap.
            let rotation = if !up {
                0
            } else if !left {
                90
            } else if !down {
                180
            } else {
                270
            };
            Some(Shape::new(Archetype::Tee, rotation))
        }
        4 => Some(Shape::new(Archetype::Cross, 0)),
        _ => None,
    }
}
