//! Grid geometry: positions, distances, and cell quantization.
//!
//! Positions are real-valued; agents move in fractional steps but the
//! occupancy table and the pathfinder operate on floored integer cells.
//! The sentinel position `(-1, -1)` marks an entity that has been removed
//! from the simulation (a dead or treated person).

use serde::{Deserialize, Serialize};

/// A real-valued coordinate on the simulation grid.
///
/// Valid positions satisfy `0 <= x < width` and `0 <= y < height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Position {
    /// Sentinel for "removed from the simulation".
    pub const SENTINEL: Self = Self { x: -1.0, y: -1.0 };

    /// Create a position from raw coordinates.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean (straight-line) distance to another position.
    pub fn euclidean(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.hypot(dy)
    }

    /// Manhattan (taxicab) distance to another position.
    ///
    /// Battery-budget and round-trip calculations use this metric.
    pub fn manhattan(&self, other: &Self) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// The integer grid cell containing this position.
    pub fn cell(&self) -> (i64, i64) {
        #[allow(clippy::cast_possible_truncation)]
        (self.x.floor() as i64, self.y.floor() as i64)
    }

    /// Whether the position lies inside a `width x height` grid.
    pub fn in_bounds(&self, width: u32, height: u32) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.x < f64::from(width) && self.y < f64::from(height)
    }

    /// Whether this is the removed-entity sentinel.
    pub fn is_sentinel(&self) -> bool {
        self.x < 0.0 || self.y < 0.0
    }

    /// Take one step of at most `speed` toward `target`.
    ///
    /// Used as the greedy fallback when no full path is needed (or when
    /// the pathfinder reports failure). Returns `target` itself once it
    /// is within reach.
    pub fn step_toward(&self, target: &Self, speed: f64) -> Self {
        let dist = self.euclidean(target);
        if dist <= speed || dist <= f64::EPSILON {
            return *target;
        }
        let t = speed / dist;
        Self {
            x: self.x + (target.x - self.x) * t,
            y: self.y + (target.y - self.y) * t,
        }
    }

    /// The center of the grid cell containing this position.
    pub fn cell_center(&self) -> Self {
        let (cx, cy) = self.cell();
        #[allow(clippy::cast_precision_loss)]
        Self {
            x: cx as f64 + 0.5,
            y: cy as f64 + 0.5,
        }
    }
}

/// An axis-aligned rectangle of grid cells, used for patrol zones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge (inclusive).
    pub x: f64,
    /// Top edge (inclusive).
    pub y: f64,
    /// Width in cells.
    pub width: f64,
    /// Height in cells.
    pub height: f64,
}

impl Rect {
    /// Create a rectangle from its origin and extent.
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Whether a position falls inside the rectangle.
    pub fn contains(&self, pos: &Position) -> bool {
        pos.x >= self.x
            && pos.y >= self.y
            && pos.x < self.x + self.width
            && pos.y < self.y + self.height
    }

    /// The center point of the rectangle.
    pub fn center(&self) -> Position {
        Position::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn euclidean_distance() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(3.0, 4.0);
        assert_eq!(a.euclidean(&b), 5.0);
    }

    #[test]
    fn manhattan_distance() {
        let a = Position::new(1.0, 1.0);
        let b = Position::new(4.0, 5.0);
        assert_eq!(a.manhattan(&b), 7.0);
    }

    #[test]
    fn cell_floors_coordinates() {
        assert_eq!(Position::new(3.9, 7.1).cell(), (3, 7));
        assert_eq!(Position::new(0.0, 0.0).cell(), (0, 0));
    }

    #[test]
    fn bounds_are_half_open() {
        let p = Position::new(9.999, 0.0);
        assert!(p.in_bounds(10, 10));
        assert!(!Position::new(10.0, 0.0).in_bounds(10, 10));
        assert!(!Position::SENTINEL.in_bounds(10, 10));
    }

    #[test]
    fn sentinel_detected() {
        assert!(Position::SENTINEL.is_sentinel());
        assert!(!Position::new(0.0, 0.0).is_sentinel());
    }

    #[test]
    fn step_toward_respects_speed() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(10.0, 0.0);
        let stepped = a.step_toward(&b, 1.5);
        assert!((stepped.x - 1.5).abs() < 1e-9);
        assert_eq!(stepped.y, 0.0);
    }

    #[test]
    fn step_toward_snaps_when_close() {
        let a = Position::new(9.5, 0.0);
        let b = Position::new(10.0, 0.0);
        let stepped = a.step_toward(&b, 1.0);
        assert_eq!(stepped, b);
    }

    #[test]
    fn rect_contains_and_center() {
        let zone = Rect::new(2.0, 2.0, 4.0, 6.0);
        assert!(zone.contains(&Position::new(2.0, 2.0)));
        assert!(!zone.contains(&Position::new(6.0, 2.0)));
        assert_eq!(zone.center(), Position::new(4.0, 5.0));
    }
}
