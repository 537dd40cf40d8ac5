//! The bounded simulation grid: dimensions, obstacles, and POI lookups.
//!
//! The [`Grid`] is immutable once a map has been applied: obstacles are
//! created at load time and never move. Mutable world state (who occupies
//! which cell) lives in the arbiter, not here.

use std::collections::BTreeSet;

use skyguard_types::{Obstacle, PoiType, Position, Rect};

use crate::error::WorldError;

/// A named rectangular region of the map, as declared in the map file.
///
/// Zones anchor rescue-point placement and the zone-dispatch watch areas.
#[derive(Debug, Clone, PartialEq)]
pub struct MapZone {
    /// Zone kind from the map file (free-form, e.g. "stage", "camping").
    pub kind: String,
    /// The zone rectangle.
    pub rect: Rect,
}

/// The bounded grid: dimensions, obstacle table, and blocking-cell index.
#[derive(Debug, Clone)]
pub struct Grid {
    width: u32,
    height: u32,
    obstacles: Vec<Obstacle>,
    zones: Vec<MapZone>,
    blocking: BTreeSet<(i64, i64)>,
}

impl Grid {
    /// Create an empty grid of the given dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidDimensions`] if either dimension is 0.
    pub fn new(width: u32, height: u32) -> Result<Self, WorldError> {
        if width == 0 || height == 0 {
            return Err(WorldError::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            obstacles: Vec::new(),
            zones: Vec::new(),
            blocking: BTreeSet::new(),
        })
    }

    /// Grid width in cells.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// All obstacles on the grid.
    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// All zones declared by the map file.
    pub fn zones(&self) -> &[MapZone] {
        &self.zones
    }

    /// Add an obstacle, rejecting out-of-bounds positions.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfBounds`] if the obstacle position falls
    /// outside the grid.
    pub fn add_obstacle(&mut self, obstacle: Obstacle) -> Result<(), WorldError> {
        if !obstacle.position.in_bounds(self.width, self.height) {
            return Err(WorldError::out_of_bounds(
                obstacle.position,
                self.width,
                self.height,
            ));
        }
        if obstacle.blocking {
            self.blocking.insert(obstacle.position.cell());
        }
        self.obstacles.push(obstacle);
        Ok(())
    }

    /// Record a zone rectangle, rejecting rectangles that leave the map.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ZoneOutOfBounds`] if the rectangle extends
    /// past the grid edge.
    pub fn add_zone(&mut self, kind: String, rect: Rect) -> Result<(), WorldError> {
        let fits = rect.x >= 0.0
            && rect.y >= 0.0
            && rect.x + rect.width <= f64::from(self.width)
            && rect.y + rect.height <= f64::from(self.height);
        if !fits {
            return Err(WorldError::ZoneOutOfBounds { zone: kind });
        }
        self.zones.push(MapZone { kind, rect });
        Ok(())
    }

    /// Whether the cell lies inside the grid.
    pub fn cell_in_bounds(&self, cell: (i64, i64)) -> bool {
        cell.0 >= 0 && cell.1 >= 0 && cell.0 < i64::from(self.width) && cell.1 < i64::from(self.height)
    }

    /// Whether the cell is occupied by a blocking obstacle.
    pub fn is_blocked(&self, cell: (i64, i64)) -> bool {
        self.blocking.contains(&cell)
    }

    /// Whether an agent may stand on the cell (in bounds and not blocked).
    pub fn is_walkable(&self, cell: (i64, i64)) -> bool {
        self.cell_in_bounds(cell) && !self.is_blocked(cell)
    }

    /// Iterate over obstacles of a given POI type.
    pub fn pois(&self, poi: PoiType) -> impl Iterator<Item = &Obstacle> {
        self.obstacles.iter().filter(move |o| o.poi == Some(poi))
    }

    /// The POI of the given type closest (Euclidean) to a position.
    pub fn nearest_poi(&self, poi: PoiType, from: &Position) -> Option<&Obstacle> {
        self.pois(poi)
            .min_by(|a, b| from.euclidean(&a.position).total_cmp(&from.euclidean(&b.position)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn poi(x: f64, y: f64, kind: PoiType) -> Obstacle {
        Obstacle {
            position: Position::new(x, y),
            poi: Some(kind),
            capacity: 2,
            blocking: false,
        }
    }

    #[test]
    fn zero_dimension_rejected() {
        assert!(Grid::new(0, 10).is_err());
        assert!(Grid::new(10, 0).is_err());
    }

    #[test]
    fn out_of_bounds_obstacle_rejected() {
        let mut grid = Grid::new(10, 10).unwrap();
        let result = grid.add_obstacle(poi(12.0, 3.0, PoiType::Stage));
        assert!(result.is_err());
        assert!(grid.obstacles().is_empty());
    }

    #[test]
    fn blocking_obstacle_indexed_by_cell() {
        let mut grid = Grid::new(10, 10).unwrap();
        grid.add_obstacle(Obstacle {
            position: Position::new(3.4, 7.9),
            poi: None,
            capacity: 0,
            blocking: true,
        })
        .unwrap();
        assert!(grid.is_blocked((3, 7)));
        assert!(!grid.is_walkable((3, 7)));
        assert!(grid.is_walkable((3, 6)));
    }

    #[test]
    fn nearest_poi_picks_closest() {
        let mut grid = Grid::new(20, 20).unwrap();
        grid.add_obstacle(poi(2.0, 2.0, PoiType::ChargingStation)).unwrap();
        grid.add_obstacle(poi(15.0, 15.0, PoiType::ChargingStation)).unwrap();
        let from = Position::new(14.0, 14.0);
        let nearest = grid.nearest_poi(PoiType::ChargingStation, &from).unwrap();
        assert_eq!(nearest.position, Position::new(15.0, 15.0));
    }

    #[test]
    fn nearest_poi_ignores_other_types() {
        let mut grid = Grid::new(20, 20).unwrap();
        grid.add_obstacle(poi(1.0, 1.0, PoiType::FoodStand)).unwrap();
        assert!(grid.nearest_poi(PoiType::MedicalTent, &Position::new(0.0, 0.0)).is_none());
    }

    #[test]
    fn zone_must_fit_inside_map() {
        let mut grid = Grid::new(10, 10).unwrap();
        assert!(grid.add_zone("west".to_owned(), Rect::new(0.0, 0.0, 5.0, 10.0)).is_ok());
        assert!(grid.add_zone("east".to_owned(), Rect::new(5.0, 0.0, 6.0, 10.0)).is_err());
    }
}
