//! JSON map-configuration loading.
//!
//! The map file is a structured record with `MapWidth`, `MapHeight`, a
//! list of zones (type, rectangle, minimum POI counts), and a list of POI
//! placements (type, position, capacity). Loading a map clears any prior
//! obstacles and instantiates one obstacle per POI entry; out-of-bounds
//! positions are fatal to the load operation, never to a running
//! simulation.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use skyguard_types::{Obstacle, PoiType, Position, Rect};
use tracing::info;

use crate::error::WorldError;
use crate::grid::Grid;

/// A zone rectangle in the map file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectConfig {
    /// Left edge.
    #[serde(rename = "X")]
    pub x: f64,
    /// Top edge.
    #[serde(rename = "Y")]
    pub y: f64,
    /// Width in cells.
    #[serde(rename = "Width")]
    pub width: f64,
    /// Height in cells.
    #[serde(rename = "Height")]
    pub height: f64,
}

/// A zone declaration: a typed rectangle with minimum POI counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Zone kind (free-form label, e.g. "stage", "camping").
    #[serde(rename = "Type")]
    pub kind: String,
    /// The zone rectangle.
    #[serde(rename = "Rect")]
    pub rect: RectConfig,
    /// Minimum number of POIs of each type the zone must contain.
    #[serde(rename = "MinPois", default)]
    pub min_pois: BTreeMap<PoiType, u32>,
}

/// A POI placement: type, position, capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiPlacement {
    /// POI category.
    #[serde(rename = "Type")]
    pub poi_type: PoiType,
    /// Horizontal position.
    #[serde(rename = "X")]
    pub x: f64,
    /// Vertical position.
    #[serde(rename = "Y")]
    pub y: f64,
    /// Capacity (e.g. docking slots for charging stations).
    #[serde(rename = "Capacity")]
    pub capacity: u32,
}

/// The map configuration record, loaded once at setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    /// Grid width in cells.
    #[serde(rename = "MapWidth")]
    pub width: u32,
    /// Grid height in cells.
    #[serde(rename = "MapHeight")]
    pub height: u32,
    /// Zone declarations.
    #[serde(rename = "Zones", default)]
    pub zones: Vec<ZoneConfig>,
    /// POI placements.
    #[serde(rename = "Pois", default)]
    pub pois: Vec<PoiPlacement>,
}

impl MapConfig {
    /// Load a map configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Io`] if the file cannot be read, or
    /// [`WorldError::Json`] if the content is not valid JSON.
    pub fn from_file(path: &Path) -> Result<Self, WorldError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse a map configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Json`] if the string is not valid JSON.
    pub fn parse(json: &str) -> Result<Self, WorldError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build a [`Grid`] from this configuration.
    ///
    /// Applies the whole record atomically: dimension check, zone
    /// rectangles, then one obstacle per POI entry. Any failure aborts the
    /// load with no partially-applied grid escaping to callers.
    ///
    /// # Errors
    ///
    /// Propagates [`WorldError::InvalidDimensions`],
    /// [`WorldError::ZoneOutOfBounds`], [`WorldError::OutOfBounds`], and
    /// [`WorldError::ZoneUnderProvisioned`].
    pub fn build_grid(&self) -> Result<Grid, WorldError> {
        let mut grid = Grid::new(self.width, self.height)?;

        for zone in &self.zones {
            grid.add_zone(
                zone.kind.clone(),
                Rect::new(zone.rect.x, zone.rect.y, zone.rect.width, zone.rect.height),
            )?;
        }

        for poi in &self.pois {
            grid.add_obstacle(Obstacle {
                position: Position::new(poi.x, poi.y),
                poi: Some(poi.poi_type),
                capacity: poi.capacity,
                // POIs are approachable; agents must dock at or queue on them.
                blocking: false,
            })?;
        }

        self.check_zone_minimums(&grid)?;

        info!(
            width = self.width,
            height = self.height,
            zones = self.zones.len(),
            pois = self.pois.len(),
            "map configuration applied"
        );
        Ok(grid)
    }

    /// Verify every zone meets its minimum POI counts.
    fn check_zone_minimums(&self, grid: &Grid) -> Result<(), WorldError> {
        for zone in &self.zones {
            let rect = Rect::new(zone.rect.x, zone.rect.y, zone.rect.width, zone.rect.height);
            for (poi_type, required) in &zone.min_pois {
                let actual = grid
                    .pois(*poi_type)
                    .filter(|o| rect.contains(&o.position))
                    .count();
                let actual = u32::try_from(actual).unwrap_or(u32::MAX);
                if actual < *required {
                    return Err(WorldError::ZoneUnderProvisioned {
                        zone: zone.kind.clone(),
                        poi: *poi_type,
                        required: *required,
                        actual,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "MapWidth": 20,
            "MapHeight": 10,
            "Zones": [
                {
                    "Type": "stage",
                    "Rect": { "X": 0, "Y": 0, "Width": 10, "Height": 10 },
                    "MinPois": { "medical_tent": 1 }
                }
            ],
            "Pois": [
                { "Type": "medical_tent", "X": 3, "Y": 4, "Capacity": 1 },
                { "Type": "charging_station", "X": 12, "Y": 5, "Capacity": 2 }
            ]
        }"#
    }

    #[test]
    fn parse_and_build() {
        let config = MapConfig::parse(sample_json()).unwrap();
        assert_eq!(config.width, 20);
        let grid = config.build_grid().unwrap();
        assert_eq!(grid.obstacles().len(), 2);
        assert_eq!(grid.zones().len(), 1);
    }

    #[test]
    fn out_of_bounds_poi_is_fatal() {
        let mut config = MapConfig::parse(sample_json()).unwrap();
        config.pois.push(PoiPlacement {
            poi_type: PoiType::Toilet,
            x: 25.0,
            y: 5.0,
            capacity: 1,
        });
        assert!(matches!(config.build_grid(), Err(WorldError::OutOfBounds { .. })));
    }

    #[test]
    fn missing_minimum_poi_is_fatal() {
        let mut config = MapConfig::parse(sample_json()).unwrap();
        config.zones.first_mut().unwrap().min_pois.insert(PoiType::ChargingStation, 1);
        // The only charging station is at x=12, outside the zone rect.
        assert!(matches!(
            config.build_grid(),
            Err(WorldError::ZoneUnderProvisioned { .. })
        ));
    }

    #[test]
    fn malformed_json_rejected() {
        assert!(matches!(MapConfig::parse("{"), Err(WorldError::Json { .. })));
    }
}
