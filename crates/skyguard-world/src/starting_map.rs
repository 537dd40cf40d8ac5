//! Default festival-ground map used when no map file is supplied.
//!
//! A 40 x 30 grid split into two zones (west stage field, east camping
//! field), each provisioned with a medical tent and a charging station so
//! every allocation protocol has the POIs it depends on.

use std::collections::BTreeMap;

use skyguard_types::PoiType;

use crate::map_config::{MapConfig, PoiPlacement, RectConfig, ZoneConfig};

/// Build the default map configuration.
pub fn default_map() -> MapConfig {
    let mut west_min = BTreeMap::new();
    west_min.insert(PoiType::MedicalTent, 1);
    west_min.insert(PoiType::ChargingStation, 1);
    let mut east_min = BTreeMap::new();
    east_min.insert(PoiType::MedicalTent, 1);
    east_min.insert(PoiType::ChargingStation, 1);

    MapConfig {
        width: 40,
        height: 30,
        zones: vec![
            ZoneConfig {
                kind: "stage_field".to_owned(),
                rect: RectConfig {
                    x: 0.0,
                    y: 0.0,
                    width: 20.0,
                    height: 30.0,
                },
                min_pois: west_min,
            },
            ZoneConfig {
                kind: "camping_field".to_owned(),
                rect: RectConfig {
                    x: 20.0,
                    y: 0.0,
                    width: 20.0,
                    height: 30.0,
                },
                min_pois: east_min,
            },
        ],
        pois: vec![
            poi(PoiType::Stage, 10.0, 4.0, 0),
            poi(PoiType::MedicalTent, 4.0, 15.0, 2),
            poi(PoiType::ChargingStation, 15.0, 25.0, 3),
            poi(PoiType::DrinkStand, 8.0, 20.0, 4),
            poi(PoiType::FoodStand, 12.0, 20.0, 4),
            poi(PoiType::Toilet, 2.0, 27.0, 4),
            poi(PoiType::MedicalTent, 33.0, 12.0, 2),
            poi(PoiType::ChargingStation, 25.0, 6.0, 3),
            poi(PoiType::RestArea, 30.0, 22.0, 8),
            poi(PoiType::Toilet, 38.0, 27.0, 4),
        ],
    }
}

/// Shorthand for a POI placement.
const fn poi(poi_type: PoiType, x: f64, y: f64, capacity: u32) -> PoiPlacement {
    PoiPlacement {
        poi_type,
        x,
        y,
        capacity,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_map_builds() {
        let grid = default_map().build_grid().unwrap();
        assert_eq!(grid.width(), 40);
        assert_eq!(grid.height(), 30);
        assert_eq!(grid.zones().len(), 2);
        assert_eq!(grid.pois(PoiType::MedicalTent).count(), 2);
        assert_eq!(grid.pois(PoiType::ChargingStation).count(), 2);
    }
}
