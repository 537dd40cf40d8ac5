//! Core entity structs and read-only snapshot types.
//!
//! Snapshot types are the boundary consumed by GUI / CLI / orchestration
//! collaborators: plain serializable data with no behavior.

use serde::{Deserialize, Serialize};

use crate::enums::PoiType;
use crate::geometry::Position;
use crate::ids::{AgentRef, DroneId, PersonId};

/// An immovable point occupying a grid cell.
///
/// Obstacles are created at map-load time and never mutated afterwards.
/// An obstacle may be plain scenery (`poi == None`) or a point of
/// interest with a capacity (e.g. docking slots of a charging station).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Grid position of the obstacle.
    pub position: Position,
    /// Point-of-interest category, if any.
    pub poi: Option<PoiType>,
    /// Capacity of the point of interest (slots, queue places).
    pub capacity: u32,
    /// Whether agents are denied movement into this cell.
    pub blocking: bool,
}

/// Behavioral profile of a crowd member, fixed at spawn time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BehaviorProfile {
    /// Movement speed in cells per tick.
    pub speed: f64,
    /// Resistance to malaise in `[0, 1]`; higher means fewer emergencies.
    pub malaise_resistance: f64,
    /// Probability per tick of heading for a point of interest.
    pub poi_interest: f64,
    /// Preferred distance kept from other persons, in cells.
    pub personal_space: f64,
}

/// A drone's record of where it last saw a person.
///
/// Rescue requests and zone-dispatch pending sets carry this lightweight
/// snapshot instead of a live reference to the person.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersonSighting {
    /// The sighted person.
    pub id: PersonId,
    /// The person's position at sighting time.
    pub position: Position,
}

/// Read-only view of a single person, as published by the arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersonSnapshot {
    /// The person's id.
    pub id: PersonId,
    /// Current position (the sentinel once removed).
    pub position: Position,
    /// Whether the person is currently in distress.
    pub in_distress: bool,
    /// Whether the person is still part of the simulation.
    pub alive: bool,
    /// Whether the person was successfully treated.
    pub treated: bool,
    /// The agent currently holding the rescue claim, if any.
    pub claimed_by: Option<AgentRef>,
}

/// Read-only view of a single drone, for the external boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DroneSnapshot {
    /// The drone's id.
    pub id: DroneId,
    /// Current position.
    pub position: Position,
    /// Battery level in `[0, 100]`.
    pub battery: f64,
    /// Whether the drone is docked at a charging station.
    pub charging: bool,
    /// Whether the drone currently carries medical gear.
    pub has_medical_gear: bool,
}

/// The authoritative world view published by the arbiter each tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// All person records, dead or alive.
    pub people: Vec<PersonSnapshot>,
    /// Positions of all drones as last authorized by the arbiter.
    pub drone_positions: Vec<(DroneId, Position)>,
}

impl WorldSnapshot {
    /// Look up a person record by id.
    pub fn person(&self, id: PersonId) -> Option<&PersonSnapshot> {
        self.people.iter().find(|p| p.id == id)
    }
}

/// Aggregate statistics exposed to the external boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldStats {
    /// Total persons ever spawned.
    pub people_total: u32,
    /// Persons currently in distress.
    pub people_in_distress: u32,
    /// Persons successfully treated.
    pub people_treated: u32,
    /// Persons who died untreated.
    pub people_dead: u32,
    /// Mean battery level across the fleet.
    pub average_battery: f64,
    /// Mean fraction of the grid covered by one drone's sensors.
    pub average_coverage: f64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_person_lookup() {
        let snapshot = WorldSnapshot {
            people: vec![PersonSnapshot {
                id: PersonId::new(2),
                position: Position::new(1.0, 1.0),
                in_distress: true,
                alive: true,
                treated: false,
                claimed_by: None,
            }],
            drone_positions: Vec::new(),
        };
        assert!(snapshot.person(PersonId::new(2)).is_some());
        assert!(snapshot.person(PersonId::new(3)).is_none());
    }

    #[test]
    fn obstacle_roundtrip_serde() {
        let obstacle = Obstacle {
            position: Position::new(4.0, 2.0),
            poi: Some(PoiType::ChargingStation),
            capacity: 3,
            blocking: true,
        };
        let json = serde_json::to_string(&obstacle).unwrap();
        let restored: Obstacle = serde_json::from_str(&json).unwrap();
        assert_eq!(obstacle, restored);
    }
}
