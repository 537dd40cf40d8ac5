//! Authoritative world state owned exclusively by the arbiter task.
//!
//! All mutation happens through the methods here, called one request at a
//! time by the service loop. No other task ever touches this state, which
//! is what makes every operation atomic from the callers' viewpoint.

use std::collections::{BTreeMap, BTreeSet};

use skyguard_types::{
    AgentRef, DroneId, PersonId, PersonSnapshot, PoiType, Position, SaveOutcome, WorldSnapshot,
};
use skyguard_world::Grid;
use tracing::debug;

/// Per-person authoritative record.
#[derive(Debug, Clone, Default)]
struct PersonRecord {
    in_distress: bool,
    treated: bool,
    dead: bool,
    claimed_by: Option<AgentRef>,
    gear_granted: bool,
}

/// A charging station's slot table.
#[derive(Debug, Clone)]
struct Station {
    capacity: u32,
    docked: BTreeSet<DroneId>,
}

/// The authoritative position/occupancy table plus per-resource grants.
#[derive(Debug)]
pub struct ArbiterState {
    grid: Grid,
    positions: BTreeMap<AgentRef, Position>,
    occupancy: BTreeMap<(i64, i64), Vec<AgentRef>>,
    people: BTreeMap<PersonId, PersonRecord>,
    stations: BTreeMap<(i64, i64), Station>,
}

impl ArbiterState {
    /// Build state over a loaded grid, indexing its charging stations.
    pub fn new(grid: Grid) -> Self {
        let stations = grid
            .pois(PoiType::ChargingStation)
            .map(|o| {
                (
                    o.position.cell(),
                    Station {
                        capacity: o.capacity,
                        docked: BTreeSet::new(),
                    },
                )
            })
            .collect();
        Self {
            grid,
            positions: BTreeMap::new(),
            occupancy: BTreeMap::new(),
            people: BTreeMap::new(),
            stations,
        }
    }

    /// The grid this arbiter governs.
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Place an agent on the grid at simulation setup (or rescuer spawn).
    ///
    /// Registering a person also creates its authoritative record.
    pub fn register_agent(&mut self, agent: AgentRef, position: Position) {
        self.positions.insert(agent, position);
        self.occupancy.entry(position.cell()).or_default().push(agent);
        if let AgentRef::Person(id) = agent {
            self.people.entry(id).or_default();
        }
    }

    /// Authorize and apply a move. Denies out-of-bounds targets and cells
    /// occupied by a blocking obstacle.
    ///
    /// On authorization the agent is removed from its old cell's occupancy
    /// list and inserted into the new cell's list before the reply is sent.
    pub fn authorize_move(&mut self, agent: AgentRef, target: Position) -> bool {
        if !target.in_bounds(self.grid.width(), self.grid.height()) {
            debug!(%agent, ?target, "move denied: out of bounds");
            return false;
        }
        if self.grid.is_blocked(target.cell()) {
            debug!(%agent, ?target, "move denied: blocking obstacle");
            return false;
        }
        if let Some(old) = self.positions.insert(agent, target) {
            if let Some(cell) = self.occupancy.get_mut(&old.cell()) {
                cell.retain(|a| *a != agent);
            }
        }
        self.occupancy.entry(target.cell()).or_default().push(agent);
        true
    }

    /// Authorize exclusive occupancy of a charging slot at the station
    /// nearest `position`. Denies when no station exists or all slots at
    /// the nearest one are taken.
    pub fn authorize_charge(&mut self, drone: DroneId, position: Position) -> bool {
        let Some(cell) = self
            .grid
            .nearest_poi(PoiType::ChargingStation, &position)
            .map(|o| o.position.cell())
        else {
            debug!(%drone, "charge denied: no charging station on map");
            return false;
        };
        let Some(station) = self.stations.get_mut(&cell) else {
            return false;
        };
        if station.docked.contains(&drone) {
            return true;
        }
        let occupied = u32::try_from(station.docked.len()).unwrap_or(u32::MAX);
        if occupied >= station.capacity {
            debug!(%drone, ?cell, capacity = station.capacity, "charge denied: no free slot");
            return false;
        }
        station.docked.insert(drone);
        true
    }

    /// Release the charging slot held by a drone, if any.
    pub fn release_charge(&mut self, drone: DroneId) {
        for station in self.stations.values_mut() {
            station.docked.remove(&drone);
        }
    }

    /// Grant the medical-gear flag to a drone, once per active rescue.
    ///
    /// Requires the drone to hold the claim for the person.
    pub fn authorize_medical(&mut self, person: PersonId, drone: DroneId) -> bool {
        let Some(record) = self.people.get_mut(&person) else {
            return false;
        };
        if record.dead || record.treated || record.gear_granted {
            return false;
        }
        if record.claimed_by != Some(AgentRef::Drone(drone)) {
            debug!(%person, %drone, "medical delivery denied: claim not held");
            return false;
        }
        record.gear_granted = true;
        true
    }

    /// The terminal rescue action: mark the person treated and release the
    /// assignment so no further agent acts on this rescue.
    pub fn authorize_save(&mut self, person: PersonId, savior: AgentRef) -> SaveOutcome {
        let Some(record) = self.people.get_mut(&person) else {
            return SaveOutcome::UnknownPerson;
        };
        if record.treated {
            return SaveOutcome::AlreadyHandled;
        }
        if record.dead {
            return SaveOutcome::PersonDead;
        }
        record.treated = true;
        record.in_distress = false;
        record.claimed_by = None;
        record.gear_granted = false;
        self.remove_from_grid(AgentRef::Person(person));
        debug!(%person, %savior, "person treated");
        SaveOutcome::Treated
    }

    /// Take (or re-affirm) the rescue claim for a person.
    ///
    /// At most one agent holds the claim at any time; the first request
    /// wins, the rest are denied until the claim is released.
    pub fn claim(&mut self, person: PersonId, owner: AgentRef) -> bool {
        let Some(record) = self.people.get_mut(&person) else {
            return false;
        };
        if record.dead || record.treated {
            return false;
        }
        match record.claimed_by {
            None => {
                record.claimed_by = Some(owner);
                true
            }
            Some(current) => current == owner,
        }
    }

    /// Release a claim, only if `owner` actually holds it.
    pub fn release_claim(&mut self, person: PersonId, owner: AgentRef) {
        if let Some(record) = self.people.get_mut(&person)
            && record.claimed_by == Some(owner)
        {
            record.claimed_by = None;
            record.gear_granted = false;
        }
    }

    /// Record a person's distress flag (ignored once removed).
    pub fn report_distress(&mut self, person: PersonId, active: bool) {
        if let Some(record) = self.people.get_mut(&person)
            && !record.dead
            && !record.treated
        {
            record.in_distress = active;
        }
    }

    /// Record a person's death: sentinel position, claim released.
    pub fn report_death(&mut self, person: PersonId) {
        if let Some(record) = self.people.get_mut(&person) {
            record.dead = true;
            record.in_distress = false;
            record.claimed_by = None;
            record.gear_granted = false;
        }
        self.remove_from_grid(AgentRef::Person(person));
        debug!(%person, "person removed (death)");
    }

    /// Assemble the read-only world view.
    pub fn snapshot(&self) -> WorldSnapshot {
        let people = self
            .people
            .iter()
            .map(|(id, record)| PersonSnapshot {
                id: *id,
                position: self
                    .positions
                    .get(&AgentRef::Person(*id))
                    .copied()
                    .unwrap_or(Position::SENTINEL),
                in_distress: record.in_distress,
                alive: !record.dead && !record.treated,
                treated: record.treated,
                claimed_by: record.claimed_by,
            })
            .collect();
        let drone_positions = self
            .positions
            .iter()
            .filter_map(|(agent, pos)| match agent {
                AgentRef::Drone(id) => Some((*id, *pos)),
                _ => None,
            })
            .collect();
        WorldSnapshot {
            people,
            drone_positions,
        }
    }

    /// Drop an agent from the occupancy table and park it at the sentinel.
    fn remove_from_grid(&mut self, agent: AgentRef) {
        if let Some(old) = self.positions.insert(agent, Position::SENTINEL)
            && let Some(cell) = self.occupancy.get_mut(&old.cell())
        {
            cell.retain(|a| *a != agent);
        }
    }
}
