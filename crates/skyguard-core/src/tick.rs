//! The simulation: world assembly and the per-tick driver.
//!
//! `Simulation` owns every live part of the system: the grid, the
//! arbiter task, the drone fleet, the crowd, and the rescue point
//! network. One call to [`Simulation::update`] advances exactly one
//! tick through a fixed phase order: person turns, world snapshot,
//! drone turns (concurrent, so protocol messages flow within the tick),
//! rescue point updates, statistics.

use futures::future::join_all;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use skyguard_agents::CommsHub;
use skyguard_agents::drone::DroneState;
use skyguard_agents::person::Person;
use skyguard_arbiter::ArbiterHandle;
use skyguard_types::{
    AgentRef, AllocationProtocol, BehaviorProfile, DroneId, DroneSnapshot, Obstacle, PersonId,
    PersonSnapshot, PoiType, Position, Rect, RescuePointId, WorldSnapshot, WorldStats,
};
use skyguard_world::{Grid, MapConfig};
use skyguard_rescue::{RescuePointHandle, RescuePointSpec, spawn_network};
use tracing::info;

use crate::clock::SimClock;
use crate::config::SimulationConfig;
use crate::error::CoreError;

/// The assembled world: everything that is rebuilt when the map or the
/// population changes.
struct WorldParts {
    arbiter: ArbiterHandle,
    drones: Vec<DroneState>,
    people: Vec<Person>,
    rescue_points: Vec<RescuePointHandle>,
}

/// The running simulation.
pub struct Simulation {
    clock: SimClock,
    config: SimulationConfig,
    protocol: AllocationProtocol,
    grid: Grid,
    arbiter: ArbiterHandle,
    drones: Vec<DroneState>,
    people: Vec<Person>,
    rescue_points: Vec<RescuePointHandle>,
    last_snapshot: WorldSnapshot,
    stats: WorldStats,
}

impl Simulation {
    /// Assemble a simulation from configuration and a map layout.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownProtocol`] for a protocol index
    /// outside 1 through 4, or a world error if the map fails to build.
    pub async fn new(config: SimulationConfig, map: &MapConfig) -> Result<Self, CoreError> {
        let grid = map.build_grid()?;
        let protocol = AllocationProtocol::from_index(config.fleet.protocol)
            .ok_or(CoreError::UnknownProtocol {
                index: config.fleet.protocol,
            })?;
        let parts = assemble(&config, &grid, protocol).await?;
        info!(
            drones = config.fleet.drone_count,
            crowd = config.fleet.crowd_size,
            protocol = protocol.index(),
            "simulation assembled"
        );
        Ok(Self {
            clock: SimClock::new(),
            config,
            protocol,
            grid,
            arbiter: parts.arbiter,
            drones: parts.drones,
            people: parts.people,
            rescue_points: parts.rescue_points,
            last_snapshot: WorldSnapshot::default(),
            stats: WorldStats::default(),
        })
    }

    /// Advance the simulation by exactly one tick.
    pub async fn update(&mut self) -> Result<(), CoreError> {
        let tick = self.clock.advance()?;

        // Person turns, concurrently, against the start-of-tick view.
        let opening = self.arbiter.snapshot().await?;
        let grid = &self.grid;
        let person_turns = self.people.iter_mut().map(|p| p.take_turn(&opening, grid));
        for result in join_all(person_turns).await {
            result?;
        }

        // Fresh snapshot for drone perception, then the drone turns run
        // concurrently so mailbox traffic (intents, assignments) flows
        // within the tick.
        let snapshot = self.arbiter.snapshot().await?;
        let points = self.rescue_points.as_slice();
        let drone_turns = self
            .drones
            .iter_mut()
            .map(|d| d.take_turn(&snapshot, grid, points));
        for result in join_all(drone_turns).await {
            result?;
        }

        // Rescue points move their rescuers.
        for result in join_all(self.rescue_points.iter().map(RescuePointHandle::tick)).await {
            result?;
        }

        self.last_snapshot = self.arbiter.snapshot().await?;
        self.stats = self.compute_stats();
        if tick.checked_rem(100) == Some(0) {
            info!(tick, stats = ?self.stats, "progress");
        }
        Ok(())
    }

    /// The current tick number.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.clock.tick()
    }

    /// The active allocation protocol.
    #[must_use]
    pub const fn protocol(&self) -> AllocationProtocol {
        self.protocol
    }

    /// Read-only view of the drone fleet.
    #[must_use]
    pub fn drones(&self) -> Vec<DroneSnapshot> {
        self.drones
            .iter()
            .map(|d| DroneSnapshot {
                id: d.id,
                position: d.position,
                battery: d.battery,
                charging: d.charging,
                has_medical_gear: d.has_medical_gear,
            })
            .collect()
    }

    /// Read-only view of every person record, from the latest snapshot.
    #[must_use]
    pub fn people(&self) -> &[PersonSnapshot] {
        &self.last_snapshot.people
    }

    /// The obstacle table of the loaded map.
    #[must_use]
    pub fn obstacles(&self) -> &[Obstacle] {
        self.grid.obstacles()
    }

    /// Aggregate statistics as of the last completed tick.
    #[must_use]
    pub const fn stats(&self) -> WorldStats {
        self.stats
    }

    /// Switch every drone to another allocation protocol.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownProtocol`] for an index outside 1-4.
    pub fn set_protocol(&mut self, index: u8) -> Result<(), CoreError> {
        let protocol =
            AllocationProtocol::from_index(index).ok_or(CoreError::UnknownProtocol { index })?;
        self.protocol = protocol;
        self.config.fleet.protocol = index;
        for drone in &mut self.drones {
            drone.protocol = protocol;
        }
        info!(protocol = index, "allocation protocol switched");
        Ok(())
    }

    /// Resize the drone fleet. Rebuilds the world.
    ///
    /// # Errors
    ///
    /// Propagates arbiter errors from re-registering agents.
    pub async fn set_drone_count(&mut self, count: u32) -> Result<(), CoreError> {
        self.config.fleet.drone_count = count;
        self.reassemble().await
    }

    /// Resize the crowd. Rebuilds the world.
    ///
    /// # Errors
    ///
    /// Propagates arbiter errors from re-registering agents.
    pub async fn set_crowd_size(&mut self, size: u32) -> Result<(), CoreError> {
        self.config.fleet.crowd_size = size;
        self.reassemble().await
    }

    /// Replace the map layout and rebuild the world on it.
    ///
    /// A layout that fails to build (out-of-bounds POI, under-provisioned
    /// zone) is rejected without touching the running world.
    ///
    /// # Errors
    ///
    /// Returns the world error that rejected the layout.
    pub async fn load_map(&mut self, map: &MapConfig) -> Result<(), CoreError> {
        let grid = map.build_grid()?;
        self.grid = grid;
        self.reassemble().await
    }

    /// Tear down and rebuild every live part on the current grid.
    async fn reassemble(&mut self) -> Result<(), CoreError> {
        let parts = assemble(&self.config, &self.grid, self.protocol).await?;
        self.arbiter = parts.arbiter;
        self.drones = parts.drones;
        self.people = parts.people;
        self.rescue_points = parts.rescue_points;
        self.last_snapshot = WorldSnapshot::default();
        self.stats = WorldStats::default();
        Ok(())
    }

    fn compute_stats(&self) -> WorldStats {
        let people = &self.last_snapshot.people;
        let in_distress = people
            .iter()
            .filter(|p| p.alive && !p.treated && p.in_distress)
            .count();
        let treated = people.iter().filter(|p| p.treated).count();
        // Treated people also read as not-alive in the snapshot; dead
        // means removed without treatment.
        let dead = people.iter().filter(|p| !p.alive && !p.treated).count();

        let (average_battery, average_coverage) = if self.drones.is_empty() {
            (0.0, 0.0)
        } else {
            let fleet = f64::from(saturating_u32(self.drones.len()));
            let battery_sum: f64 = self.drones.iter().map(|d| d.battery).sum();
            let area = f64::from(self.grid.width()) * f64::from(self.grid.height());
            let see = self.config.drone.see_range;
            let per_drone = (std::f64::consts::PI * see * see / area).min(1.0);
            (battery_sum / fleet, per_drone)
        };

        WorldStats {
            people_total: saturating_u32(people.len()),
            people_in_distress: saturating_u32(in_distress),
            people_treated: saturating_u32(treated),
            people_dead: saturating_u32(dead),
            average_battery,
            average_coverage,
        }
    }
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Build arbiter, rescue network, fleet, and crowd on a grid.
async fn assemble(
    config: &SimulationConfig,
    grid: &Grid,
    protocol: AllocationProtocol,
) -> Result<WorldParts, CoreError> {
    let (arbiter, _task) = skyguard_arbiter::spawn(grid.clone());
    let mut rng = config
        .world
        .seed
        .map_or_else(|| SmallRng::from_rng(&mut rand::rng()), SmallRng::seed_from_u64);

    // One rescue point per declared zone, standing at the zone center;
    // a map without zones gets a single point at the grid center.
    let mut specs: Vec<RescuePointSpec> = grid
        .zones()
        .iter()
        .enumerate()
        .map(|(i, zone)| RescuePointSpec {
            id: RescuePointId::new(saturating_u32(i)),
            position: zone.rect.center(),
        })
        .collect();
    if specs.is_empty() {
        specs.push(RescuePointSpec {
            id: RescuePointId::new(0),
            position: Position::new(
                f64::from(grid.width()) / 2.0,
                f64::from(grid.height()) / 2.0,
            ),
        });
    }
    let rescue_points = spawn_network(&specs, &arbiter, &config.rescue.to_point_config());

    let hub = CommsHub::new();
    let stations: Vec<Position> = grid
        .pois(PoiType::ChargingStation)
        .map(|o| o.position)
        .collect();
    let fallback = Position::new(
        f64::from(grid.width()) / 2.0,
        f64::from(grid.height()) / 2.0,
    );

    let drone_count = config.fleet.drone_count;
    let strip = f64::from(grid.width()) / f64::from(drone_count.max(1));
    let mut drones = Vec::new();
    for i in 0..drone_count {
        let id = DroneId::new(i);
        let position = usize::try_from(i)
            .ok()
            .and_then(|i| i.checked_rem(stations.len().max(1)))
            .and_then(|slot| stations.get(slot))
            .copied()
            .unwrap_or(fallback);
        let mut drone = DroneState::new(
            id,
            position,
            protocol,
            &hub,
            arbiter.clone(),
            config.drone.clone(),
        );
        // Watch zones are vertical strips; only the zone-dispatch
        // protocol reads them.
        drone.zone = Some(Rect::new(
            f64::from(i) * strip,
            0.0,
            strip,
            f64::from(grid.height()),
        ));
        arbiter.register(AgentRef::Drone(id), position).await?;
        drones.push(drone);
    }

    let mut people = Vec::new();
    for i in 0..config.fleet.crowd_size {
        let id = PersonId::new(i);
        let position = random_walkable(&mut rng, grid);
        let profile = BehaviorProfile {
            speed: rng.random_range(0.7..1.3),
            malaise_resistance: rng.random_range(0.0..0.9),
            poi_interest: rng.random_range(0.0..0.2),
            personal_space: rng.random_range(1.0..2.0),
        };
        arbiter.register(AgentRef::Person(id), position).await?;
        people.push(Person::new(
            id,
            position,
            profile,
            arbiter.clone(),
            config.person.clone(),
        ));
    }

    Ok(WorldParts {
        arbiter,
        drones,
        people,
        rescue_points,
    })
}

/// Draw a random non-blocked position, falling back to the grid center
/// after a bounded number of tries.
fn random_walkable(rng: &mut SmallRng, grid: &Grid) -> Position {
    for _ in 0..32 {
        let candidate = Position::new(
            rng.random_range(0.0..f64::from(grid.width())),
            rng.random_range(0.0..f64::from(grid.height())),
        );
        if grid.is_walkable(candidate.cell()) {
            return candidate;
        }
    }
    Position::new(
        f64::from(grid.width()) / 2.0,
        f64::from(grid.height()) / 2.0,
    )
}
