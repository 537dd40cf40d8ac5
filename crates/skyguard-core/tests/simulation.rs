//! Cross-component integration tests for the assembled simulation.
//!
//! These drive a full world (arbiter, drones, crowd, rescue points)
//! through real ticks and check the system-wide invariants: exclusive
//! rescue claims, bounded batteries and positions, and terminal person
//! lifecycles.

// Integration tests use unwrap extensively for clarity -- panicking on
// failure is the correct behavior in test code.
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use futures::future::join_all;
use skyguard_agents::{CommsHub, DroneConfig, DroneState};
use skyguard_core::config::{FleetConfig, WorldConfig};
use skyguard_core::{Simulation, SimulationConfig};
use skyguard_types::{AgentRef, AllocationProtocol, DroneId, PersonId, Position};
use skyguard_world::default_map;

fn config(drones: u32, crowd: u32, protocol: u8) -> SimulationConfig {
    SimulationConfig {
        world: WorldConfig {
            seed: Some(1701),
            map_path: None,
        },
        fleet: FleetConfig {
            drone_count: drones,
            crowd_size: crowd,
            protocol,
        },
        ..SimulationConfig::default()
    }
}

async fn run_ticks(sim: &mut Simulation, ticks: u32) {
    for _ in 0..ticks {
        sim.update().await.unwrap();
    }
}

#[tokio::test]
async fn simultaneous_sightings_grant_exactly_one_claim() {
    // Two drones see the same person in the same snapshot and race their
    // turns concurrently; the arbiter must grant exactly one claim.
    let grid = default_map().build_grid().unwrap();
    let (arbiter, _task) = skyguard_arbiter::spawn(grid.clone());
    let hub = CommsHub::new();
    let mut left = DroneState::new(
        DroneId::new(0),
        Position::new(8.0, 10.0),
        AllocationProtocol::DirectClaim,
        &hub,
        arbiter.clone(),
        DroneConfig::default(),
    );
    let mut right = DroneState::new(
        DroneId::new(1),
        Position::new(12.0, 10.0),
        AllocationProtocol::DirectClaim,
        &hub,
        arbiter.clone(),
        DroneConfig::default(),
    );
    for drone in [&left, &right] {
        arbiter
            .register(AgentRef::Drone(drone.id), drone.position)
            .await
            .unwrap();
    }
    let person = PersonId::new(0);
    arbiter
        .register(AgentRef::Person(person), Position::new(10.0, 10.0))
        .await
        .unwrap();
    arbiter.report_distress(person, true).await.unwrap();

    let snapshot = arbiter.snapshot().await.unwrap();
    let turns = join_all([
        left.take_turn(&snapshot, &grid, &[]),
        right.take_turn(&snapshot, &grid, &[]),
    ])
    .await;
    for result in turns {
        result.unwrap();
    }

    let assignments = [left.assigned_person(), right.assigned_person()];
    assert_eq!(assignments.iter().flatten().count(), 1);
    let snapshot = arbiter.snapshot().await.unwrap();
    let owner = snapshot.person(person).unwrap().claimed_by.unwrap();
    let winner = if left.assigned_person().is_some() {
        left.id
    } else {
        right.id
    };
    assert_eq!(owner, AgentRef::Drone(winner));
}

#[tokio::test]
async fn batteries_and_positions_stay_bounded() {
    let mut sim = Simulation::new(config(5, 15, 1), &default_map()).await.unwrap();
    for _ in 0..40 {
        sim.update().await.unwrap();
        for drone in sim.drones() {
            assert!(drone.battery >= 0.0 && drone.battery <= 100.0);
            assert!(drone.position.in_bounds(40, 30));
        }
        for person in sim.people() {
            if person.alive && !person.treated {
                assert!(person.position.in_bounds(40, 30));
            } else {
                // Removed people sit at the sentinel.
                assert!(person.position.is_sentinel());
            }
        }
    }
}

#[tokio::test]
async fn person_lifecycle_is_terminal() {
    // A tiny crowd with aggressive malaise: once someone is treated or
    // dead, the flag never clears again.
    let mut base = config(4, 10, 1);
    base.person.base_malaise = 0.5;
    base.person.distress_lifespan = 15;
    let mut sim = Simulation::new(base, &default_map()).await.unwrap();

    let mut ever_treated: Vec<PersonId> = Vec::new();
    let mut ever_dead: Vec<PersonId> = Vec::new();
    for _ in 0..60 {
        sim.update().await.unwrap();
        for person in sim.people() {
            if person.treated && !ever_treated.contains(&person.id) {
                ever_treated.push(person.id);
            }
            if !person.alive && !person.treated && !ever_dead.contains(&person.id) {
                ever_dead.push(person.id);
            }
            if ever_treated.contains(&person.id) {
                assert!(person.treated);
            }
            if ever_dead.contains(&person.id) {
                assert!(!person.alive);
            }
        }
    }
    let stats = sim.stats();
    assert_eq!(
        stats.people_treated,
        u32::try_from(ever_treated.len()).unwrap()
    );
    assert_eq!(stats.people_dead, u32::try_from(ever_dead.len()).unwrap());
}

#[tokio::test]
async fn stats_track_fleet_and_crowd() {
    let mut sim = Simulation::new(config(3, 12, 2), &default_map()).await.unwrap();
    run_ticks(&mut sim, 5).await;
    let stats = sim.stats();
    assert_eq!(stats.people_total, 12);
    assert!(stats.average_battery > 0.0);
    assert!(stats.average_coverage > 0.0 && stats.average_coverage <= 1.0);
}

#[tokio::test]
async fn zone_dispatch_runs_without_direct_claims() {
    let mut sim = Simulation::new(config(4, 15, 4), &default_map()).await.unwrap();
    assert_eq!(sim.protocol(), AllocationProtocol::ZoneDispatch);
    run_ticks(&mut sim, 25).await;
    // Zone drones never claim; any claim present belongs to no drone.
    for person in sim.people() {
        assert!(person.claimed_by.is_none());
    }
}
