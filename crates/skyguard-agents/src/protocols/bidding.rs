//! Protocol 3: bidding with backoff.
//!
//! An observer broadcasts an INTENT carrying its planned path length to
//! its direct peers, then listens for a wall-clock window. A strictly
//! shorter counter-intent (or a COMMIT) on the same person means backing
//! off; otherwise the observer broadcasts COMMIT and takes the claim.
//! Drones evaluating a person drop it the moment a COMMIT arrives.

use skyguard_types::{AgentRef, DroneId, PersonSighting};
use skyguard_world::Grid;
use tracing::{debug, info};

use crate::comms::DroneMessage;
use crate::drone::DroneState;
use crate::error::AgentError;

pub(crate) async fn step(drone: &mut DroneState, grid: &Grid) -> Result<(), AgentError> {
    if drone.assigned.is_some() {
        drone.evaluating = None;
        return Ok(());
    }

    // Stick with the person under evaluation if still valid, else scan.
    let target = drone
        .evaluating
        .and_then(|id| drone.visible_people.iter().find(|p| p.id == id))
        .or_else(|| {
            drone
                .visible_people
                .iter()
                .find(|p| p.in_distress && p.claimed_by.is_none())
        })
        .filter(|p| p.in_distress && p.claimed_by.is_none())
        .map(|p| PersonSighting {
            id: p.id,
            position: p.position,
        });

    let Some(sighting) = target else {
        drone.evaluating = None;
        if drone.objective.is_none() {
            drone.objective = Some(drone.random_objective(grid));
        }
        return Ok(());
    };

    let Some(own_len) = drone.planned_path_len(&sighting.position, grid) else {
        drone.evaluating = None;
        return Ok(());
    };

    drone.evaluating = Some(sighting.id);
    let peers: Vec<DroneId> = drone.peers.iter().map(|(id, _)| *id).collect();
    drone.hub.broadcast(
        &peers,
        &DroneMessage::Intent {
            person: sighting.id,
            position: sighting.position,
            path_len: own_len,
            sender: drone.id,
        },
    );

    if drone.await_counter_intents(sighting.id, own_len).await {
        debug!(drone = %drone.id, person = %sighting.id, "outbid; backing off");
        drone.evaluating = None;
        return Ok(());
    }

    drone.hub.broadcast(
        &peers,
        &DroneMessage::Commit {
            person: sighting.id,
            sender: drone.id,
        },
    );
    if drone
        .arbiter
        .request_claim(sighting.id, AgentRef::Drone(drone.id))
        .await?
    {
        info!(drone = %drone.id, person = %sighting.id, path_len = own_len, "bid won");
        drone.assigned = Some(sighting);
        drone.claim_held = true;
    } else {
        debug!(drone = %drone.id, person = %sighting.id, "bid won but claim lost");
    }
    drone.evaluating = None;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures::future::join_all;
    use skyguard_arbiter::spawn;
    use skyguard_types::{AllocationProtocol, Obstacle, PersonId, PoiType, Position};

    use crate::comms::CommsHub;
    use crate::config::DroneConfig;

    use super::*;

    fn open_grid() -> Grid {
        let mut grid = Grid::new(30, 30).unwrap();
        grid.add_obstacle(Obstacle {
            position: Position::new(15.0, 15.0),
            poi: Some(PoiType::MedicalTent),
            capacity: 1,
            blocking: false,
        })
        .unwrap();
        grid.add_obstacle(Obstacle {
            position: Position::new(1.0, 1.0),
            poi: Some(PoiType::ChargingStation),
            capacity: 4,
            blocking: false,
        })
        .unwrap();
        grid
    }

    #[tokio::test]
    async fn shorter_path_wins_within_window() {
        let grid = open_grid();
        let (arbiter, _task) = spawn(grid.clone());
        let hub = CommsHub::new();
        // Person at (10,10). Near drone is 5 steps away, far drone 7.
        let mut near = DroneState::new(
            DroneId::new(0),
            Position::new(10.0, 5.0),
            AllocationProtocol::Bidding,
            &hub,
            arbiter.clone(),
            DroneConfig::default(),
        );
        let mut far = DroneState::new(
            DroneId::new(1),
            Position::new(10.0, 17.0),
            AllocationProtocol::Bidding,
            &hub,
            arbiter.clone(),
            DroneConfig::default(),
        );
        for d in [&near, &far] {
            arbiter.register(AgentRef::Drone(d.id), d.position).await.unwrap();
        }
        let person = PersonId::new(0);
        arbiter
            .register(AgentRef::Person(person), Position::new(10.0, 10.0))
            .await
            .unwrap();
        arbiter.report_distress(person, true).await.unwrap();

        let snapshot = arbiter.snapshot().await.unwrap();
        for d in [&mut near, &mut far] {
            d.visible_people = snapshot.people.clone();
            d.peers = snapshot
                .drone_positions
                .iter()
                .filter(|(id, _)| *id != d.id)
                .copied()
                .collect();
        }

        // Both bid concurrently so the windows overlap.
        let results = join_all([step(&mut near, &grid), step(&mut far, &grid)]).await;
        for result in results {
            result.unwrap();
        }

        let snapshot = arbiter.snapshot().await.unwrap();
        assert_eq!(
            snapshot.person(person).unwrap().claimed_by,
            Some(AgentRef::Drone(DroneId::new(0)))
        );
        assert!(far.assigned.is_none());
    }

    #[tokio::test]
    async fn lone_bidder_commits_after_window() {
        let grid = open_grid();
        let (arbiter, _task) = spawn(grid.clone());
        let hub = CommsHub::new();
        let mut drone = DroneState::new(
            DroneId::new(0),
            Position::new(5.0, 5.0),
            AllocationProtocol::Bidding,
            &hub,
            arbiter.clone(),
            DroneConfig::default(),
        );
        arbiter.register(AgentRef::Drone(drone.id), drone.position).await.unwrap();
        let person = PersonId::new(0);
        arbiter
            .register(AgentRef::Person(person), Position::new(8.0, 8.0))
            .await
            .unwrap();
        arbiter.report_distress(person, true).await.unwrap();

        let snapshot = arbiter.snapshot().await.unwrap();
        drone.visible_people = snapshot.people.clone();
        step(&mut drone, &grid).await.unwrap();
        assert_eq!(drone.assigned.map(|s| s.id), Some(person));
    }
}
