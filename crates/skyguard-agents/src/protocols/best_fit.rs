//! Protocol 2: best fit.
//!
//! The observer collects the transitive peer set over the comm-range
//! adjacency graph (multi-hop peers count) and ranks every candidate,
//! itself included, by the Manhattan round trip via the medical tent
//! nearest the candidate. Ties go to the lowest drone id. The observer
//! claims on the winner's behalf and, when the winner is a peer, sends
//! an assignment message; a busy winner hands the claim back on receipt.

use std::collections::BTreeSet;

use skyguard_types::{AgentRef, DroneId, PersonSighting, Position, WorldSnapshot};
use skyguard_world::Grid;
use tracing::{debug, info, warn};

use crate::comms::{DroneMessage, reachable_peers};
use crate::drone::{DroneState, rescue_cost, round_trip_via_tent};
use crate::error::AgentError;

pub(crate) async fn step(
    drone: &mut DroneState,
    snapshot: &WorldSnapshot,
    grid: &Grid,
) -> Result<(), AgentError> {
    if drone.assigned.is_none() {
        let candidate = drone
            .visible_people
            .iter()
            .find(|p| p.in_distress && p.claimed_by.is_none())
            .map(|p| PersonSighting {
                id: p.id,
                position: p.position,
            });
        if let Some(sighting) = candidate {
            allocate(drone, snapshot, grid, sighting).await?;
        }
    }

    if drone.assigned.is_none() && drone.objective.is_none() {
        drone.objective = Some(drone.random_objective(grid));
    }
    Ok(())
}

/// Rank the connected fleet and hand the person to the best candidate.
async fn allocate(
    drone: &mut DroneState,
    snapshot: &WorldSnapshot,
    grid: &Grid,
    sighting: PersonSighting,
) -> Result<(), AgentError> {
    // Drones already holding a claim are busy; the snapshot names them.
    let busy: BTreeSet<DroneId> = snapshot
        .people
        .iter()
        .filter_map(|p| match p.claimed_by {
            Some(AgentRef::Drone(id)) => Some(id),
            _ => None,
        })
        .collect();

    let mut pool: Vec<(DroneId, Position)> =
        reachable_peers(drone.id, &snapshot.drone_positions, drone.config.comm_range);
    pool.push((drone.id, drone.position));
    pool.retain(|(id, _)| {
        if busy.contains(id) {
            return false;
        }
        if *id == drone.id {
            // Peer batteries are not broadcast; the observer at least
            // rules itself out when it cannot fly the whole trip.
            return rescue_cost(
                &drone.position,
                &sighting.position,
                grid,
                drone.config.battery_drain,
            )
            .is_some_and(|cost| drone.battery > cost);
        }
        true
    });

    let winner = pool
        .iter()
        .filter_map(|(id, position)| {
            round_trip_via_tent(position, &sighting.position, grid).map(|trip| (trip, *id))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let Some((trip, winner_id)) = winner else {
        return Ok(());
    };

    // Claim in the winner's name so the person is locked before the
    // assignment message is even delivered.
    if !drone
        .arbiter
        .request_claim(sighting.id, AgentRef::Drone(winner_id))
        .await?
    {
        debug!(drone = %drone.id, person = %sighting.id, "best-fit claim lost");
        return Ok(());
    }

    if winner_id == drone.id {
        info!(drone = %drone.id, person = %sighting.id, trip, "best fit: taking the rescue myself");
        drone.assigned = Some(sighting);
        drone.claim_held = true;
    } else {
        let delivered = drone.hub.send(
            winner_id,
            DroneMessage::Assign {
                person: sighting.id,
                position: sighting.position,
            },
        );
        if delivered {
            info!(drone = %drone.id, winner = %winner_id, person = %sighting.id, trip, "best fit: assigning peer");
        } else {
            // The winner will never learn of the claim made in its name;
            // give it back so the person stays claimable.
            warn!(drone = %drone.id, winner = %winner_id, person = %sighting.id, "assignment undeliverable; releasing claim");
            drone
                .arbiter
                .release_claim(sighting.id, AgentRef::Drone(winner_id))
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use skyguard_arbiter::spawn;
    use skyguard_types::{AllocationProtocol, Obstacle, PersonId, PoiType};

    use crate::comms::CommsHub;
    use crate::config::DroneConfig;

    use super::*;

    fn rescue_grid() -> Grid {
        let mut grid = Grid::new(40, 40).unwrap();
        grid.add_obstacle(Obstacle {
            position: Position::new(20.0, 20.0),
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

    fn fleet(
        arbiter: &skyguard_arbiter::ArbiterHandle,
        hub: &CommsHub,
        positions: &[(f64, f64)],
    ) -> Vec<DroneState> {
        positions
            .iter()
            .enumerate()
            .map(|(i, (x, y))| {
                DroneState::new(
                    DroneId::new(u32::try_from(i).unwrap()),
                    Position::new(*x, *y),
                    AllocationProtocol::BestFit,
                    hub,
                    arbiter.clone(),
                    DroneConfig::default(),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn closer_peer_wins_the_assignment() {
        let grid = rescue_grid();
        let (arbiter, _task) = spawn(grid.clone());
        let hub = CommsHub::new();
        // Drone 0 observes; drone 1 sits next to the tent, clearly better.
        let mut drones = fleet(&arbiter, &hub, &[(28.0, 28.0), (21.0, 21.0)]);
        for d in &drones {
            arbiter.register(AgentRef::Drone(d.id), d.position).await.unwrap();
        }
        let person = PersonId::new(0);
        arbiter
            .register(AgentRef::Person(person), Position::new(24.0, 24.0))
            .await
            .unwrap();
        arbiter.report_distress(person, true).await.unwrap();

        let snapshot = arbiter.snapshot().await.unwrap();
        let observer = drones.first_mut().unwrap();
        observer.visible_people = snapshot.people.clone();
        step(observer, &snapshot, &grid).await.unwrap();

        // Observer did not take it; the claim is in drone 1's name.
        assert!(observer.assigned.is_none());
        let snapshot = arbiter.snapshot().await.unwrap();
        assert_eq!(
            snapshot.person(person).unwrap().claimed_by,
            Some(AgentRef::Drone(DroneId::new(1)))
        );

        // Drone 1 picks the assignment out of its mailbox on its turn.
        let winner = drones.get_mut(1).unwrap();
        winner.take_turn(&snapshot, &grid, &[]).await.unwrap();
        assert_eq!(winner.assigned_person().map(|s| s.id), Some(person));
    }

    #[tokio::test]
    async fn tie_breaks_on_lowest_id() {
        let grid = rescue_grid();
        let (arbiter, _task) = spawn(grid.clone());
        let hub = CommsHub::new();
        // Drones 1 and 2 are mirror images around the tent; drone 0 far.
        let mut drones = fleet(&arbiter, &hub, &[(28.0, 28.0), (18.0, 20.0), (22.0, 20.0)]);
        for d in &drones {
            arbiter.register(AgentRef::Drone(d.id), d.position).await.unwrap();
        }
        let person = PersonId::new(0);
        arbiter
            .register(AgentRef::Person(person), Position::new(20.0, 24.0))
            .await
            .unwrap();
        arbiter.report_distress(person, true).await.unwrap();

        let snapshot = arbiter.snapshot().await.unwrap();
        let observer = drones.first_mut().unwrap();
        observer.visible_people = snapshot.people.clone();
        step(observer, &snapshot, &grid).await.unwrap();

        let snapshot = arbiter.snapshot().await.unwrap();
        assert_eq!(
            snapshot.person(person).unwrap().claimed_by,
            Some(AgentRef::Drone(DroneId::new(1)))
        );
    }

    #[tokio::test]
    async fn undeliverable_assignment_releases_the_claim() {
        let grid = rescue_grid();
        let (arbiter, _task) = spawn(grid.clone());
        let hub = CommsHub::new();
        let mut drones = fleet(&arbiter, &hub, &[(28.0, 28.0), (21.0, 21.0)]);
        for d in &drones {
            arbiter.register(AgentRef::Drone(d.id), d.position).await.unwrap();
        }
        let person = PersonId::new(0);
        arbiter
            .register(AgentRef::Person(person), Position::new(24.0, 24.0))
            .await
            .unwrap();
        arbiter.report_distress(person, true).await.unwrap();

        // Jam the winner's mailbox so the assignment cannot be delivered.
        for _ in 0..40 {
            hub.send(
                DroneId::new(1),
                DroneMessage::Commit {
                    person: PersonId::new(99),
                    sender: DroneId::new(0),
                },
            );
        }

        let snapshot = arbiter.snapshot().await.unwrap();
        let observer = drones.first_mut().unwrap();
        observer.visible_people = snapshot.people.clone();
        step(observer, &snapshot, &grid).await.unwrap();

        // The claim made in the winner's name is handed straight back;
        // the person stays claimable by anyone else.
        let snapshot = arbiter.snapshot().await.unwrap();
        assert_eq!(snapshot.person(person).unwrap().claimed_by, None);
        assert!(
            arbiter
                .request_claim(person, AgentRef::Drone(DroneId::new(2)))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn busy_peer_is_skipped() {
        let grid = rescue_grid();
        let (arbiter, _task) = spawn(grid.clone());
        let hub = CommsHub::new();
        let mut drones = fleet(&arbiter, &hub, &[(28.0, 28.0), (21.0, 21.0)]);
        for d in &drones {
            arbiter.register(AgentRef::Drone(d.id), d.position).await.unwrap();
        }
        // Drone 1 would win on distance but is mid-rescue on someone else.
        let other = PersonId::new(5);
        arbiter
            .register(AgentRef::Person(other), Position::new(19.0, 19.0))
            .await
            .unwrap();
        arbiter.report_distress(other, true).await.unwrap();
        assert!(
            arbiter
                .request_claim(other, AgentRef::Drone(DroneId::new(1)))
                .await
                .unwrap()
        );

        let person = PersonId::new(0);
        arbiter
            .register(AgentRef::Person(person), Position::new(24.0, 24.0))
            .await
            .unwrap();
        arbiter.report_distress(person, true).await.unwrap();

        let snapshot = arbiter.snapshot().await.unwrap();
        let observer = drones.first_mut().unwrap();
        observer.visible_people = snapshot.people.clone();
        step(observer, &snapshot, &grid).await.unwrap();

        // With drone 1 out of the pool the observer takes it itself.
        assert_eq!(observer.assigned_person().map(|s| s.id), Some(person));
        let snapshot = arbiter.snapshot().await.unwrap();
        assert_eq!(
            snapshot.person(person).unwrap().claimed_by,
            Some(AgentRef::Drone(DroneId::new(0)))
        );
    }
}
