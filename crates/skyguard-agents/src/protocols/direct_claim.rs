//! Protocol 1: direct claim.
//!
//! The first drone to see an unclaimed person in distress claims them,
//! provided its battery covers the whole round trip (tent, person,
//! charger). No coordination beyond the arbiter's claim layer; losers of
//! a claim race simply keep patrolling.

use skyguard_types::{AgentRef, PersonSighting};
use skyguard_world::Grid;
use tracing::info;

use crate::drone::{DroneState, rescue_cost};
use crate::error::AgentError;

pub(crate) async fn step(drone: &mut DroneState, grid: &Grid) -> Result<(), AgentError> {
    if drone.assigned.is_some() {
        return Ok(());
    }

    let candidates: Vec<PersonSighting> = drone
        .visible_people
        .iter()
        .filter(|p| p.in_distress && p.claimed_by.is_none())
        .map(|p| PersonSighting {
            id: p.id,
            position: p.position,
        })
        .collect();

    for sighting in candidates {
        let Some(cost) = rescue_cost(
            &drone.position,
            &sighting.position,
            grid,
            drone.config.battery_drain,
        ) else {
            continue;
        };
        if drone.battery <= cost {
            continue;
        }
        if drone
            .arbiter
            .request_claim(sighting.id, AgentRef::Drone(drone.id))
            .await?
        {
            info!(drone = %drone.id, person = %sighting.id, "direct claim granted");
            drone.assigned = Some(sighting);
            drone.claim_held = true;
            return Ok(());
        }
        // Lost the race; try the next sighting.
    }

    if drone.objective.is_none() {
        drone.objective = Some(drone.random_objective(grid));
    }
    Ok(())
}
