//! Protocol 4: zone dispatch.
//!
//! Zone drones never rescue anyone themselves. Each drone serpentine-
//! sweeps its rectangular watch zone, collects sighted distress cases in
//! a pending set, and gets the set to a rescue point: handed over
//! directly when a point is in comm range, transferred whole to a peer
//! that can reach one, or carried physically toward the nearest point as
//! a last resort.

use skyguard_rescue::RescuePointHandle;
use skyguard_types::{PersonSighting, Position};
use skyguard_world::Grid;
use tracing::{debug, info};

use crate::comms::DroneMessage;
use crate::drone::{DroneState, INTERACT_RANGE};
use crate::error::AgentError;

pub(crate) async fn step(
    drone: &mut DroneState,
    grid: &Grid,
    rescue_points: &[RescuePointHandle],
) -> Result<(), AgentError> {
    collect_sightings(drone);

    if drone.pending.is_empty() {
        drone.objective = Some(next_sweep_waypoint(drone, grid));
        return Ok(());
    }

    // A rescue point in comm range takes the cases one by one; a case
    // leaves the pending set only when its request is accepted.
    let in_range = rescue_points
        .iter()
        .find(|rp| rp.position().euclidean(&drone.position) <= drone.config.comm_range);
    if let Some(point) = in_range {
        let cases: Vec<PersonSighting> = drone.pending.drain(..).collect();
        for sighting in cases {
            let accepted = point
                .request_rescue(sighting.id, sighting.position, drone.id)
                .await?;
            if accepted {
                info!(drone = %drone.id, person = %sighting.id, point = %point.id(), "case handed to rescue point");
            } else {
                drone.pending.push(sighting);
            }
        }
        return Ok(());
    }

    // No point reachable: hand the whole set to a peer that can reach
    // one. The transfer is atomic; the set is cleared only on delivery.
    let courier = drone.peers.iter().find(|(_, position)| {
        rescue_points
            .iter()
            .any(|rp| rp.position().euclidean(position) <= drone.config.comm_range)
    });
    if let Some((peer, _)) = courier {
        let delivered = drone.hub.send(
            *peer,
            DroneMessage::TransferPending {
                people: drone.pending.clone(),
            },
        );
        if delivered {
            info!(drone = %drone.id, %peer, cases = drone.pending.len(), "pending set transferred");
            drone.pending.clear();
        } else {
            debug!(drone = %drone.id, %peer, "transfer failed; keeping the set");
        }
        return Ok(());
    }

    // Carry the set toward the nearest rescue point ourselves.
    if let Some(point) = rescue_points.iter().min_by(|a, b| {
        a.position()
            .euclidean(&drone.position)
            .total_cmp(&b.position().euclidean(&drone.position))
    }) {
        drone.objective = Some(point.position());
    }
    Ok(())
}

/// Add every visible distress case to the pending set.
fn collect_sightings(drone: &mut DroneState) {
    let new_cases: Vec<PersonSighting> = drone
        .visible_people
        .iter()
        .filter(|p| p.in_distress && !drone.pending.iter().any(|s| s.id == p.id))
        .map(|p| PersonSighting {
            id: p.id,
            position: p.position,
        })
        .collect();
    for sighting in new_cases {
        debug!(drone = %drone.id, person = %sighting.id, "distress case pending");
        drone.pending.push(sighting);
    }
}

/// The current serpentine waypoint, advancing the cursor when reached.
///
/// Columns are swept alternately downward and upward; after the last
/// column the cursor wraps to the zone's start corner.
fn next_sweep_waypoint(drone: &mut DroneState, grid: &Grid) -> Position {
    let Some(zone) = drone.zone else {
        // No zone configured: fall back to plain patrol.
        return drone.objective.unwrap_or_else(|| drone.random_objective(grid));
    };

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let columns = (zone.width.floor().max(1.0) as u32).max(1);
    let waypoint = sweep_waypoint(&zone, drone.sweep.leg);
    if drone.position.euclidean(&waypoint) > INTERACT_RANGE {
        return waypoint;
    }
    drone.sweep.leg = drone.sweep.leg.saturating_add(1);
    if drone.sweep.leg >= columns.saturating_mul(2) {
        drone.sweep.leg = 0;
    }
    sweep_waypoint(&zone, drone.sweep.leg)
}

fn sweep_waypoint(zone: &skyguard_types::Rect, leg: u32) -> Position {
    let column = leg / 2;
    let x = zone.x + f64::from(column) + 0.5;
    let top = zone.y + 0.5;
    let bottom = zone.y + zone.height - 0.5;
    // Even columns run top to bottom, odd columns bottom to top.
    let at_start = leg % 2 == 0;
    let y = if (column % 2 == 0) == at_start { top } else { bottom };
    Position::new(x, y)
}
