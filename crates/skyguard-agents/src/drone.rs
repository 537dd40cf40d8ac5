//! The drone decision engine.
//!
//! A drone's tick is a fixed pipeline: perceive from the world snapshot,
//! drain the mailbox, battery management (which pre-empts everything
//! else), one allocation-protocol step, then act on the current
//! assignment or objective. Movement is always authorized through the
//! grid arbiter; the drone trusts the answer, never its own bookkeeping.

use std::collections::VecDeque;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use skyguard_arbiter::ArbiterHandle;
use skyguard_rescue::RescuePointHandle;
use skyguard_types::{
    AgentRef, AllocationProtocol, DroneId, PersonId, PersonSighting, PersonSnapshot, PoiType,
    Position, Rect, SaveOutcome, WorldSnapshot,
};
use skyguard_world::{Grid, find_path, find_path_jittered};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::comms::{CommsHub, DroneMessage, direct_peers};
use crate::config::DroneConfig;
use crate::error::AgentError;
use crate::protocols;

/// Distance within which a drone can interact with a cell-sized target
/// (dock, collect gear, deliver aid).
pub(crate) const INTERACT_RANGE: f64 = 1.5;

/// Serpentine sweep cursor for the zone-dispatch protocol.
///
/// A watch zone of `n` columns has `2n` legs (each column has a top and
/// a bottom waypoint, alternating direction per column); the cursor
/// wraps back to the start corner after the last leg.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SweepCursor {
    /// Current leg index in `0..2n`.
    pub leg: u32,
}

/// One drone's complete mutable state.
#[derive(Debug)]
pub struct DroneState {
    /// The drone's id.
    pub id: DroneId,
    /// Current position.
    pub position: Position,
    /// Battery charge, 0 to 100.
    pub battery: f64,
    /// Whether the drone is docked and charging.
    pub charging: bool,
    /// Whether the drone is carrying medical gear for its assignment.
    pub has_medical_gear: bool,
    /// The allocation protocol this drone runs.
    pub protocol: AllocationProtocol,
    /// The watch zone, set for zone-dispatch drones at setup.
    pub zone: Option<Rect>,

    pub(crate) assigned: Option<PersonSighting>,
    pub(crate) claim_held: bool,
    pub(crate) objective: Option<Position>,
    pub(crate) path: VecDeque<Position>,
    pub(crate) path_goal: Option<(i64, i64)>,
    pub(crate) visible_people: Vec<PersonSnapshot>,
    pub(crate) peers: Vec<(DroneId, Position)>,
    pub(crate) evaluating: Option<PersonId>,
    pub(crate) pending: Vec<PersonSighting>,
    pub(crate) sweep: SweepCursor,
    pub(crate) deferred: Vec<DroneMessage>,
    pub(crate) resume_threshold: f64,
    pending_releases: Vec<PersonId>,

    inbox: mpsc::Receiver<DroneMessage>,
    pub(crate) hub: CommsHub,
    pub(crate) arbiter: ArbiterHandle,
    pub(crate) config: DroneConfig,
    pub(crate) rng: SmallRng,
}

impl DroneState {
    /// Create a drone at full battery, with its mailbox opened on `hub`.
    #[must_use]
    pub fn new(
        id: DroneId,
        position: Position,
        protocol: AllocationProtocol,
        hub: &CommsHub,
        arbiter: ArbiterHandle,
        config: DroneConfig,
    ) -> Self {
        let inbox = hub.register(id);
        Self {
            id,
            position,
            battery: 100.0,
            charging: false,
            has_medical_gear: false,
            protocol,
            zone: None,
            assigned: None,
            claim_held: false,
            objective: None,
            path: VecDeque::new(),
            path_goal: None,
            visible_people: Vec::new(),
            peers: Vec::new(),
            evaluating: None,
            pending: Vec::new(),
            sweep: SweepCursor::default(),
            deferred: Vec::new(),
            resume_threshold: 100.0,
            pending_releases: Vec::new(),
            inbox,
            hub: hub.clone(),
            arbiter,
            config,
            rng: SmallRng::from_rng(&mut rand::rng()),
        }
    }

    /// The person currently assigned to this drone, if any.
    #[must_use]
    pub const fn assigned_person(&self) -> Option<PersonSighting> {
        self.assigned
    }

    /// Advance the drone by one tick.
    pub async fn take_turn(
        &mut self,
        snapshot: &WorldSnapshot,
        grid: &Grid,
        rescue_points: &[RescuePointHandle],
    ) -> Result<(), AgentError> {
        if self.battery <= 0.0 && !self.charging {
            // Grounded; hand any held claim back so the rest of the
            // fleet can retake the rescue, then sit out the turn.
            self.abandon_assignment().await?;
            return Ok(());
        }

        self.perceive(snapshot).await?;
        self.drain_inbox(grid);
        for person in std::mem::take(&mut self.pending_releases) {
            self.arbiter
                .release_claim(person, AgentRef::Drone(self.id))
                .await?;
        }

        if self.manage_battery(grid).await? {
            return Ok(());
        }

        match self.protocol {
            AllocationProtocol::DirectClaim => protocols::direct_claim::step(self, grid).await?,
            AllocationProtocol::BestFit => protocols::best_fit::step(self, snapshot, grid).await?,
            AllocationProtocol::Bidding => protocols::bidding::step(self, grid).await?,
            AllocationProtocol::ZoneDispatch => {
                protocols::zone_dispatch::step(self, grid, rescue_points).await?;
            }
        }

        if self.assigned.is_some() {
            self.advance_rescue(grid).await?;
        } else if let Some(objective) = self.objective {
            self.fly_toward(objective, grid).await?;
            if self.position.euclidean(&objective) <= INTERACT_RANGE {
                self.objective = None;
            }
        }
        Ok(())
    }

    /// Refresh the cached view of the world from this tick's snapshot.
    async fn perceive(&mut self, snapshot: &WorldSnapshot) -> Result<(), AgentError> {
        self.visible_people = snapshot
            .people
            .iter()
            .filter(|p| {
                p.alive
                    && !p.treated
                    && !p.position.is_sentinel()
                    && self.position.euclidean(&p.position) <= self.config.see_range
            })
            .copied()
            .collect();
        self.peers = direct_peers(
            self.id,
            &self.position,
            &snapshot.drone_positions,
            self.config.comm_range,
        );

        // Keep pending sightings honest: forget anyone the snapshot says
        // no longer needs help.
        self.pending.retain(|s| {
            snapshot
                .person(s.id)
                .is_some_and(|p| p.alive && !p.treated && p.in_distress)
        });

        // Track or drop the assignment against the authoritative record.
        if let Some(sighting) = self.assigned {
            match snapshot.person(sighting.id) {
                Some(p) if p.alive && !p.treated => {
                    self.assigned = Some(PersonSighting {
                        id: p.id,
                        position: p.position,
                    });
                }
                _ => {
                    debug!(drone = %self.id, person = %sighting.id, "assignment lapsed");
                    self.abandon_assignment().await?;
                }
            }
        }
        Ok(())
    }

    /// Process every message waiting in the mailbox without blocking.
    fn drain_inbox(&mut self, grid: &Grid) {
        let mut messages: Vec<DroneMessage> = self.deferred.drain(..).collect();
        while let Ok(message) = self.inbox.try_recv() {
            messages.push(message);
        }
        for message in messages {
            self.handle_message(message, grid);
        }
    }

    fn handle_message(&mut self, message: DroneMessage, grid: &Grid) {
        match message {
            DroneMessage::Assign { person, position } => {
                if self.assigned.is_none() {
                    // The requester already claimed on our behalf.
                    self.assigned = Some(PersonSighting { id: person, position });
                    self.claim_held = true;
                    info!(drone = %self.id, %person, "assignment accepted");
                } else {
                    debug!(drone = %self.id, %person, "assignment refused: already busy");
                    // The requester claimed in our name; give it back.
                    self.pending_releases.push(person);
                }
            }
            DroneMessage::Commit { person, sender } => {
                if self.evaluating == Some(person) {
                    debug!(drone = %self.id, %person, winner = %sender, "dropping evaluation on commit");
                    self.evaluating = None;
                }
            }
            DroneMessage::Intent {
                person,
                position,
                path_len,
                sender,
            } => {
                // Answer only if this drone is contesting the same person.
                let contesting =
                    self.evaluating == Some(person) || self.assigned.is_some_and(|s| s.id == person);
                if !contesting {
                    return;
                }
                if self.assigned.is_some_and(|s| s.id == person) {
                    self.hub.send(sender, DroneMessage::Commit { person, sender: self.id });
                } else if let Some(own_len) = self.planned_path_len(&position, grid)
                    && own_len < path_len
                {
                    self.hub.send(
                        sender,
                        DroneMessage::Intent {
                            person,
                            position,
                            path_len: own_len,
                            sender: self.id,
                        },
                    );
                }
            }
            DroneMessage::TransferPending { people } => {
                for sighting in people {
                    if !self.pending.iter().any(|s| s.id == sighting.id) {
                        self.pending.push(sighting);
                    }
                }
            }
        }
    }

    /// Charging logic: top up when docked, pre-empt the task pipeline
    /// when the battery dips to the return reserve.
    ///
    /// Returns `true` when battery management consumed the turn.
    async fn manage_battery(&mut self, grid: &Grid) -> Result<bool, AgentError> {
        if self.charging {
            self.battery = (self.battery + self.config.charge_rate).min(100.0);
            if self.battery >= self.resume_threshold {
                self.arbiter.release_charge(self.id).await?;
                self.charging = false;
                info!(drone = %self.id, battery = self.battery, "charged; resuming duty");
            }
            return Ok(true);
        }

        let Some(station) = grid.nearest_poi(PoiType::ChargingStation, &self.position) else {
            return Ok(false);
        };
        let station_position = station.position;
        let reserve = self.position.euclidean(&station_position) * self.config.battery_drain
            + self.config.reserve_margin;
        if self.battery > reserve {
            return Ok(false);
        }

        if self.position.euclidean(&station_position) <= INTERACT_RANGE {
            if self.arbiter.request_charge(self.id, station_position).await? {
                self.charging = true;
                self.resume_threshold = self.rng.random_range(80.0..100.0);
                info!(drone = %self.id, battery = self.battery, "docked for charging");
            } else {
                // Station full; hold nearby and retry next tick.
                debug!(drone = %self.id, "charging slot denied; waiting");
            }
        } else {
            self.fly_toward(station_position, grid).await?;
        }
        Ok(true)
    }

    /// Drive the assigned rescue forward: claim, gear, deliver.
    async fn advance_rescue(&mut self, grid: &Grid) -> Result<(), AgentError> {
        let Some(sighting) = self.assigned else {
            return Ok(());
        };

        if !self.claim_held {
            if self.arbiter.request_claim(sighting.id, AgentRef::Drone(self.id)).await? {
                self.claim_held = true;
            } else {
                debug!(drone = %self.id, person = %sighting.id, "claim lost; standing down");
                self.clear_assignment();
                return Ok(());
            }
        }

        if !self.has_medical_gear {
            let Some(tent) = grid.nearest_poi(PoiType::MedicalTent, &self.position) else {
                warn!(drone = %self.id, "no medical tent on map; abandoning rescue");
                self.abandon_assignment().await?;
                return Ok(());
            };
            let tent_position = tent.position;
            if self.position.euclidean(&tent_position) <= INTERACT_RANGE {
                if self.arbiter.request_medical_delivery(sighting.id, self.id).await? {
                    self.has_medical_gear = true;
                } else {
                    self.abandon_assignment().await?;
                }
            } else {
                self.fly_toward(tent_position, grid).await?;
            }
            return Ok(());
        }

        if self.position.euclidean(&sighting.position) <= INTERACT_RANGE {
            let outcome = self
                .arbiter
                .request_save_person(sighting.id, AgentRef::Drone(self.id))
                .await?;
            match outcome {
                SaveOutcome::Treated => {
                    info!(drone = %self.id, person = %sighting.id, "person treated");
                }
                other => {
                    debug!(drone = %self.id, person = %sighting.id, ?other, "save not completed");
                }
            }
            self.clear_assignment();
        } else {
            self.fly_toward(sighting.position, grid).await?;
        }
        Ok(())
    }

    /// Drop the assignment and give the claim back to the arbiter.
    async fn abandon_assignment(&mut self) -> Result<(), AgentError> {
        if let Some(sighting) = self.assigned
            && self.claim_held
        {
            self.arbiter
                .release_claim(sighting.id, AgentRef::Drone(self.id))
                .await?;
        }
        self.clear_assignment();
        Ok(())
    }

    fn clear_assignment(&mut self) {
        self.assigned = None;
        self.claim_held = false;
        self.has_medical_gear = false;
        self.path.clear();
        self.path_goal = None;
    }

    /// Move one speed-step along the planned path toward `target`.
    ///
    /// The path is recomputed when the target cell changes; if the
    /// pathfinder fails (blocked or budget exhausted) the drone falls
    /// back to a greedy straight-line step. A denied move discards the
    /// plan so the next tick replans.
    pub(crate) async fn fly_toward(&mut self, target: Position, grid: &Grid) -> Result<(), AgentError> {
        if self.path_goal != Some(target.cell()) {
            // Jittered waypoints keep co-located drones off identical points.
            match find_path_jittered(&self.position, &target, grid, &mut self.rng) {
                Ok(mut path) => {
                    if path.first().is_some_and(|p| p.cell() == self.position.cell()) {
                        path.remove(0);
                    }
                    self.path = path.into();
                    self.path_goal = Some(target.cell());
                }
                Err(err) => {
                    debug!(drone = %self.id, %err, "pathfinding failed; flying direct");
                    self.path.clear();
                    self.path_goal = Some(target.cell());
                }
            }
        }

        let waypoint = self.path.front().copied().unwrap_or(target);
        let next = self.position.step_toward(&waypoint, self.config.speed);
        if self.arbiter.request_move(AgentRef::Drone(self.id), next).await? {
            let travelled = self.position.euclidean(&next);
            self.position = next;
            self.battery = (self.battery - travelled * self.config.battery_drain).max(0.0);
            if self.position.euclidean(&waypoint) <= 0.1 {
                self.path.pop_front();
            }
        } else {
            self.path.clear();
            self.path_goal = None;
        }
        Ok(())
    }

    /// Pick a fresh random in-bounds patrol objective.
    pub(crate) fn random_objective(&mut self, grid: &Grid) -> Position {
        Position::new(
            self.rng.random_range(0.0..f64::from(grid.width())),
            self.rng.random_range(0.0..f64::from(grid.height())),
        )
    }

    /// The drone's planned path length in steps to a target, if a path
    /// exists within budget.
    pub(crate) fn planned_path_len(&self, target: &Position, grid: &Grid) -> Option<f64> {
        find_path(&self.position, target, grid)
            .ok()
            .map(|path| skyguard_world::path_steps(&path))
    }

    /// Wait out the bidding window, watching the mailbox for a strictly
    /// better counter-intent or a commit on the contested person.
    ///
    /// Returns `true` if this drone was beaten. Unrelated messages are
    /// deferred to the next tick's drain.
    pub(crate) async fn await_counter_intents(&mut self, person: PersonId, own_len: f64) -> bool {
        let window = self.config.bid_window();
        let listen = async {
            while let Some(message) = self.inbox.recv().await {
                match message {
                    DroneMessage::Intent {
                        person: p,
                        path_len,
                        ..
                    } if p == person && path_len < own_len => return true,
                    DroneMessage::Commit { person: p, .. } if p == person => return true,
                    other => self.deferred.push(other),
                }
            }
            false
        };
        (tokio::time::timeout(window, listen).await).unwrap_or(false)
    }
}

/// Estimated battery cost of a full rescue flown from `from`: out to the
/// nearest medical tent, on to the person, then to the charger nearest
/// the person. Manhattan distances, matching the coarse planning the
/// protocols do before committing.
pub(crate) fn rescue_cost(from: &Position, person: &Position, grid: &Grid, drain: f64) -> Option<f64> {
    let tent = grid.nearest_poi(PoiType::MedicalTent, from)?;
    let charger = grid.nearest_poi(PoiType::ChargingStation, person)?;
    let distance = from.manhattan(&tent.position)
        + tent.position.manhattan(person)
        + person.manhattan(&charger.position);
    Some(distance * drain)
}

/// The Manhattan round trip used to rank best-fit candidates: candidate
/// to the tent nearest it, then tent to the person.
pub(crate) fn round_trip_via_tent(from: &Position, person: &Position, grid: &Grid) -> Option<f64> {
    let tent = grid.nearest_poi(PoiType::MedicalTent, from)?;
    Some(from.manhattan(&tent.position) + tent.position.manhattan(person))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use skyguard_types::Obstacle;

    use super::*;

    fn test_grid() -> Grid {
        let mut grid = Grid::new(20, 20).unwrap();
        grid.add_obstacle(Obstacle {
            position: Position::new(2.0, 2.0),
            poi: Some(PoiType::MedicalTent),
            capacity: 1,
            blocking: false,
        })
        .unwrap();
        grid.add_obstacle(Obstacle {
            position: Position::new(17.0, 17.0),
            poi: Some(PoiType::ChargingStation),
            capacity: 2,
            blocking: false,
        })
        .unwrap();
        grid
    }

    fn test_drone(grid: &Grid, battery: f64) -> (DroneState, ArbiterHandle) {
        let (arbiter, _task) = skyguard_arbiter::spawn(grid.clone());
        let hub = CommsHub::new();
        let mut drone = DroneState::new(
            DroneId::new(0),
            Position::new(10.0, 10.0),
            AllocationProtocol::DirectClaim,
            &hub,
            arbiter.clone(),
            DroneConfig::default(),
        );
        drone.battery = battery;
        (drone, arbiter)
    }

    #[tokio::test]
    async fn low_battery_preempts_everything() {
        let grid = test_grid();
        let (mut drone, arbiter) = test_drone(&grid, 5.0);
        arbiter
            .register(AgentRef::Drone(drone.id), drone.position)
            .await
            .unwrap();
        let before = drone.position;
        let snapshot = arbiter.snapshot().await.unwrap();
        drone.take_turn(&snapshot, &grid, &[]).await.unwrap();
        // The drone heads for the charger instead of patrolling.
        let station = Position::new(17.0, 17.0);
        assert!(drone.position.euclidean(&station) < before.euclidean(&station));
        assert!(drone.assigned.is_none());
    }

    #[tokio::test]
    async fn charging_tops_up_and_releases_at_threshold() {
        let grid = test_grid();
        let (mut drone, arbiter) = test_drone(&grid, 50.0);
        arbiter
            .register(AgentRef::Drone(drone.id), drone.position)
            .await
            .unwrap();
        drone.charging = true;
        drone.resume_threshold = 58.0;

        let snapshot = arbiter.snapshot().await.unwrap();
        drone.take_turn(&snapshot, &grid, &[]).await.unwrap();
        assert!(drone.battery > 50.0);
        assert!(drone.charging);

        // A few more ticks cross the threshold; stop at the undocking
        // tick, before patrol flight starts draining the battery again.
        for _ in 0..3 {
            let snapshot = arbiter.snapshot().await.unwrap();
            drone.take_turn(&snapshot, &grid, &[]).await.unwrap();
            if !drone.charging {
                break;
            }
        }
        assert!(!drone.charging);
        assert!(drone.battery >= 58.0);
    }

    #[tokio::test]
    async fn flight_drains_battery_monotonically() {
        let grid = test_grid();
        let (mut drone, arbiter) = test_drone(&grid, 90.0);
        arbiter
            .register(AgentRef::Drone(drone.id), drone.position)
            .await
            .unwrap();
        let mut last = drone.battery;
        for _ in 0..5 {
            drone.fly_toward(Position::new(1.0, 10.0), &grid).await.unwrap();
            assert!(drone.battery < last);
            last = drone.battery;
        }
    }

    #[tokio::test]
    async fn assignment_lapses_when_person_is_treated() {
        let grid = test_grid();
        let (mut drone, arbiter) = test_drone(&grid, 90.0);
        arbiter
            .register(AgentRef::Drone(drone.id), drone.position)
            .await
            .unwrap();
        let person = PersonId::new(3);
        arbiter
            .register(AgentRef::Person(person), Position::new(12.0, 12.0))
            .await
            .unwrap();
        arbiter.report_distress(person, true).await.unwrap();
        drone.assigned = Some(PersonSighting {
            id: person,
            position: Position::new(12.0, 12.0),
        });
        drone.claim_held = true;

        // Someone else treats the person.
        arbiter
            .request_save_person(person, AgentRef::Rescuer(skyguard_types::RescuerId::new(0)))
            .await
            .unwrap();
        let snapshot = arbiter.snapshot().await.unwrap();
        drone.take_turn(&snapshot, &grid, &[]).await.unwrap();
        assert!(drone.assigned.is_none());
        assert!(!drone.claim_held);
    }

    #[tokio::test]
    async fn grounded_drone_releases_its_claim() {
        let grid = test_grid();
        let (mut drone, arbiter) = test_drone(&grid, 0.0);
        arbiter
            .register(AgentRef::Drone(drone.id), drone.position)
            .await
            .unwrap();
        let person = PersonId::new(6);
        arbiter
            .register(AgentRef::Person(person), Position::new(12.0, 12.0))
            .await
            .unwrap();
        arbiter.report_distress(person, true).await.unwrap();
        assert!(
            arbiter
                .request_claim(person, AgentRef::Drone(drone.id))
                .await
                .unwrap()
        );
        drone.assigned = Some(PersonSighting {
            id: person,
            position: Position::new(12.0, 12.0),
        });
        drone.claim_held = true;

        // A dead battery parks the drone; the claim must not stay parked
        // with it.
        let snapshot = arbiter.snapshot().await.unwrap();
        drone.take_turn(&snapshot, &grid, &[]).await.unwrap();
        assert!(drone.assigned.is_none());
        let snapshot = arbiter.snapshot().await.unwrap();
        assert!(snapshot.person(person).unwrap().claimed_by.is_none());
    }
}
