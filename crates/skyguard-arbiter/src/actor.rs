//! The Grid Arbiter service loop and its caller-side handle.
//!
//! One tokio task exclusively owns the [`ArbiterState`]; every other agent
//! interacts with it through [`ArbiterHandle`] request/response calls. The
//! loop answers each request before reading the next, which serializes all
//! position mutations and resource grants. Callers suspend exactly until
//! the single authoritative answer arrives; the loop never parks a request,
//! so no caller blocks indefinitely.

use skyguard_types::{AgentRef, DroneId, PersonId, Position, SaveOutcome, WorldSnapshot};
use skyguard_world::Grid;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::ArbiterError;
use crate::state::ArbiterState;

/// Depth of the arbiter request queue. Senders await when it fills, which
/// only back-pressures a burst; the loop drains continuously.
const REQUEST_QUEUE_DEPTH: usize = 64;

/// A request delivered to the arbiter loop, carrying its reply channel.
#[derive(Debug)]
pub enum ArbiterRequest {
    /// Authorize a movement to `target`.
    Move {
        /// The moving agent.
        agent: AgentRef,
        /// Requested position.
        target: Position,
        /// Authorization reply.
        reply: oneshot::Sender<bool>,
    },
    /// Authorize exclusive occupancy of a charging slot.
    Charge {
        /// The docking drone.
        drone: DroneId,
        /// Where the drone is docking.
        position: Position,
        /// Authorization reply.
        reply: oneshot::Sender<bool>,
    },
    /// Release a previously granted charging slot.
    ReleaseCharge {
        /// The departing drone.
        drone: DroneId,
    },
    /// Grant the medical-gear flag for an active rescue.
    MedicalDelivery {
        /// The person being rescued.
        person: PersonId,
        /// The drone collecting gear.
        drone: DroneId,
        /// Authorization reply.
        reply: oneshot::Sender<bool>,
    },
    /// The terminal rescue action.
    SavePerson {
        /// The person being saved.
        person: PersonId,
        /// The drone or rescuer performing the save.
        savior: AgentRef,
        /// Outcome reply.
        reply: oneshot::Sender<SaveOutcome>,
    },
    /// Take the rescue claim for a person.
    Claim {
        /// The person to claim.
        person: PersonId,
        /// The claiming agent (or the agent claimed on behalf of).
        owner: AgentRef,
        /// Authorization reply.
        reply: oneshot::Sender<bool>,
    },
    /// Release a rescue claim.
    ReleaseClaim {
        /// The claimed person.
        person: PersonId,
        /// The agent releasing; ignored unless it holds the claim.
        owner: AgentRef,
    },
    /// Record a person's distress flag.
    ReportDistress {
        /// The person.
        person: PersonId,
        /// Whether distress is active.
        active: bool,
    },
    /// Record a person's death.
    ReportDeath {
        /// The person.
        person: PersonId,
    },
    /// Place an agent at simulation setup or rescuer spawn.
    Register {
        /// The agent.
        agent: AgentRef,
        /// Initial position.
        position: Position,
    },
    /// Publish the read-only world view.
    Snapshot {
        /// Snapshot reply.
        reply: oneshot::Sender<WorldSnapshot>,
    },
}

/// Caller-side handle to the arbiter. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ArbiterHandle {
    tx: mpsc::Sender<ArbiterRequest>,
}

impl ArbiterHandle {
    /// Ask to move `agent` to `target`.
    pub async fn request_move(&self, agent: AgentRef, target: Position) -> Result<bool, ArbiterError> {
        let (reply, rx) = oneshot::channel();
        self.send(ArbiterRequest::Move { agent, target, reply }).await?;
        rx.await.map_err(|_err| ArbiterError::ServiceUnavailable)
    }

    /// Ask for a charging slot near `position`.
    pub async fn request_charge(
        &self,
        drone: DroneId,
        position: Position,
    ) -> Result<bool, ArbiterError> {
        let (reply, rx) = oneshot::channel();
        self.send(ArbiterRequest::Charge { drone, position, reply }).await?;
        rx.await.map_err(|_err| ArbiterError::ServiceUnavailable)
    }

    /// Give back a charging slot.
    pub async fn release_charge(&self, drone: DroneId) -> Result<(), ArbiterError> {
        self.send(ArbiterRequest::ReleaseCharge { drone }).await
    }

    /// Ask for the medical-gear grant for an active rescue.
    pub async fn request_medical_delivery(
        &self,
        person: PersonId,
        drone: DroneId,
    ) -> Result<bool, ArbiterError> {
        let (reply, rx) = oneshot::channel();
        self.send(ArbiterRequest::MedicalDelivery { person, drone, reply }).await?;
        rx.await.map_err(|_err| ArbiterError::ServiceUnavailable)
    }

    /// Perform the terminal save action for a person.
    pub async fn request_save_person(
        &self,
        person: PersonId,
        savior: AgentRef,
    ) -> Result<SaveOutcome, ArbiterError> {
        let (reply, rx) = oneshot::channel();
        self.send(ArbiterRequest::SavePerson { person, savior, reply }).await?;
        rx.await.map_err(|_err| ArbiterError::ServiceUnavailable)
    }

    /// Take the rescue claim for a person on behalf of `owner`.
    pub async fn request_claim(
        &self,
        person: PersonId,
        owner: AgentRef,
    ) -> Result<bool, ArbiterError> {
        let (reply, rx) = oneshot::channel();
        self.send(ArbiterRequest::Claim { person, owner, reply }).await?;
        rx.await.map_err(|_err| ArbiterError::ServiceUnavailable)
    }

    /// Release a rescue claim held by `owner`.
    pub async fn release_claim(&self, person: PersonId, owner: AgentRef) -> Result<(), ArbiterError> {
        self.send(ArbiterRequest::ReleaseClaim { person, owner }).await
    }

    /// Record a person's distress flag.
    pub async fn report_distress(&self, person: PersonId, active: bool) -> Result<(), ArbiterError> {
        self.send(ArbiterRequest::ReportDistress { person, active }).await
    }

    /// Record a person's death.
    pub async fn report_death(&self, person: PersonId) -> Result<(), ArbiterError> {
        self.send(ArbiterRequest::ReportDeath { person }).await
    }

    /// Place an agent on the grid.
    pub async fn register(&self, agent: AgentRef, position: Position) -> Result<(), ArbiterError> {
        self.send(ArbiterRequest::Register { agent, position }).await
    }

    /// Fetch the read-only world view.
    pub async fn snapshot(&self) -> Result<WorldSnapshot, ArbiterError> {
        let (reply, rx) = oneshot::channel();
        self.send(ArbiterRequest::Snapshot { reply }).await?;
        rx.await.map_err(|_err| ArbiterError::ServiceUnavailable)
    }

    async fn send(&self, request: ArbiterRequest) -> Result<(), ArbiterError> {
        self.tx
            .send(request)
            .await
            .map_err(|_err| ArbiterError::ServiceUnavailable)
    }
}

/// Spawn the arbiter task over a loaded grid.
///
/// The task runs until every handle is dropped.
pub fn spawn(grid: Grid) -> (ArbiterHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
    let mut state = ArbiterState::new(grid);
    let task = tokio::spawn(async move {
        info!("grid arbiter started");
        while let Some(request) = rx.recv().await {
            serve(&mut state, request);
        }
        info!("grid arbiter stopped (all handles dropped)");
    });
    (ArbiterHandle { tx }, task)
}

/// Apply one request and answer it. Replies whose receiver vanished are
/// ignored; the caller gave up, the state change stands.
fn serve(state: &mut ArbiterState, request: ArbiterRequest) {
    match request {
        ArbiterRequest::Move { agent, target, reply } => {
            let _ = reply.send(state.authorize_move(agent, target));
        }
        ArbiterRequest::Charge { drone, position, reply } => {
            let _ = reply.send(state.authorize_charge(drone, position));
        }
        ArbiterRequest::ReleaseCharge { drone } => state.release_charge(drone),
        ArbiterRequest::MedicalDelivery { person, drone, reply } => {
            let _ = reply.send(state.authorize_medical(person, drone));
        }
        ArbiterRequest::SavePerson { person, savior, reply } => {
            let _ = reply.send(state.authorize_save(person, savior));
        }
        ArbiterRequest::Claim { person, owner, reply } => {
            let _ = reply.send(state.claim(person, owner));
        }
        ArbiterRequest::ReleaseClaim { person, owner } => state.release_claim(person, owner),
        ArbiterRequest::ReportDistress { person, active } => state.report_distress(person, active),
        ArbiterRequest::ReportDeath { person } => state.report_death(person),
        ArbiterRequest::Register { agent, position } => state.register_agent(agent, position),
        ArbiterRequest::Snapshot { reply } => {
            let _ = reply.send(state.snapshot());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use skyguard_types::{Obstacle, PoiType};

    use super::*;

    fn test_grid() -> Grid {
        let mut grid = Grid::new(12, 12).unwrap();
        grid.add_obstacle(Obstacle {
            position: Position::new(6.0, 6.0),
            poi: Some(PoiType::ChargingStation),
            capacity: 1,
            blocking: false,
        })
        .unwrap();
        grid
    }

    #[tokio::test]
    async fn concurrent_claims_grant_exactly_one() {
        let (handle, _task) = spawn(test_grid());
        let person = PersonId::new(0);
        handle.register(AgentRef::Person(person), Position::new(3.0, 3.0)).await.unwrap();

        let mut granted = 0;
        let mut tasks = Vec::new();
        for i in 0..8_u32 {
            let h = handle.clone();
            tasks.push(tokio::spawn(async move {
                h.request_claim(person, AgentRef::Drone(DroneId::new(i))).await.unwrap()
            }));
        }
        for task in tasks {
            if task.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 1);
    }

    #[tokio::test]
    async fn every_request_is_answered() {
        let (handle, _task) = spawn(test_grid());
        let drone = DroneId::new(0);
        handle.register(AgentRef::Drone(drone), Position::new(0.0, 0.0)).await.unwrap();
        assert!(handle.request_move(AgentRef::Drone(drone), Position::new(1.0, 1.0)).await.unwrap());
        assert!(handle.request_charge(drone, Position::new(6.0, 6.0)).await.unwrap());
        handle.release_charge(drone).await.unwrap();
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.drone_positions.len(), 1);
    }

    #[tokio::test]
    async fn save_races_resolve_to_single_winner() {
        let (handle, _task) = spawn(test_grid());
        let person = PersonId::new(4);
        handle.register(AgentRef::Person(person), Position::new(2.0, 2.0)).await.unwrap();
        handle.report_distress(person, true).await.unwrap();

        let a = handle
            .request_save_person(person, AgentRef::Drone(DroneId::new(0)))
            .await
            .unwrap();
        let b = handle
            .request_save_person(person, AgentRef::Rescuer(skyguard_types::RescuerId::new(0)))
            .await
            .unwrap();
        assert_eq!(a, SaveOutcome::Treated);
        assert_eq!(b, SaveOutcome::AlreadyHandled);
    }
}
