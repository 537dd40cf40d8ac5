//! Rescue point actors: zone-local dispatchers owning rescuer pools.
//!
//! Each rescue point runs four always-on service loops reading from
//! distinct channels: direct rescue requests, requests forwarded from
//! sibling points, "is this person already being rescued here" probes,
//! and the per-tick rescuer motion update. A panic in any loop is
//! isolated and the loop is restarted after a short backoff, preserving
//! the other three.
//!
//! The active-mission set is a [`DashMap`] because it is read by the
//! probe loop while the request/forward/update loops insert and remove
//! entries; everything else is touched by exactly one owning loop.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use skyguard_arbiter::ArbiterHandle;
use skyguard_types::{
    AgentRef, DroneId, PersonId, PersonSighting, Position, RescuePointId, RescuerId, SaveOutcome,
};
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::error::RescueError;
use crate::rescuer::Rescuer;

/// Delay before a panicked service loop is restarted.
const RESTART_BACKOFF: Duration = Duration::from_millis(50);

/// Depth of each rescue-point service channel.
const QUEUE_DEPTH: usize = 16;

/// Tunables for rescue points and their rescuers.
#[derive(Debug, Clone)]
pub struct RescuePointConfig {
    /// Rescuer ground speed in cells per tick.
    pub rescuer_speed: f64,
    /// Upper bound on waiting for the arbiter's save answer.
    pub save_timeout: Duration,
}

impl Default for RescuePointConfig {
    fn default() -> Self {
        Self {
            rescuer_speed: 1.0,
            save_timeout: Duration::from_millis(250),
        }
    }
}

/// Where a rescue point should be stood up.
#[derive(Debug, Clone, Copy)]
pub struct RescuePointSpec {
    /// The point's id (unique, used for forwarding tie-breaks).
    pub id: RescuePointId,
    /// The point's fixed position.
    pub position: Position,
}

/// A rescue request as carried on the direct and forwarded channels.
#[derive(Debug)]
pub(crate) struct RescueRequest {
    person: PersonId,
    position: Position,
    sender: DroneId,
    forwarded: bool,
    reply: oneshot::Sender<bool>,
}

/// A mission probe from a sibling rescue point.
#[derive(Debug)]
pub(crate) struct ProbeRequest {
    person: PersonId,
    reply: oneshot::Sender<bool>,
}

/// Internal command asking the update loop to dispatch a rescuer.
#[derive(Debug)]
struct AssignCommand {
    sighting: PersonSighting,
    reply: oneshot::Sender<bool>,
}

/// Per-tick drive command for the rescuer update loop.
#[derive(Debug)]
struct TickCommand {
    reply: oneshot::Sender<()>,
}

/// Caller-side handle to one rescue point. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RescuePointHandle {
    id: RescuePointId,
    position: Position,
    requests: mpsc::Sender<RescueRequest>,
    forwards: mpsc::Sender<RescueRequest>,
    probes: mpsc::Sender<ProbeRequest>,
    ticks: mpsc::Sender<TickCommand>,
}

impl RescuePointHandle {
    /// The rescue point's id.
    pub const fn id(&self) -> RescuePointId {
        self.id
    }

    /// The rescue point's fixed position.
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Submit a rescue request for a sighted person.
    ///
    /// Returns `true` once a rescuer has been dispatched (possibly by a
    /// sibling point after one forwarding hop), `false` if the person is
    /// already being rescued somewhere.
    pub async fn request_rescue(
        &self,
        person: PersonId,
        position: Position,
        sender: DroneId,
    ) -> Result<bool, RescueError> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(RescueRequest {
                person,
                position,
                sender,
                forwarded: false,
                reply,
            })
            .await
            .map_err(|_err| RescueError::ServiceUnavailable)?;
        rx.await.map_err(|_err| RescueError::ServiceUnavailable)
    }

    /// Advance this point's rescuers by one tick.
    pub async fn tick(&self) -> Result<(), RescueError> {
        let (reply, rx) = oneshot::channel();
        self.ticks
            .send(TickCommand { reply })
            .await
            .map_err(|_err| RescueError::ServiceUnavailable)?;
        rx.await.map_err(|_err| RescueError::ServiceUnavailable)
    }

    /// Ask whether this point has an active mission for the person.
    pub(crate) async fn is_person_being_rescued(
        &self,
        person: PersonId,
    ) -> Result<bool, RescueError> {
        let (reply, rx) = oneshot::channel();
        self.probes
            .send(ProbeRequest { person, reply })
            .await
            .map_err(|_err| RescueError::ServiceUnavailable)?;
        rx.await.map_err(|_err| RescueError::ServiceUnavailable)
    }

    /// Hand a request over after the closest-point computation.
    pub(crate) async fn forward(&self, request: RescueRequest) -> Result<(), RescueError> {
        self.forwards
            .send(request)
            .await
            .map_err(|_err| RescueError::ServiceUnavailable)
    }
}

/// Shared state of one rescue point's four loops.
#[derive(Debug)]
struct Inner {
    id: RescuePointId,
    position: Position,
    siblings: Vec<RescuePointHandle>,
    missions: DashMap<PersonId, DroneId>,
    pool: Mutex<BTreeMap<RescuerId, Rescuer>>,
    rescuer_ids: Arc<AtomicU32>,
    assign_tx: mpsc::Sender<AssignCommand>,
    arbiter: ArbiterHandle,
    config: RescuePointConfig,
}

/// A receiver shared with the supervisor so it survives loop restarts.
type SharedRx<T> = Arc<Mutex<mpsc::Receiver<T>>>;

/// Stand up a network of rescue points that know about each other.
///
/// Handles are created first so every point's loops start with the full
/// sibling list; rescuer ids are drawn from one shared counter so they
/// stay unique across points.
pub fn spawn_network(
    specs: &[RescuePointSpec],
    arbiter: &ArbiterHandle,
    config: &RescuePointConfig,
) -> Vec<RescuePointHandle> {
    struct Plumbing {
        handle: RescuePointHandle,
        requests_rx: SharedRx<RescueRequest>,
        forwards_rx: SharedRx<RescueRequest>,
        probes_rx: SharedRx<ProbeRequest>,
        ticks_rx: SharedRx<TickCommand>,
    }

    let rescuer_ids = Arc::new(AtomicU32::new(0));
    let mut plumbing = Vec::with_capacity(specs.len());
    for spec in specs {
        let (requests, requests_rx) = mpsc::channel(QUEUE_DEPTH);
        let (forwards, forwards_rx) = mpsc::channel(QUEUE_DEPTH);
        let (probes, probes_rx) = mpsc::channel(QUEUE_DEPTH);
        let (ticks, ticks_rx) = mpsc::channel(1);
        plumbing.push(Plumbing {
            handle: RescuePointHandle {
                id: spec.id,
                position: spec.position,
                requests,
                forwards,
                probes,
                ticks,
            },
            requests_rx: Arc::new(Mutex::new(requests_rx)),
            forwards_rx: Arc::new(Mutex::new(forwards_rx)),
            probes_rx: Arc::new(Mutex::new(probes_rx)),
            ticks_rx: Arc::new(Mutex::new(ticks_rx)),
        });
    }

    let handles: Vec<RescuePointHandle> = plumbing.iter().map(|p| p.handle.clone()).collect();

    for p in &plumbing {
        let (assign_tx, assign_rx) = mpsc::channel(QUEUE_DEPTH);
        let inner = Arc::new(Inner {
            id: p.handle.id,
            position: p.handle.position,
            siblings: handles
                .iter()
                .filter(|h| h.id != p.handle.id)
                .cloned()
                .collect(),
            missions: DashMap::new(),
            pool: Mutex::new(BTreeMap::new()),
            rescuer_ids: Arc::clone(&rescuer_ids),
            assign_tx,
            arbiter: arbiter.clone(),
            config: config.clone(),
        });
        let assign_rx = Arc::new(Mutex::new(assign_rx));

        {
            let inner = Arc::clone(&inner);
            let rx = Arc::clone(&p.requests_rx);
            supervise(inner.id, "requests", move || {
                run_request_loop(Arc::clone(&inner), Arc::clone(&rx))
            });
        }
        {
            let inner = Arc::clone(&inner);
            let rx = Arc::clone(&p.forwards_rx);
            supervise(inner.id, "forwards", move || {
                run_request_loop(Arc::clone(&inner), Arc::clone(&rx))
            });
        }
        {
            let inner = Arc::clone(&inner);
            let rx = Arc::clone(&p.probes_rx);
            supervise(inner.id, "probes", move || {
                run_probe_loop(Arc::clone(&inner), Arc::clone(&rx))
            });
        }
        {
            let inner = Arc::clone(&inner);
            let tick_rx = Arc::clone(&p.ticks_rx);
            let assign_rx = Arc::clone(&assign_rx);
            supervise(inner.id, "update", move || {
                run_update_loop(Arc::clone(&inner), Arc::clone(&tick_rx), Arc::clone(&assign_rx))
            });
        }
        info!(point = %inner.id, position = ?inner.position, "rescue point started");
    }

    handles
}

/// Run a service loop under a restart-on-panic supervisor.
fn supervise<F, Fut>(point: RescuePointId, loop_name: &'static str, factory: F)
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match tokio::spawn(factory()).await {
                // Clean exit: the channel closed, the point is shutting down.
                Ok(()) => break,
                Err(err) if err.is_panic() => {
                    error!(%point, loop_name, "rescue point loop panicked; restarting");
                    tokio::time::sleep(RESTART_BACKOFF).await;
                }
                Err(_cancelled) => break,
            }
        }
    });
}

/// Serve direct or forwarded rescue requests until the channel closes.
async fn run_request_loop(inner: Arc<Inner>, rx: SharedRx<RescueRequest>) {
    let mut rx = rx.lock().await;
    while let Some(request) = rx.recv().await {
        handle_request(&inner, request).await;
    }
}

/// Answer sibling mission probes until the channel closes.
async fn run_probe_loop(inner: Arc<Inner>, rx: SharedRx<ProbeRequest>) {
    let mut rx = rx.lock().await;
    while let Some(probe) = rx.recv().await {
        let _ = probe.reply.send(inner.missions.contains_key(&probe.person));
    }
}

/// Serve rescuer assignment commands and per-tick motion updates.
async fn run_update_loop(
    inner: Arc<Inner>,
    tick_rx: SharedRx<TickCommand>,
    assign_rx: SharedRx<AssignCommand>,
) {
    let mut tick_rx = tick_rx.lock().await;
    let mut assign_rx = assign_rx.lock().await;
    loop {
        tokio::select! {
            command = assign_rx.recv() => match command {
                Some(AssignCommand { sighting, reply }) => {
                    let dispatched = dispatch_rescuer(&inner, sighting).await;
                    let _ = reply.send(dispatched);
                }
                None => break,
            },
            command = tick_rx.recv() => match command {
                Some(TickCommand { reply }) => {
                    step_rescuers(&inner).await;
                    let _ = reply.send(());
                }
                None => break,
            },
        }
    }
}

/// The dispatch decision for one incoming request.
///
/// 1. Reject if the person is already active at this point.
/// 2. Probe every sibling; the first positive probe rejects the request.
/// 3. If a sibling is closer to the person (Manhattan, ties by lowest
///    id), forward there exactly once; the forwarded point answers the
///    original caller directly.
/// 4. Otherwise reserve the mission atomically and dispatch a rescuer.
async fn handle_request(inner: &Arc<Inner>, request: RescueRequest) {
    let RescueRequest {
        person,
        position,
        sender,
        forwarded,
        reply,
    } = request;

    if inner.missions.contains_key(&person) {
        debug!(point = %inner.id, %person, "rescue request rejected: already active here");
        let _ = reply.send(false);
        return;
    }

    for sibling in &inner.siblings {
        match sibling.is_person_being_rescued(person).await {
            Ok(true) => {
                debug!(point = %inner.id, %person, sibling = %sibling.id, "rescue request rejected: active at sibling");
                let _ = reply.send(false);
                return;
            }
            Ok(false) => {}
            Err(_gone) => {
                warn!(point = %inner.id, sibling = %sibling.id, "sibling probe unanswered");
            }
        }
    }

    if !forwarded
        && let Some(closest) = inner.closest_sibling(&position)
    {
        debug!(point = %inner.id, %person, target = %closest.id, "forwarding rescue request");
        let handoff = RescueRequest {
            person,
            position,
            sender,
            forwarded: true,
            reply,
        };
        if closest.forward(handoff).await.is_err() {
            warn!(point = %inner.id, target = %closest.id, "forward target unavailable; request dropped");
        }
        return;
    }

    // Atomic reserve: two loops racing on the same person cannot both
    // pass this point.
    match inner.missions.entry(person) {
        dashmap::mapref::entry::Entry::Occupied(_) => {
            let _ = reply.send(false);
            return;
        }
        dashmap::mapref::entry::Entry::Vacant(vacant) => {
            vacant.insert(sender);
        }
    }

    let dispatched = request_dispatch(inner, PersonSighting { id: person, position }).await;
    if !dispatched {
        inner.missions.remove(&person);
    }
    let _ = reply.send(dispatched);
}

/// Ask the update loop to dispatch a rescuer for the sighting.
async fn request_dispatch(inner: &Arc<Inner>, sighting: PersonSighting) -> bool {
    let (reply, rx) = oneshot::channel();
    if inner.assign_tx.send(AssignCommand { sighting, reply }).await.is_err() {
        return false;
    }
    rx.await.unwrap_or(false)
}

/// Reuse an idle rescuer or instantiate a new one, then put it on mission.
async fn dispatch_rescuer(inner: &Arc<Inner>, sighting: PersonSighting) -> bool {
    let mut pool = inner.pool.lock().await;
    let idle_id = pool.values().find(|r| r.is_idle()).map(|r| r.id);
    let id = match idle_id {
        Some(id) => id,
        None => {
            let id = RescuerId::new(inner.rescuer_ids.fetch_add(1, Ordering::Relaxed));
            if inner
                .arbiter
                .register(AgentRef::Rescuer(id), inner.position)
                .await
                .is_err()
            {
                error!(point = %inner.id, "arbiter unavailable; cannot spawn rescuer");
                return false;
            }
            pool.insert(id, Rescuer::new(id, inner.position));
            debug!(point = %inner.id, rescuer = %id, "rescuer instantiated");
            id
        }
    };
    if let Some(rescuer) = pool.get_mut(&id) {
        rescuer.dispatch(sighting);
        info!(point = %inner.id, rescuer = %id, person = %sighting.id, "rescuer dispatched");
        return true;
    }
    false
}

/// Advance every rescuer one tick: move, save on arrival, recycle at home.
async fn step_rescuers(inner: &Arc<Inner>) {
    let mut pool = inner.pool.lock().await;
    for rescuer in pool.values_mut() {
        let Some(target) = rescuer.objective() else {
            continue;
        };
        let next = rescuer.position.step_toward(&target, inner.config.rescuer_speed);
        match inner
            .arbiter
            .request_move(AgentRef::Rescuer(rescuer.id), next)
            .await
        {
            Ok(true) => rescuer.position = next,
            Ok(false) => {
                debug!(rescuer = %rescuer.id, ?next, "rescuer move denied; holding position");
            }
            Err(_gone) => {
                error!(rescuer = %rescuer.id, "arbiter unavailable during rescuer move");
                continue;
            }
        }

        if rescuer.phase == skyguard_types::RescuerPhase::MovingToPerson && rescuer.arrived() {
            if let Some(sighting) = rescuer.assigned {
                attempt_save(inner, rescuer.id, sighting.id).await;
                inner.missions.remove(&sighting.id);
            }
            rescuer.head_home();
        } else if rescuer.phase == skyguard_types::RescuerPhase::ReturningToBase && rescuer.arrived()
        {
            rescuer.position = rescuer.home;
            rescuer.rest();
        }
    }
}

/// The terminal save call, bounded by an explicit timeout.
///
/// A non-responding arbiter is logged, never retried.
async fn attempt_save(inner: &Arc<Inner>, rescuer: RescuerId, person: PersonId) {
    let save = inner
        .arbiter
        .request_save_person(person, AgentRef::Rescuer(rescuer));
    match tokio::time::timeout(inner.config.save_timeout, save).await {
        Ok(Ok(SaveOutcome::Treated)) => {
            info!(point = %inner.id, %rescuer, %person, "person treated by rescuer");
        }
        Ok(Ok(outcome)) => {
            debug!(point = %inner.id, %rescuer, %person, ?outcome, "save attempt not completed");
        }
        Ok(Err(_gone)) => {
            error!(point = %inner.id, %rescuer, %person, "arbiter unavailable during save");
        }
        Err(_elapsed) => {
            error!(point = %inner.id, %rescuer, %person, "save request unanswered within timeout");
        }
    }
}

impl Inner {
    /// The sibling strictly closer to `position` than this point
    /// (Manhattan distance, ties broken by lowest id), if any.
    fn closest_sibling(&self, position: &Position) -> Option<&RescuePointHandle> {
        let mut best_id = self.id;
        let mut best_distance = self.position.manhattan(position);
        let mut best: Option<&RescuePointHandle> = None;
        for sibling in &self.siblings {
            let distance = sibling.position.manhattan(position);
            let closer = distance < best_distance
                || ((distance - best_distance).abs() < f64::EPSILON && sibling.id < best_id);
            if closer {
                best_distance = distance;
                best_id = sibling.id;
                best = Some(sibling);
            }
        }
        best
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use skyguard_world::Grid;

    use super::*;

    fn network(positions: &[(f64, f64)]) -> (Vec<RescuePointHandle>, ArbiterHandle) {
        let grid = Grid::new(30, 30).unwrap();
        let (arbiter, _task) = skyguard_arbiter::spawn(grid);
        let specs: Vec<RescuePointSpec> = positions
            .iter()
            .enumerate()
            .map(|(i, (x, y))| RescuePointSpec {
                id: RescuePointId::new(u32::try_from(i).unwrap()),
                position: Position::new(*x, *y),
            })
            .collect();
        let handles = spawn_network(&specs, &arbiter, &RescuePointConfig::default());
        (handles, arbiter)
    }

    async fn register_person(arbiter: &ArbiterHandle, id: u32, x: f64, y: f64) -> PersonId {
        let person = PersonId::new(id);
        arbiter
            .register(AgentRef::Person(person), Position::new(x, y))
            .await
            .unwrap();
        arbiter.report_distress(person, true).await.unwrap();
        person
    }

    #[tokio::test]
    async fn accepts_and_dispatches() {
        let (handles, arbiter) = network(&[(5.0, 5.0)]);
        let person = register_person(&arbiter, 0, 6.0, 6.0).await;
        let accepted = handles
            .first()
            .unwrap()
            .request_rescue(person, Position::new(6.0, 6.0), DroneId::new(0))
            .await
            .unwrap();
        assert!(accepted);
    }

    #[tokio::test]
    async fn duplicate_request_rejected() {
        let (handles, arbiter) = network(&[(5.0, 5.0)]);
        let person = register_person(&arbiter, 0, 6.0, 6.0).await;
        let point = handles.first().unwrap();
        assert!(point.request_rescue(person, Position::new(6.0, 6.0), DroneId::new(0)).await.unwrap());
        assert!(!point.request_rescue(person, Position::new(6.0, 6.0), DroneId::new(1)).await.unwrap());
    }

    #[tokio::test]
    async fn request_forwarded_to_closest_point_and_answered() {
        // Point 0 is far from the person; point 1 is adjacent. A request
        // sent to point 0 must be answered (accepted) via exactly one hop.
        let (handles, arbiter) = network(&[(1.0, 1.0), (20.0, 20.0)]);
        let person = register_person(&arbiter, 0, 21.0, 21.0).await;
        let accepted = handles
            .first()
            .unwrap()
            .request_rescue(person, Position::new(21.0, 21.0), DroneId::new(0))
            .await
            .unwrap();
        assert!(accepted);
        // The mission now lives at point 1: a direct request there is
        // rejected as already active.
        let again = handles
            .get(1)
            .unwrap()
            .request_rescue(person, Position::new(21.0, 21.0), DroneId::new(1))
            .await
            .unwrap();
        assert!(!again);
    }

    #[tokio::test]
    async fn sibling_probe_blocks_duplicate_mission() {
        let (handles, arbiter) = network(&[(1.0, 1.0), (20.0, 20.0)]);
        let person = register_person(&arbiter, 0, 2.0, 2.0).await;
        // Accepted at its closest point (0).
        assert!(
            handles
                .first()
                .unwrap()
                .request_rescue(person, Position::new(2.0, 2.0), DroneId::new(0))
                .await
                .unwrap()
        );
        // A request at point 1 probes point 0 and rejects.
        assert!(
            !handles
                .get(1)
                .unwrap()
                .request_rescue(person, Position::new(2.0, 2.0), DroneId::new(1))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn rescuer_round_trip_treats_person() {
        let (handles, arbiter) = network(&[(5.0, 5.0)]);
        let person = register_person(&arbiter, 0, 7.0, 5.0).await;
        let point = handles.first().unwrap();
        assert!(point.request_rescue(person, Position::new(7.0, 5.0), DroneId::new(0)).await.unwrap());

        // Two cells away at speed 1: a few ticks to arrive and save.
        for _ in 0..4 {
            point.tick().await.unwrap();
        }
        let snapshot = arbiter.snapshot().await.unwrap();
        let record = snapshot.person(person).unwrap();
        assert!(record.treated);
        assert!(record.position.is_sentinel());

        // After treatment the mission is released: a fresh request for the
        // same id is rejected only because the person is gone, not because
        // a stale mission lingers.
        for _ in 0..20 {
            point.tick().await.unwrap();
        }
    }
}
