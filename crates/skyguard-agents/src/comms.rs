//! Drone-to-drone messaging and comm-range topology.
//!
//! Every drone owns a bounded mailbox; peers deliver with `try_send` and
//! drop on a full mailbox rather than ever blocking a sender's turn. The
//! comm-range adjacency graph is recomputed from the world snapshot each
//! tick, so the reachable peer set follows the drones as they move.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use dashmap::DashMap;
use skyguard_types::{DroneId, PersonId, PersonSighting, Position};
use tokio::sync::mpsc;
use tracing::trace;

/// Depth of each drone mailbox. Overflow drops the message.
const MAILBOX_DEPTH: usize = 32;

/// A message between drones.
#[derive(Debug, Clone)]
pub enum DroneMessage {
    /// "I intend to rescue this person": the opening move of the bidding
    /// protocol, carrying the sender's planned path length.
    Intent {
        /// The person the sender wants to rescue.
        person: PersonId,
        /// Where the sender saw the person.
        position: Position,
        /// The sender's planned path length in steps.
        path_len: f64,
        /// The bidding drone.
        sender: DroneId,
    },
    /// "The person is mine": closes a bidding round.
    Commit {
        /// The person the sender has claimed.
        person: PersonId,
        /// The committing drone.
        sender: DroneId,
    },
    /// A best-fit requester telling the chosen drone to take the rescue.
    Assign {
        /// The person to rescue.
        person: PersonId,
        /// Where the person was sighted.
        position: Position,
    },
    /// A zone-dispatch drone handing its whole pending set to a peer
    /// that can reach a rescue point.
    TransferPending {
        /// The sighted people being handed over.
        people: Vec<PersonSighting>,
    },
}

/// The mailbox registry shared by every drone. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CommsHub {
    senders: Arc<DashMap<DroneId, mpsc::Sender<DroneMessage>>>,
}

impl CommsHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self {
            senders: Arc::new(DashMap::new()),
        }
    }

    /// Open a mailbox for a drone, returning its receiving end.
    ///
    /// Re-registering an id replaces the old mailbox.
    #[must_use]
    pub fn register(&self, id: DroneId) -> mpsc::Receiver<DroneMessage> {
        let (tx, rx) = mpsc::channel(MAILBOX_DEPTH);
        self.senders.insert(id, tx);
        rx
    }

    /// Deliver a message to one drone.
    ///
    /// Returns `false` if the recipient is unknown or its mailbox is
    /// full; the message is dropped in both cases.
    pub fn send(&self, to: DroneId, message: DroneMessage) -> bool {
        self.senders.get(&to).is_some_and(|tx| {
            let delivered = tx.try_send(message).is_ok();
            if !delivered {
                trace!(%to, "mailbox full; message dropped");
            }
            delivered
        })
    }

    /// Deliver a copy of the message to every listed drone.
    pub fn broadcast(&self, peers: &[DroneId], message: &DroneMessage) {
        for peer in peers {
            self.send(*peer, message.clone());
        }
    }
}

impl Default for CommsHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Drones within direct comm range of `origin`, excluding itself.
#[must_use]
pub fn direct_peers(
    origin: DroneId,
    origin_position: &Position,
    positions: &[(DroneId, Position)],
    comm_range: f64,
) -> Vec<(DroneId, Position)> {
    positions
        .iter()
        .filter(|(id, position)| *id != origin && origin_position.euclidean(position) <= comm_range)
        .copied()
        .collect()
}

/// The transitive peer set reachable from `origin` by hopping the
/// comm-range adjacency graph, excluding `origin` itself.
#[must_use]
pub fn reachable_peers(
    origin: DroneId,
    positions: &[(DroneId, Position)],
    comm_range: f64,
) -> Vec<(DroneId, Position)> {
    let mut visited: BTreeSet<DroneId> = BTreeSet::new();
    visited.insert(origin);
    let mut frontier = VecDeque::from([origin]);
    while let Some(current) = frontier.pop_front() {
        let Some((_, current_position)) = positions.iter().find(|(id, _)| *id == current) else {
            continue;
        };
        for (id, position) in positions {
            if !visited.contains(id) && current_position.euclidean(position) <= comm_range {
                visited.insert(*id);
                frontier.push_back(*id);
            }
        }
    }
    positions
        .iter()
        .filter(|(id, _)| *id != origin && visited.contains(id))
        .copied()
        .collect()
}
