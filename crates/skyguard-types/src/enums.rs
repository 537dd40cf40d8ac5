//! Enumeration types shared across the Skyguard workspace.

use serde::{Deserialize, Serialize};

/// Point-of-interest category placed on the grid at map-load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoiType {
    /// Medical tent where drones pick up medical gear.
    MedicalTent,
    /// Charging station with a limited number of docking slots.
    ChargingStation,
    /// Toilet block.
    Toilet,
    /// Drink stand.
    DrinkStand,
    /// Food stand.
    FoodStand,
    /// Stage attracting crowds.
    Stage,
    /// Rest area where persons recover stamina.
    RestArea,
}

/// The decentralized task-allocation strategy a drone runs each tick.
///
/// The external configuration selects a protocol by its 1-based index,
/// matching the numbering used by the front-end collaborators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationProtocol {
    /// Protocol 1: first observer claims unconditionally (no negotiation).
    #[default]
    DirectClaim,
    /// Protocol 2: best-fit selection over the transitive peer graph.
    BestFit,
    /// Protocol 3: intent/commit bidding with a wall-clock backoff window.
    Bidding,
    /// Protocol 4: zone patrol with store-and-forward rescue-point dispatch.
    ZoneDispatch,
}

impl AllocationProtocol {
    /// Resolve the 1-based protocol index used by external collaborators.
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(Self::DirectClaim),
            2 => Some(Self::BestFit),
            3 => Some(Self::Bidding),
            4 => Some(Self::ZoneDispatch),
            _ => None,
        }
    }

    /// The 1-based protocol index used by external collaborators.
    pub const fn index(self) -> u8 {
        match self {
            Self::DirectClaim => 1,
            Self::BestFit => 2,
            Self::Bidding => 3,
            Self::ZoneDispatch => 4,
        }
    }
}

/// Activity state of a crowd member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonActivity {
    /// Wandering the grid in a bounded random walk.
    #[default]
    Exploring,
    /// Heading toward a point of interest.
    SeekingPoi,
    /// Recovering stamina in place.
    Resting,
    /// Waiting at a point of interest.
    InQueue,
    /// Medical emergency; pre-empts every other activity.
    InDistress,
}

/// Motion state of a ground rescuer unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescuerPhase {
    /// Available at the home rescue point.
    #[default]
    Idle,
    /// En route to an assigned person.
    MovingToPerson,
    /// Returning to the home rescue point after a save attempt.
    ReturningToBase,
}

/// Outcome of the terminal `RequestSavePerson` arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    /// The person was treated and leaves the simulation.
    Treated,
    /// The person died before the savior arrived.
    PersonDead,
    /// Another agent already completed this rescue.
    AlreadyHandled,
    /// The person id is not known to the arbiter.
    UnknownPerson,
}
