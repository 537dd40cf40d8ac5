//! Error types for the `skyguard-core` crate.

use skyguard_agents::AgentError;
use skyguard_arbiter::ArbiterError;
use skyguard_rescue::RescueError;
use skyguard_world::WorldError;

use crate::clock::ClockError;
use crate::config::ConfigError;

/// Errors surfaced by simulation setup and the tick driver.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The simulation clock failed to advance.
    #[error(transparent)]
    Clock(#[from] ClockError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The world/map layer rejected an operation.
    #[error(transparent)]
    World(#[from] WorldError),

    /// The grid arbiter stopped answering.
    #[error(transparent)]
    Arbiter(#[from] ArbiterError),

    /// An agent turn failed.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// A rescue point stopped answering.
    #[error(transparent)]
    Rescue(#[from] RescueError),

    /// An unknown allocation protocol index was requested.
    #[error("unknown allocation protocol index {index} (expected 1-4)")]
    UnknownProtocol {
        /// The rejected index.
        index: u8,
    },
}
