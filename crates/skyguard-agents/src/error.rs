//! Error types for the `skyguard-agents` crate.

use skyguard_arbiter::ArbiterError;
use skyguard_rescue::RescueError;

/// Errors surfaced by agent turns.
///
/// Authorization denials (a rejected move, a lost claim) are ordinary
/// `false` answers with protocol-defined fallbacks, not errors. An error
/// here means a service an agent depends on has disappeared.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The grid arbiter stopped answering.
    #[error(transparent)]
    Arbiter(#[from] ArbiterError),

    /// A rescue point stopped answering.
    #[error(transparent)]
    Rescue(#[from] RescueError),
}
