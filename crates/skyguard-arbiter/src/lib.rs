//! Grid Arbiter: the shared-resource arbitration service for Skyguard.
//!
//! The arbiter owns the authoritative position/occupancy table for every
//! agent, the charging-station slot tables, and the per-person rescue
//! records (distress, claim owner, treated/dead flags). All mutation is
//! serialized behind request/response calls processed by a single owning
//! task, so no two agents can ever observe or produce an inconsistent
//! world state.
//!
//! # Modules
//!
//! - [`actor`] -- The service loop, request enum, and [`ArbiterHandle`].
//! - [`error`] -- Caller-facing error type.
//! - [`state`] -- The exclusively-owned authoritative state.
//!
//! [`ArbiterHandle`]: actor::ArbiterHandle

pub mod actor;
pub mod error;
pub mod state;

// Re-export primary types at crate root.
pub use actor::{ArbiterHandle, ArbiterRequest, spawn};
pub use error::ArbiterError;
pub use state::ArbiterState;
