//! Agents of the Skyguard simulation: drones and crowd members.
//!
//! The drone decision engine runs a fixed per-tick pipeline (perceive,
//! mailbox, battery, protocol, act) with one of four interchangeable
//! allocation protocols deciding who rescues whom. People wander, tire,
//! collapse into distress, and wait to be found.
//!
//! # Modules
//!
//! - [`drone`] -- Drone state and the per-tick turn pipeline.
//! - [`person`] -- Crowd member activity machine.
//! - [`protocols`] -- The four allocation protocols.
//! - [`comms`] -- Drone mailboxes and comm-range topology.
//! - [`config`] -- Agent tunables.
//! - [`error`] -- Caller-facing error type.

pub mod comms;
pub mod config;
pub mod drone;
pub mod error;
pub mod person;
pub mod protocols;

// Re-export primary types at crate root.
pub use comms::{CommsHub, DroneMessage};
pub use config::{DroneConfig, PersonConfig};
pub use drone::DroneState;
pub use error::AgentError;
pub use person::Person;
