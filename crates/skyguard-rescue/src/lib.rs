//! Rescue points and ground rescuers for the Skyguard simulation.
//!
//! A rescue point is a zone-local dispatch actor: drones report sighted
//! people in distress to their nearest point, the points coordinate among
//! themselves (probe siblings, forward once to the closest point), and
//! the winning point sends a ground rescuer to treat the person and
//! return home.
//!
//! # Modules
//!
//! - [`point`] -- Rescue point actors and their service loops.
//! - [`rescuer`] -- Ground rescuer unit state machine.
//! - [`error`] -- Caller-facing error type.

pub mod error;
pub mod point;
pub mod rescuer;

// Re-export primary types at crate root.
pub use error::RescueError;
pub use point::{RescuePointConfig, RescuePointHandle, RescuePointSpec, spawn_network};
pub use rescuer::Rescuer;
