//! Simulation core for Skyguard: configuration, the clock, and the tick
//! driver that owns the whole live world.
//!
//! # Modules
//!
//! - [`tick`] -- World assembly and [`Simulation::update`].
//! - [`config`] -- Typed YAML configuration.
//! - [`clock`] -- The tick counter.
//! - [`error`] -- Aggregated error type.
//!
//! [`Simulation::update`]: tick::Simulation::update

pub mod clock;
pub mod config;
pub mod error;
pub mod tick;

// Re-export primary types at crate root.
pub use clock::SimClock;
pub use config::{ConfigError, SimulationConfig};
pub use error::CoreError;
pub use tick::Simulation;
