//! Shared type definitions for the Skyguard rescue-drone simulation.
//!
//! This crate is the single source of truth for the types that cross
//! crate boundaries in the Skyguard workspace. It contains no behavior
//! beyond small geometric helpers.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe integer wrappers for all entity identifiers
//! - [`enums`] -- Enumeration types (POIs, protocols, agent states)
//! - [`geometry`] -- Positions, distances, rectangles
//! - [`structs`] -- Entities, profiles, and read-only snapshot types

pub mod enums;
pub mod geometry;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{AllocationProtocol, PersonActivity, PoiType, RescuerPhase, SaveOutcome};
pub use geometry::{Position, Rect};
pub use ids::{AgentRef, DroneId, PersonId, RescuePointId, RescuerId};
pub use structs::{
    BehaviorProfile, DroneSnapshot, Obstacle, PersonSighting, PersonSnapshot, WorldSnapshot,
    WorldStats,
};
