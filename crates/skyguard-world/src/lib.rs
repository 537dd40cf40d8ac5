//! Grid, obstacles, pathfinding, and map configuration for Skyguard.
//!
//! This crate models the static physical world: the bounded grid with its
//! obstacle/POI table, the stateless A* pathfinder, and the JSON map
//! configuration format. Dynamic world state (occupancy, claims, charging
//! slots) is owned by the arbiter, which holds a [`Grid`] internally.
//!
//! # Modules
//!
//! - [`error`] -- Error types for grid and pathfinding operations.
//! - [`grid`] -- The bounded grid, obstacle table, and POI lookups.
//! - [`map_config`] -- JSON map-configuration loading and validation.
//! - [`pathfinder`] -- Stateless 8-directional A* search.
//! - [`starting_map`] -- Default two-zone festival map.

pub mod error;
pub mod grid;
pub mod map_config;
pub mod pathfinder;
pub mod starting_map;

// Re-export primary types at crate root.
pub use error::WorldError;
pub use grid::{Grid, MapZone};
pub use map_config::{MapConfig, PoiPlacement, RectConfig, ZoneConfig};
pub use pathfinder::{find_path, find_path_jittered, path_steps};
pub use starting_map::default_map;
