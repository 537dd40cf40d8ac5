//! Error types for the `skyguard-world` crate.
//!
//! All fallible operations in this crate return [`WorldError`] through the
//! standard [`Result`] type alias.

use skyguard_types::{PoiType, Position};

/// Errors that can occur during grid, pathfinding, and map-load operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The grid was constructed with a zero dimension.
    #[error("invalid grid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// A position falls outside the grid bounds.
    #[error("position ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        /// Offending x coordinate.
        x: f64,
        /// Offending y coordinate.
        y: f64,
        /// Grid width.
        width: u32,
        /// Grid height.
        height: u32,
    },

    /// The A* open set emptied before reaching the goal.
    #[error("no path from cell {from:?} to cell {to:?}")]
    NoPath {
        /// Start cell.
        from: (i64, i64),
        /// Goal cell.
        to: (i64, i64),
    },

    /// The A* iteration budget (`2 * width * height`) was exhausted.
    ///
    /// This is a hard failure, never a partial path.
    #[error("path search budget exhausted after {expanded} expansions")]
    SearchBudgetExhausted {
        /// Number of nodes expanded before giving up.
        expanded: u64,
    },

    /// A configured zone does not meet its minimum POI counts.
    #[error("zone '{zone}' requires {required} x {poi:?} but has {actual}")]
    ZoneUnderProvisioned {
        /// Zone name.
        zone: String,
        /// The POI type that is short.
        poi: PoiType,
        /// Required count.
        required: u32,
        /// Count actually placed inside the zone rectangle.
        actual: u32,
    },

    /// A zone rectangle extends outside the grid.
    #[error("zone '{zone}' rectangle extends outside the map")]
    ZoneOutOfBounds {
        /// Zone name.
        zone: String,
    },

    /// Failed to read the map configuration file from disk.
    #[error("failed to read map file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse map configuration JSON.
    #[error("failed to parse map JSON: {source}")]
    Json {
        /// The underlying JSON parse error.
        #[from]
        source: serde_json::Error,
    },
}

impl WorldError {
    /// Build an [`WorldError::OutOfBounds`] for a position on a grid.
    pub const fn out_of_bounds(position: Position, width: u32, height: u32) -> Self {
        Self::OutOfBounds {
            x: position.x,
            y: position.y,
            width,
            height,
        }
    }
}
