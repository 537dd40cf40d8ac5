//! Error types for the engine binary.

/// Top-level error for the engine binary.
///
/// Each variant wraps a subsystem error so `main` can propagate
/// everything with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: skyguard_core::ConfigError,
    },

    /// Map loading or world construction failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: skyguard_world::WorldError,
    },

    /// Simulation setup or a tick failed.
    #[error("simulation error: {source}")]
    Core {
        /// The underlying core error.
        #[from]
        source: skyguard_core::CoreError,
    },
}
