//! Typed YAML configuration for the simulation.
//!
//! The canonical configuration lives in `skyguard-config.yaml` next to
//! the binary. Every field has a default, so an empty file (or no file
//! at all) yields a runnable simulation.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use skyguard_agents::{DroneConfig, PersonConfig};
use skyguard_rescue::RescuePointConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

fn default_drone_count() -> u32 {
    4
}
fn default_crowd_size() -> u32 {
    40
}
fn default_protocol() -> u8 {
    1
}

/// World-level settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Seed for deterministic agent placement; omit for entropy.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Path to the JSON map layout; omit to use the built-in map.
    #[serde(default)]
    pub map_path: Option<String>,
}

/// Fleet and crowd sizing plus the active allocation protocol.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FleetConfig {
    /// Number of drones in the fleet.
    #[serde(default = "default_drone_count")]
    pub drone_count: u32,

    /// Number of crowd members spawned at setup.
    #[serde(default = "default_crowd_size")]
    pub crowd_size: u32,

    /// Allocation protocol index, 1 through 4.
    #[serde(default = "default_protocol")]
    pub protocol: u8,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            drone_count: default_drone_count(),
            crowd_size: default_crowd_size(),
            protocol: default_protocol(),
        }
    }
}

fn default_max_ticks() -> u64 {
    1_000
}
fn default_tick_interval_ms() -> u64 {
    100
}

/// Run-loop settings for the engine binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Number of ticks before the engine stops.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,

    /// Real-time pacing between ticks, in milliseconds. Zero runs flat
    /// out.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_ticks: default_max_ticks(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

fn default_rescuer_speed() -> f64 {
    1.0
}
fn default_save_timeout_ms() -> u64 {
    250
}

/// Rescue point tunables, as they appear in the YAML file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RescueConfig {
    /// Rescuer ground speed in cells per tick.
    #[serde(default = "default_rescuer_speed")]
    pub rescuer_speed: f64,

    /// Upper bound on waiting for a save answer, in milliseconds.
    #[serde(default = "default_save_timeout_ms")]
    pub save_timeout_ms: u64,
}

impl Default for RescueConfig {
    fn default() -> Self {
        Self {
            rescuer_speed: default_rescuer_speed(),
            save_timeout_ms: default_save_timeout_ms(),
        }
    }
}

impl RescueConfig {
    /// Convert into the rescue crate's runtime config.
    #[must_use]
    pub const fn to_point_config(&self) -> RescuePointConfig {
        RescuePointConfig {
            rescuer_speed: self.rescuer_speed,
            save_timeout: Duration::from_millis(self.save_timeout_ms),
        }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// World-level settings (seed, map path).
    #[serde(default)]
    pub world: WorldConfig,

    /// Fleet and crowd sizing.
    #[serde(default)]
    pub fleet: FleetConfig,

    /// Drone tunables.
    #[serde(default)]
    pub drone: DroneConfig,

    /// Person tunables.
    #[serde(default)]
    pub person: PersonConfig,

    /// Rescue point tunables.
    #[serde(default)]
    pub rescue: RescueConfig,

    /// Engine run-loop settings.
    #[serde(default)]
    pub run: RunConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(contents)?;
        Ok(config)
    }
}
