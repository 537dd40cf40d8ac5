//! Engine binary for the Skyguard rescue-drone simulation.
//!
//! Wires together configuration, the map, and the simulation core, then
//! drives the tick loop until the configured tick budget runs out.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `skyguard-config.yaml` (defaults if absent)
//! 3. Load the map layout (built-in map if none is configured)
//! 4. Assemble the simulation
//! 5. Run the tick loop and log the closing statistics

mod error;

use std::path::Path;
use std::time::Duration;

use skyguard_core::config::SimulationConfig;
use skyguard_core::tick::Simulation;
use skyguard_world::{MapConfig, default_map};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Default configuration file looked up next to the binary.
const CONFIG_PATH: &str = "skyguard-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, map loading, or the simulation
/// itself fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("skyguard-engine starting");

    let config = load_config()?;
    info!(
        drones = config.fleet.drone_count,
        crowd = config.fleet.crowd_size,
        protocol = config.fleet.protocol,
        max_ticks = config.run.max_ticks,
        "configuration loaded"
    );

    let map = load_map(&config)?;
    let max_ticks = config.run.max_ticks;
    let interval = Duration::from_millis(config.run.tick_interval_ms);

    let mut sim = Simulation::new(config, &map).await?;
    info!("simulation assembled; entering tick loop");

    while sim.tick() < max_ticks {
        sim.update().await?;
        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
    }

    let stats = sim.stats();
    info!(
        ticks = sim.tick(),
        treated = stats.people_treated,
        dead = stats.people_dead,
        still_in_distress = stats.people_in_distress,
        average_battery = stats.average_battery,
        "simulation finished"
    );
    Ok(())
}

/// Load the YAML configuration, falling back to defaults when the file
/// does not exist.
fn load_config() -> Result<SimulationConfig, EngineError> {
    let path = Path::new(CONFIG_PATH);
    if path.exists() {
        Ok(SimulationConfig::from_file(path)?)
    } else {
        info!(path = CONFIG_PATH, "no config file found; using defaults");
        Ok(SimulationConfig::default())
    }
}

/// Load the configured map layout, or the built-in festival map.
fn load_map(config: &SimulationConfig) -> Result<MapConfig, EngineError> {
    match &config.world.map_path {
        Some(path) => {
            info!(path, "loading map layout");
            Ok(MapConfig::from_file(Path::new(path))?)
        }
        None => Ok(default_map()),
    }
}
