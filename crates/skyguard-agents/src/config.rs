//! Tunables for drone and person agents.
//!
//! The simulation core constructs these from the YAML configuration at
//! setup and passes them into agent turn functions; tests override
//! individual fields from the defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_see_range() -> f64 {
    8.0
}
fn default_comm_range() -> f64 {
    10.0
}
fn default_drone_speed() -> f64 {
    1.5
}
fn default_battery_drain() -> f64 {
    0.4
}
fn default_charge_rate() -> f64 {
    4.0
}
fn default_reserve_margin() -> f64 {
    10.0
}
fn default_bid_window_ms() -> u64 {
    50
}

/// Configuration for drone agents applied each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroneConfig {
    /// Radius within which a drone sees people, in cells.
    #[serde(default = "default_see_range")]
    pub see_range: f64,

    /// Radius within which a drone reaches peers and rescue points.
    #[serde(default = "default_comm_range")]
    pub comm_range: f64,

    /// Flight speed in cells per tick.
    #[serde(default = "default_drone_speed")]
    pub speed: f64,

    /// Battery percentage spent per cell of flight.
    #[serde(default = "default_battery_drain")]
    pub battery_drain: f64,

    /// Battery percentage gained per tick while docked.
    #[serde(default = "default_charge_rate")]
    pub charge_rate: f64,

    /// Safety margin added to the return-to-charger battery reserve.
    #[serde(default = "default_reserve_margin")]
    pub reserve_margin: f64,

    /// How long a bidding drone waits for counter-intents, in
    /// milliseconds of wall-clock time.
    #[serde(default = "default_bid_window_ms")]
    pub bid_window_ms: u64,
}

impl Default for DroneConfig {
    fn default() -> Self {
        Self {
            see_range: default_see_range(),
            comm_range: default_comm_range(),
            speed: default_drone_speed(),
            battery_drain: default_battery_drain(),
            charge_rate: default_charge_rate(),
            reserve_margin: default_reserve_margin(),
            bid_window_ms: default_bid_window_ms(),
        }
    }
}

impl DroneConfig {
    /// The bidding window as a [`Duration`].
    pub const fn bid_window(&self) -> Duration {
        Duration::from_millis(self.bid_window_ms)
    }
}

fn default_base_malaise() -> f64 {
    0.01
}
fn default_explore_drain() -> f64 {
    0.005
}
fn default_rest_regen() -> f64 {
    0.02
}
fn default_distress_lifespan() -> u32 {
    200
}
fn default_queue_ticks() -> u32 {
    8
}
fn default_person_speed() -> f64 {
    0.8
}

/// Configuration for person agents applied each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonConfig {
    /// Base per-tick probability of falling into distress, before the
    /// person's resistance and stamina scale it down.
    #[serde(default = "default_base_malaise")]
    pub base_malaise: f64,

    /// Stamina lost per tick while exploring or walking to a POI.
    #[serde(default = "default_explore_drain")]
    pub explore_drain: f64,

    /// Stamina regained per tick while resting or queueing.
    #[serde(default = "default_rest_regen")]
    pub rest_regen: f64,

    /// Ticks a person in distress survives untreated.
    #[serde(default = "default_distress_lifespan")]
    pub distress_lifespan: u32,

    /// Ticks spent at a POI before moving on.
    #[serde(default = "default_queue_ticks")]
    pub queue_ticks: u32,

    /// Base walking speed in cells per tick, scaled by the personal
    /// speed trait.
    #[serde(default = "default_person_speed")]
    pub speed: f64,
}

impl Default for PersonConfig {
    fn default() -> Self {
        Self {
            base_malaise: default_base_malaise(),
            explore_drain: default_explore_drain(),
            rest_regen: default_rest_regen(),
            distress_lifespan: default_distress_lifespan(),
            queue_ticks: default_queue_ticks(),
            speed: default_person_speed(),
        }
    }
}
