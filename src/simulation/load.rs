//! Household load and enclosure temperature.
//!
//! Consumption is a fresh draw every tick (base load plus a random appliance
//! component); it is deliberately not smoothed between ticks.

use serde::{Deserialize, Serialize};

use super::noise::NoiseSource;
use crate::config::SimulationConfig;

/// Daytime ambient: 30 + [0, 10) °C
const DAY_AMBIENT_BASE_C: f64 = 30.0;
const DAY_AMBIENT_SPREAD_C: f64 = 10.0;
/// Nighttime ambient: 20 + [0, 5) °C
const NIGHT_AMBIENT_BASE_C: f64 = 20.0;
const NIGHT_AMBIENT_SPREAD_C: f64 = 5.0;
/// Heating from the load, °C per amp drawn
const LOAD_HEATING_C_PER_AMP: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadProfile {
    pub base_amps: f64,
    pub max_appliance_amps: f64,
}

impl Default for LoadProfile {
    fn default() -> Self {
        Self {
            base_amps: 0.3,
            max_appliance_amps: 1.5,
        }
    }
}

impl LoadProfile {
    pub fn from_config(cfg: &SimulationConfig) -> Self {
        Self {
            base_amps: cfg.base_load_amps,
            max_appliance_amps: cfg.max_appliance_load_amps,
        }
    }

    pub fn consumption_amps(&self, noise: &mut dyn NoiseSource) -> f64 {
        self.base_amps + noise.appliance_load(self.max_appliance_amps)
    }
}

pub fn ambient_temperature_c(is_daytime: bool, noise: &mut dyn NoiseSource) -> f64 {
    if is_daytime {
        DAY_AMBIENT_BASE_C + noise.ambient_offset(DAY_AMBIENT_SPREAD_C)
    } else {
        NIGHT_AMBIENT_BASE_C + noise.ambient_offset(NIGHT_AMBIENT_SPREAD_C)
    }
}

pub fn enclosure_temperature_c(ambient_c: f64, consumption_amps: f64) -> f64 {
    ambient_c + consumption_amps * LOAD_HEATING_C_PER_AMP
}
