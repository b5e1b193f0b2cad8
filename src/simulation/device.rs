//! # Device State
//!
//! The evolving physical state of one simulated household and the
//! [`Reading`] it emits. [`DeviceState::step`] is the whole per-tick model:
//! it takes elapsed seconds, the virtual hour and a noise source, so a fixed
//! input sequence always yields the same readings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::battery::{self, clamp_level, voltage_for_level};
use super::clock::{is_daytime, DayPart};
use super::load::{ambient_temperature_c, enclosure_temperature_c, LoadProfile};
use super::noise::NoiseSource;
use super::solar::SolarProfile;
use crate::config::SimulationConfig;

pub type DeviceId = String;

/// Externally visible snapshot of a device, rounded for presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Percent of capacity, 1 dp
    pub battery_level: f64,
    /// Volts, 2 dp
    pub voltage: f64,
    /// Net battery current in amps, positive while charging, 2 dp
    pub current: f64,
    pub power_consumption: f64,
    pub solar_generation: f64,
    /// °C, 1 dp
    pub temperature: f64,
    pub hour_of_day: u32,
    pub is_daytime: bool,
    pub day_part: DayPart,
    pub timestamp: DateTime<Utc>,
}

/// Model constants resolved once from [`SimulationConfig`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceModel {
    pub solar: SolarProfile,
    pub load: LoadProfile,
    pub capacity_ah: f64,
    pub power_cut_load_factor: f64,
}

impl Default for DeviceModel {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default())
    }
}

impl DeviceModel {
    pub fn from_config(cfg: &SimulationConfig) -> Self {
        Self {
            solar: SolarProfile::from_config(cfg),
            load: LoadProfile::from_config(cfg),
            capacity_ah: cfg.battery_capacity_ah,
            power_cut_load_factor: cfg.power_cut_load_factor,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeviceState {
    pub device_id: DeviceId,
    /// Unrounded state of charge; this is what accumulates between ticks
    pub battery_level: f64,
    pub voltage: f64,
    pub current_net: f64,
    pub power_consumption: f64,
    pub solar_generation: f64,
    pub temperature: f64,
    pub hour_of_day: u32,
    pub last_update_time: Instant,
    pub last_timestamp: DateTime<Utc>,
    /// Next step runs with no solar and standby load only
    pub power_cut_pending: bool,
}

impl DeviceState {
    pub fn new(device_id: impl Into<DeviceId>, battery_level: f64, now: Instant, hour: u32) -> Self {
        let battery_level = clamp_level(battery_level);
        Self {
            device_id: device_id.into(),
            battery_level,
            voltage: voltage_for_level(battery_level),
            current_net: 0.0,
            power_consumption: 0.0,
            solar_generation: 0.0,
            temperature: 25.0,
            hour_of_day: hour,
            last_update_time: now,
            last_timestamp: Utc::now(),
            power_cut_pending: false,
        }
    }

    /// Advance to `now`, using the monotonic time since the last update as Δt.
    pub fn advance_to(
        &mut self,
        now: Instant,
        hour: u32,
        timestamp: DateTime<Utc>,
        model: &DeviceModel,
        noise: &mut dyn NoiseSource,
    ) -> Reading {
        let dt_secs = now.saturating_duration_since(self.last_update_time).as_secs_f64();
        let reading = self.step(dt_secs, hour, timestamp, model, noise);
        if now > self.last_update_time {
            self.last_update_time = now;
        }
        reading
    }

    /// One tick of the physical model over `dt_secs` seconds.
    pub fn step(
        &mut self,
        dt_secs: f64,
        hour: u32,
        timestamp: DateTime<Utc>,
        model: &DeviceModel,
        noise: &mut dyn NoiseSource,
    ) -> Reading {
        let daytime = is_daytime(hour);

        let mut solar = model.solar.generation_amps(hour, noise);
        let mut consumption = model.load.consumption_amps(noise);
        if self.power_cut_pending {
            solar = 0.0;
            consumption *= model.power_cut_load_factor;
            self.power_cut_pending = false;
        }

        let net = solar - consumption;
        let level = battery::integrate(self.battery_level, net, dt_secs.max(0.0), model.capacity_ah);
        let ambient = ambient_temperature_c(daytime, noise);

        self.battery_level = level;
        self.voltage = voltage_for_level(level);
        self.current_net = net;
        self.power_consumption = consumption;
        self.solar_generation = solar;
        self.temperature = enclosure_temperature_c(ambient, consumption);
        self.hour_of_day = hour;
        self.last_timestamp = timestamp;

        self.reading()
    }

    /// Overwrite the state of charge; derived fields keep their values until
    /// the next step. Returns the stored level.
    pub fn set_battery_level(&mut self, level: f64) -> f64 {
        self.battery_level = clamp_level(level);
        self.battery_level
    }

    /// Drop to standby immediately and keep it for the next step only.
    pub fn apply_power_cut(&mut self, load_factor: f64) {
        self.solar_generation = 0.0;
        self.power_consumption *= load_factor;
        self.current_net = self.solar_generation - self.power_consumption;
        self.power_cut_pending = true;
    }

    pub fn reading(&self) -> Reading {
        Reading {
            battery_level: round_to(self.battery_level, 1),
            voltage: round_to(self.voltage, 2),
            current: round_to(self.current_net, 2),
            power_consumption: round_to(self.power_consumption, 2),
            solar_generation: round_to(self.solar_generation, 2),
            temperature: round_to(self.temperature, 1),
            hour_of_day: self.hour_of_day,
            is_daytime: is_daytime(self.hour_of_day),
            day_part: DayPart::from_hour(self.hour_of_day),
            timestamp: self.last_timestamp,
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
