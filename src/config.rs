use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;

/// Configuration values rejected by [`Config::validate`]
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("{field} must be within [0, 100], got {value}")]
    PercentOutOfRange { field: &'static str, value: f64 },
    #[error("initial battery range is empty: [{min}, {max})")]
    EmptyInitialRange { min: f64, max: f64 },
    #[error("clock start hour must be 0-23, got {0}")]
    InvalidStartHour(u32),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub simulation: SimulationConfig,
    pub clock: ClockConfig,
    pub devices: DevicesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

/// Physical model constants shared by every simulated device.
///
/// Currents are in amps on a 12 V bus; capacity in amp-hours.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seconds between scheduled readings for one device
    pub tick_interval_secs: u64,
    pub battery_capacity_ah: f64,
    /// Solar current at virtual noon, before noise
    pub peak_solar_amps: f64,
    /// Half-width of the uniform noise added to daytime solar current
    pub solar_noise_amps: f64,
    /// Always-on household draw
    pub base_load_amps: f64,
    /// Upper bound of the random appliance draw added on top of the base load
    pub max_appliance_load_amps: f64,
    /// Lower bound (inclusive) of the randomized starting battery level
    pub initial_battery_min: f64,
    /// Upper bound (exclusive) of the randomized starting battery level
    pub initial_battery_max: f64,
    /// Fraction of consumption left running during a simulated power cut
    pub power_cut_load_factor: f64,
    /// Seed for reproducible runs (None = entropy)
    pub random_seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 5,
            battery_capacity_ah: 100.0,
            peak_solar_amps: 5.0,
            solar_noise_amps: 0.25,
            base_load_amps: 0.3,
            max_appliance_load_amps: 1.5,
            initial_battery_min: 40.0,
            initial_battery_max: 100.0,
            power_cut_load_factor: 0.1,
            random_seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_secs == 0 {
            return Err(ConfigError::NotPositive {
                field: "tick_interval_secs",
                value: 0.0,
            });
        }
        for (field, value) in [
            ("battery_capacity_ah", self.battery_capacity_ah),
            ("peak_solar_amps", self.peak_solar_amps),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        for (field, value) in [
            ("solar_noise_amps", self.solar_noise_amps),
            ("base_load_amps", self.base_load_amps),
            ("max_appliance_load_amps", self.max_appliance_load_amps),
            ("power_cut_load_factor", self.power_cut_load_factor),
        ] {
            // Zero is allowed here: it switches the component off.
            if !(value >= 0.0) {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        for (field, value) in [
            ("initial_battery_min", self.initial_battery_min),
            ("initial_battery_max", self.initial_battery_max),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::PercentOutOfRange { field, value });
            }
        }
        if self.initial_battery_min >= self.initial_battery_max {
            return Err(ConfigError::EmptyInitialRange {
                min: self.initial_battery_min,
                max: self.initial_battery_max,
            });
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tick_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Virtual seconds per real second (60 = one real minute per virtual hour)
    pub acceleration: f64,
    /// Pin the virtual hour at startup instead of deriving it from wall-clock time
    pub start_hour: Option<u32>,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            acceleration: 60.0,
            start_hour: None,
        }
    }
}

impl ClockConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.acceleration > 0.0) || !self.acceleration.is_finite() {
            return Err(ConfigError::NotPositive {
                field: "acceleration",
                value: self.acceleration,
            });
        }
        match self.start_hour {
            Some(hour) if hour > 23 => Err(ConfigError::InvalidStartHour(hour)),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    /// Devices simulated from boot
    pub autostart: Vec<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("SOLARSIM__").split("__"));
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = figment.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation.validate()?;
        self.clock.validate()
    }
}
