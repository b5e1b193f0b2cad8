//! # Household Telemetry Simulation
//!
//! Synthetic sensor readings for solar-battery households. Each device keeps
//! its own continuously evolving charge state; readings are produced on a
//! fixed interval and pushed to a caller-supplied sink.
//!
//! ## Components
//!
//! - **Clock**: accelerated virtual day (1 real minute = 1 virtual hour by default)
//! - **Solar**: triangular generation profile peaking at virtual noon
//! - **Load**: base load plus random appliance draw, ambient temperature
//! - **Battery**: coulomb counting and a piecewise voltage curve
//! - **Device**: per-device state and the per-tick model
//! - **Engine**: registry of running devices, timers and demo overrides
//!
//! ## Usage
//!
//! ```no_run
//! use solar_telemetry_sim::config::SimulationConfig;
//! use solar_telemetry_sim::simulation::{SimulationEngine, VirtualClock};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let clock = VirtualClock::from_wall_clock(60.0);
//! let engine = SimulationEngine::new(SimulationConfig::default(), clock)?;
//!
//! engine.start("household-1", |reading| {
//!     println!("battery at {}%", reading.battery_level);
//! });
//!
//! engine.set_battery_level("household-1", 15.0)?;
//! engine.stop_all();
//! # Ok(())
//! # }
//! ```

pub mod battery;
pub mod clock;
pub mod device;
pub mod engine;
pub mod load;
pub mod noise;
pub mod solar;

pub use clock::{is_daytime, DayPart, VirtualClock};
pub use device::{DeviceId, DeviceModel, DeviceState, Reading};
pub use engine::{NoiseFactory, ReadingSink, SimulationEngine, SimulationError};
pub use load::LoadProfile;
pub use noise::{ConstantNoise, NoiseSource, RandomNoise};
pub use solar::SolarProfile;
