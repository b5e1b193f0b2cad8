//! # Simulation Engine
//!
//! Owns one [`DeviceState`] per running device and a Tokio task per device
//! that advances it on a fixed interval and hands each [`Reading`] to a
//! caller-supplied sink.
//!
//! Each device sits behind its own mutex. Ticks, overrides and `stop` all
//! take that lock, and the sink is called while it is held, so once `stop`
//! (or `stop_all`) returns no further reading can reach that device's sink.
//! Sinks must therefore not call back into the engine for their own device.

use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::clock::VirtualClock;
use super::device::{DeviceId, DeviceModel, DeviceState, Reading};
use super::noise::{NoiseSource, RandomNoise};
use crate::config::{Config, ConfigError, SimulationConfig};

/// Override errors; the engine itself has no fatal failure modes
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimulationError {
    #[error("no active simulation for device {0}")]
    UnknownDevice(DeviceId),
    #[error("battery level must be a finite number, got {0}")]
    InvalidBatteryLevel(f64),
}

impl SimulationError {
    pub fn is_unknown_device(&self) -> bool {
        matches!(self, SimulationError::UnknownDevice(_))
    }
}

pub type ReadingSink = Arc<dyn Fn(Reading) + Send + Sync>;

/// Builds the noise source for a newly started device
pub type NoiseFactory = Arc<dyn Fn(&str) -> Box<dyn NoiseSource> + Send + Sync>;

struct ActiveDevice {
    state: DeviceState,
    noise: Box<dyn NoiseSource>,
    sink: ReadingSink,
}

/// Shared between the registry and the device's timer task. `None` once
/// the run has been stopped.
struct DeviceSlot {
    active: Mutex<Option<ActiveDevice>>,
    clock: VirtualClock,
    model: DeviceModel,
}

impl DeviceSlot {
    /// Advance and deliver. Returns `None` after the run was stopped.
    fn tick(&self) -> Option<Reading> {
        let mut guard = self.active.lock();
        let device = guard.as_mut()?;
        let now = Instant::now();
        let hour = self.clock.hour_at(now);
        let reading = device
            .state
            .advance_to(now, hour, Utc::now(), &self.model, device.noise.as_mut());
        trace!(
            device_id = %device.state.device_id,
            battery_level = reading.battery_level,
            current = reading.current,
            hour_of_day = reading.hour_of_day,
            "simulation tick"
        );
        (device.sink)(reading.clone());
        Some(reading)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut DeviceState) -> T) -> Option<T> {
        self.active.lock().as_mut().map(|device| f(&mut device.state))
    }

    /// Blocks until any in-flight tick has finished delivering.
    fn clear(&self) {
        *self.active.lock() = None;
    }
}

struct DeviceRun {
    slot: Arc<DeviceSlot>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl DeviceRun {
    fn retire(self) {
        self.cancel.cancel();
        self.task.abort();
        self.slot.clear();
    }
}

struct EngineInner {
    sim: SimulationConfig,
    model: DeviceModel,
    clock: VirtualClock,
    noise: NoiseFactory,
    runs: Mutex<HashMap<DeviceId, DeviceRun>>,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        for (_, run) in self.runs.get_mut().drain() {
            run.retire();
        }
    }
}

/// Cheap to clone; all clones share one device registry.
#[derive(Clone)]
pub struct SimulationEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for SimulationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationEngine")
            .field("active_devices", &self.active_count())
            .field("tick_interval", &self.tick_interval())
            .finish()
    }
}

impl SimulationEngine {
    /// Engine with random noise, seeded from `sim.random_seed` when set.
    /// Fails if `sim` does not pass [`SimulationConfig::validate`].
    pub fn new(sim: SimulationConfig, clock: VirtualClock) -> Result<Self, ConfigError> {
        let master = Mutex::new(match sim.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        });
        let noise: NoiseFactory = Arc::new(move |_device_id: &str| {
            let seed = master.lock().gen::<u64>();
            Box::new(RandomNoise::seeded(seed)) as Box<dyn NoiseSource>
        });
        Self::with_noise_factory(sim, clock, noise)
    }

    pub fn with_noise_factory(
        sim: SimulationConfig,
        clock: VirtualClock,
        noise: NoiseFactory,
    ) -> Result<Self, ConfigError> {
        sim.validate()?;
        let model = DeviceModel::from_config(&sim);
        Ok(Self {
            inner: Arc::new(EngineInner {
                sim,
                model,
                clock,
                noise,
                runs: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        cfg.clock.validate()?;
        Self::new(cfg.simulation.clone(), VirtualClock::from_config(&cfg.clock))
    }

    pub fn tick_interval(&self) -> Duration {
        self.inner.sim.tick_interval()
    }

    pub fn clock(&self) -> &VirtualClock {
        &self.inner.clock
    }

    /// Start (or restart) the simulation for `device_id`.
    ///
    /// The first reading is delivered to `sink` before this returns and is
    /// also returned here; later readings follow every tick interval until
    /// the device is stopped. Any existing run for the same id is stopped and
    /// replaced. Returns `None` only if another caller stopped the new run
    /// before its first reading.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<F>(&self, device_id: impl Into<DeviceId>, sink: F) -> Option<Reading>
    where
        F: Fn(Reading) + Send + Sync + 'static,
    {
        let device_id = device_id.into();
        let sim = &self.inner.sim;

        let mut noise = (self.inner.noise)(&device_id);
        let initial_level =
            noise.initial_battery_level(sim.initial_battery_min, sim.initial_battery_max);
        let now = Instant::now();
        let state = DeviceState::new(device_id.clone(), initial_level, now, self.inner.clock.hour_at(now));

        let slot = Arc::new(DeviceSlot {
            active: Mutex::new(Some(ActiveDevice {
                state,
                noise,
                sink: Arc::new(sink),
            })),
            clock: self.inner.clock,
            model: self.inner.model,
        });

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_ticks(slot.clone(), cancel.clone(), self.tick_interval()));
        let replaced = self.inner.runs.lock().insert(
            device_id.clone(),
            DeviceRun {
                slot: slot.clone(),
                cancel,
                task,
            },
        );
        if let Some(old) = replaced {
            old.retire();
            debug!(device_id = %device_id, "replaced running simulation");
        }

        info!(device_id = %device_id, battery_level = initial_level, "started sensor simulation");
        slot.tick()
    }

    /// Stop the simulation for `device_id` and discard its state. Unknown
    /// ids are ignored.
    pub fn stop(&self, device_id: &str) {
        let removed = self.inner.runs.lock().remove(device_id);
        if let Some(run) = removed {
            run.retire();
            info!(device_id = %device_id, "stopped sensor simulation");
        }
    }

    /// Stop every running simulation.
    pub fn stop_all(&self) {
        let runs: Vec<_> = self.inner.runs.lock().drain().collect();
        let count = runs.len();
        for (_, run) in runs {
            run.retire();
        }
        if count > 0 {
            info!(count, "stopped all sensor simulations");
        }
    }

    /// Overwrite the battery level (clamped to 0-100) without recomputing
    /// derived fields. Returns the stored level.
    pub fn set_battery_level(&self, device_id: &str, level: f64) -> Result<f64, SimulationError> {
        if !level.is_finite() {
            return Err(SimulationError::InvalidBatteryLevel(level));
        }
        let stored = self
            .slot(device_id)
            .and_then(|slot| slot.with_state(|state| state.set_battery_level(level)))
            .ok_or_else(|| SimulationError::UnknownDevice(device_id.to_string()))?;
        debug!(device_id = %device_id, battery_level = stored, "battery level overridden");
        Ok(stored)
    }

    /// Cut solar input and drop the load to standby for the next reading.
    pub fn simulate_power_cut(&self, device_id: &str) -> Result<(), SimulationError> {
        let factor = self.inner.model.power_cut_load_factor;
        self.slot(device_id)
            .and_then(|slot| slot.with_state(|state| state.apply_power_cut(factor)))
            .ok_or_else(|| SimulationError::UnknownDevice(device_id.to_string()))?;
        debug!(device_id = %device_id, "power cut simulated");
        Ok(())
    }

    /// Advance now and deliver to the sink, outside the regular schedule.
    pub fn sample_now(&self, device_id: &str) -> Option<Reading> {
        self.slot(device_id)?.tick()
    }

    /// Current state as a reading, without advancing it.
    pub fn snapshot(&self, device_id: &str) -> Option<Reading> {
        self.slot(device_id)?.with_state(|state| state.reading())
    }

    pub fn is_running(&self, device_id: &str) -> bool {
        self.inner.runs.lock().contains_key(device_id)
    }

    pub fn active_devices(&self) -> Vec<DeviceId> {
        let mut ids: Vec<_> = self.inner.runs.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn active_count(&self) -> usize {
        self.inner.runs.lock().len()
    }

    fn slot(&self, device_id: &str) -> Option<Arc<DeviceSlot>> {
        self.inner.runs.lock().get(device_id).map(|run| run.slot.clone())
    }
}

async fn run_ticks(slot: Arc<DeviceSlot>, cancel: CancellationToken, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if slot.tick().is_none() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::noise::ConstantNoise;
    use rstest::rstest;

    fn recorder() -> (Arc<Mutex<Vec<Reading>>>, impl Fn(Reading) + Send + Sync + 'static) {
        let readings = Arc::new(Mutex::new(Vec::new()));
        let sink_readings = readings.clone();
        (readings, move |reading| sink_readings.lock().push(reading))
    }

    fn fixed_engine(noise: ConstantNoise, start_hour: u32) -> SimulationEngine {
        let factory: NoiseFactory = Arc::new(move |_: &str| Box::new(noise) as Box<dyn NoiseSource>);
        SimulationEngine::with_noise_factory(
            SimulationConfig::default(),
            VirtualClock::starting_at_hour(start_hour, 60.0),
            factory,
        )
        .unwrap()
    }

    fn seeded_engine() -> SimulationEngine {
        let sim = SimulationConfig {
            random_seed: Some(42),
            ..Default::default()
        };
        SimulationEngine::new(sim, VirtualClock::starting_at_hour(12, 60.0)).unwrap()
    }

    #[rstest]
    #[case::zero_capacity(SimulationConfig { battery_capacity_ah: 0.0, ..Default::default() }, "battery_capacity_ah")]
    #[case::zero_interval(SimulationConfig { tick_interval_secs: 0, ..Default::default() }, "tick_interval_secs")]
    fn test_invalid_config_is_refused(#[case] sim: SimulationConfig, #[case] field: &str) {
        let err = SimulationEngine::new(sim, VirtualClock::starting_at_hour(0, 60.0)).unwrap_err();
        assert!(matches!(err, ConfigError::NotPositive { field: f, .. } if f == field));
    }

    #[test]
    fn test_from_config_refuses_bad_clock() {
        let mut cfg = Config::default();
        cfg.clock.start_hour = Some(24);
        assert_eq!(
            SimulationEngine::from_config(&cfg).unwrap_err(),
            ConfigError::InvalidStartHour(24)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_delivers_first_reading_synchronously() {
        let engine = seeded_engine();
        let (readings, sink) = recorder();

        let returned = engine.start("H1", sink);

        let first = readings.lock().clone();
        assert_eq!(first.len(), 1);
        assert_eq!(returned.as_ref(), first.first());
        assert!((40.0..100.0).contains(&first[0].battery_level));
        assert_eq!(first[0].hour_of_day, 12);
        assert!(engine.is_running("H1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_readings_follow_tick_interval() {
        let engine = seeded_engine();
        let (readings, sink) = recorder();
        engine.start("H1", sink);

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(readings.lock().len(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(readings.lock().len(), 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(readings.lock().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_run() {
        let engine = seeded_engine();
        let (old_readings, old_sink) = recorder();
        let (new_readings, new_sink) = recorder();

        engine.start("H1", old_sink);
        engine.start("H1", new_sink);
        assert_eq!(engine.active_count(), 1);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(old_readings.lock().len(), 1);
        assert_eq!(new_readings.lock().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_silences_sink() {
        let engine = seeded_engine();
        let (readings, sink) = recorder();
        engine.start("H1", sink);

        engine.stop("H1");
        engine.stop("H1");
        engine.stop("never-started");

        assert!(!engine.is_running("H1"));
        assert!(engine.snapshot("H1").is_none());
        assert!(engine.sample_now("H1").is_none());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(readings.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_clears_every_device() {
        let engine = seeded_engine();
        let mut recorders = Vec::new();
        for id in ["H1", "H2", "H3"] {
            let (readings, sink) = recorder();
            engine.start(id, sink);
            recorders.push(readings);
        }
        assert_eq!(engine.active_devices(), vec!["H1", "H2", "H3"]);

        engine.stop_all();
        engine.stop_all();
        assert_eq!(engine.active_count(), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        for readings in recorders {
            assert_eq!(readings.lock().len(), 1);
        }
    }

    #[rstest]
    #[case(150.0, 100.0)]
    #[case(-10.0, 0.0)]
    #[case(42.5, 42.5)]
    #[tokio::test(start_paused = true)]
    async fn test_set_battery_level_clamps(#[case] requested: f64, #[case] stored: f64) {
        let engine = seeded_engine();
        engine.start("H1", |_| {});

        assert_eq!(engine.set_battery_level("H1", requested), Ok(stored));
        assert_eq!(engine.snapshot("H1").unwrap().battery_level, stored);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrides_on_unknown_device_fail_without_creating_state() {
        let engine = seeded_engine();

        let err = engine.set_battery_level("ghost", 50.0).unwrap_err();
        assert!(err.is_unknown_device());
        assert_eq!(
            engine.simulate_power_cut("ghost"),
            Err(SimulationError::UnknownDevice("ghost".to_string()))
        );
        assert!(!engine.is_running("ghost"));
        assert!(engine.snapshot("ghost").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_finite_battery_level_rejected() {
        let engine = seeded_engine();
        engine.start("H1", |_| {});
        let before = engine.snapshot("H1").unwrap().battery_level;

        assert!(matches!(
            engine.set_battery_level("H1", f64::NAN),
            Err(SimulationError::InvalidBatteryLevel(_))
        ));
        assert_eq!(engine.snapshot("H1").unwrap().battery_level, before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_power_cut_affects_next_reading_only() {
        let engine = fixed_engine(ConstantNoise::midpoint(), 12);
        let (readings, sink) = recorder();
        engine.start("H1", sink);

        engine.simulate_power_cut("H1").unwrap();
        let pending = engine.snapshot("H1").unwrap();
        assert_eq!(pending.solar_generation, 0.0);
        assert_eq!(pending.current, -pending.power_consumption);

        let cut = engine.sample_now("H1").unwrap();
        assert_eq!(cut.solar_generation, 0.0);
        assert_eq!(cut.power_consumption, 0.11);

        let normal = engine.sample_now("H1").unwrap();
        assert_eq!(normal.solar_generation, 5.0);
        assert_eq!(normal.power_consumption, 1.05);
        assert_eq!(readings.lock().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_virtual_hour_advances_with_time() {
        let engine = fixed_engine(ConstantNoise::midpoint(), 11);
        let (readings, sink) = recorder();
        engine.start("H1", sink);

        tokio::time::sleep(Duration::from_secs(61)).await;
        let readings = readings.lock();
        assert_eq!(readings.first().unwrap().hour_of_day, 11);
        assert_eq!(readings.last().unwrap().hour_of_day, 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_accumulates_across_ticks() {
        // midpoint noise at night: 1.05 A steady discharge
        let engine = fixed_engine(ConstantNoise::midpoint(), 0);
        engine.start("H1", |_| {});
        assert_eq!(engine.snapshot("H1").unwrap().battery_level, 70.0);

        tokio::time::sleep(Duration::from_secs(50)).await;
        let level = engine.snapshot("H1").unwrap().battery_level;
        // 1.05 A * 50 s into 100 Ah = 0.0146 points
        assert_eq!(level, 70.0);
        engine.set_battery_level("H1", 0.0).unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(engine.snapshot("H1").unwrap().battery_level, 0.0);
    }
}
