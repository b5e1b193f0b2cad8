//! Random draws used by the device model.
//!
//! Every stochastic input goes through [`NoiseSource`] so tests can pin the
//! values and seeded runs are reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait NoiseSource: Send {
    /// Uniform offset in `[-amplitude, amplitude]` added to daytime solar current
    fn solar_noise(&mut self, amplitude: f64) -> f64;

    /// Uniform appliance draw in `[0, max)` on top of the base load
    fn appliance_load(&mut self, max: f64) -> f64;

    /// Uniform ambient temperature offset in `[0, spread)`
    fn ambient_offset(&mut self, spread: f64) -> f64;

    /// Whole-percent starting battery level in `[min, max)`
    fn initial_battery_level(&mut self, min: f64, max: f64) -> f64;
}

/// [`NoiseSource`] backed by any [`Rng`]
#[derive(Debug, Clone)]
pub struct RandomNoise<R = StdRng> {
    rng: R,
}

impl RandomNoise<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> RandomNoise<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    fn unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

impl<R: Rng + Send> NoiseSource for RandomNoise<R> {
    fn solar_noise(&mut self, amplitude: f64) -> f64 {
        (self.unit() - 0.5) * 2.0 * amplitude
    }

    fn appliance_load(&mut self, max: f64) -> f64 {
        self.unit() * max
    }

    fn ambient_offset(&mut self, spread: f64) -> f64 {
        self.unit() * spread
    }

    fn initial_battery_level(&mut self, min: f64, max: f64) -> f64 {
        (min + self.unit() * (max - min)).floor().max(min)
    }
}

/// Fixed draws, expressed as fractions of each range (0.0 = low end, 1.0 = high end)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantNoise {
    pub solar: f64,
    pub appliance: f64,
    pub ambient: f64,
    pub initial_battery: f64,
}

impl ConstantNoise {
    /// Every draw at the middle of its range; solar noise is exactly zero
    pub fn midpoint() -> Self {
        Self {
            solar: 0.5,
            appliance: 0.5,
            ambient: 0.5,
            initial_battery: 0.5,
        }
    }
}

impl NoiseSource for ConstantNoise {
    fn solar_noise(&mut self, amplitude: f64) -> f64 {
        (self.solar - 0.5) * 2.0 * amplitude
    }

    fn appliance_load(&mut self, max: f64) -> f64 {
        self.appliance * max
    }

    fn ambient_offset(&mut self, spread: f64) -> f64 {
        self.ambient * spread
    }

    fn initial_battery_level(&mut self, min: f64, max: f64) -> f64 {
        (min + self.initial_battery * (max - min))
            .floor()
            .clamp(min, (max - 1.0).max(min))
    }
}
