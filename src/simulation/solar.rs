//! # Solar Generation Model
//!
//! Triangular daytime profile: zero at the edges of the daylight window,
//! rising linearly to the peak current at virtual noon. Uniform noise is
//! added on top and the result is floored at zero, so reported generation is
//! never negative even at dawn and dusk.

use serde::{Deserialize, Serialize};

use super::clock::is_daytime;
use super::noise::NoiseSource;
use crate::config::SimulationConfig;

const PEAK_HOUR: f64 = 12.0;
/// Hours between the peak and the zero crossings of the triangle
const HALF_WIDTH_HOURS: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolarProfile {
    /// Current at virtual noon in amps
    pub peak_amps: f64,
    /// Half-width of the uniform noise band in amps
    pub noise_amps: f64,
}

impl Default for SolarProfile {
    fn default() -> Self {
        Self {
            peak_amps: 5.0,
            noise_amps: 0.25,
        }
    }
}

impl SolarProfile {
    pub fn from_config(cfg: &SimulationConfig) -> Self {
        Self {
            peak_amps: cfg.peak_solar_amps,
            noise_amps: cfg.solar_noise_amps,
        }
    }

    /// Noise-free generation for a virtual hour
    pub fn clear_sky_amps(&self, hour: u32) -> f64 {
        if !is_daytime(hour) {
            return 0.0;
        }
        let hours_from_peak = (f64::from(hour) - PEAK_HOUR).abs();
        (self.peak_amps * (1.0 - hours_from_peak / HALF_WIDTH_HOURS)).max(0.0)
    }

    /// Generation for a virtual hour including noise. Nighttime draws no
    /// noise and returns exactly zero.
    pub fn generation_amps(&self, hour: u32, noise: &mut dyn NoiseSource) -> f64 {
        if !is_daytime(hour) {
            return 0.0;
        }
        (self.clear_sky_amps(hour) + noise.solar_noise(self.noise_amps)).max(0.0)
    }
}
