//! # Accelerated Virtual Clock
//!
//! Compresses a full day/night cycle into a short real-time window so that
//! solar variation is visible during a demo. With the default acceleration of
//! 60, one real minute is one virtual hour and a virtual day lasts 24 minutes.
//!
//! Elapsed time is measured on the monotonic [`Instant`] clock; wall-clock
//! time is only read once, when the clock is anchored.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::time::Instant;

use crate::config::ClockConfig;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Coarse part of the day, derived from the virtual hour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DayPart {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl DayPart {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => DayPart::Morning,
            12..=17 => DayPart::Afternoon,
            18..=21 => DayPart::Evening,
            _ => DayPart::Night,
        }
    }
}

/// Solar daytime window, inclusive on both ends
pub fn is_daytime(hour: u32) -> bool {
    (6..=18).contains(&hour)
}

#[derive(Debug, Clone, Copy)]
pub struct VirtualClock {
    anchor: Instant,
    /// Virtual milliseconds already elapsed at `anchor`
    anchor_virtual_ms: f64,
    acceleration: f64,
}

impl VirtualClock {
    /// Anchor the virtual day to wall-clock Unix time, so every clock built
    /// with the same acceleration agrees on the current virtual hour.
    pub fn from_wall_clock(acceleration: f64) -> Self {
        let unix_ms = Utc::now().timestamp_millis() as f64;
        Self {
            anchor: Instant::now(),
            anchor_virtual_ms: unix_ms * acceleration,
            acceleration,
        }
    }

    /// Start the virtual day at the top of `hour` (taken modulo 24).
    pub fn starting_at_hour(hour: u32, acceleration: f64) -> Self {
        Self {
            anchor: Instant::now(),
            anchor_virtual_ms: f64::from(hour % 24) * MS_PER_HOUR,
            acceleration,
        }
    }

    pub fn from_config(cfg: &ClockConfig) -> Self {
        match cfg.start_hour {
            Some(hour) => Self::starting_at_hour(hour, cfg.acceleration),
            None => Self::from_wall_clock(cfg.acceleration),
        }
    }

    /// Virtual hour of day (0-23) at `now`. Instants before the anchor map
    /// to the anchor hour.
    pub fn hour_at(&self, now: Instant) -> u32 {
        let elapsed_ms = now.saturating_duration_since(self.anchor).as_secs_f64() * 1000.0;
        let virtual_ms = self.anchor_virtual_ms + elapsed_ms * self.acceleration;
        ((virtual_ms / MS_PER_HOUR).floor() as i64).rem_euclid(24) as u32
    }

    pub fn hour_now(&self) -> u32 {
        self.hour_at(Instant::now())
    }
}
