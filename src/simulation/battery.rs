//! # Battery Model
//!
//! Coulomb-counting state of charge for a 12 V pack and a piecewise-linear
//! open-circuit voltage curve. The curve is flat through the middle of the
//! range and steepens near full and near empty, like a lithium discharge
//! curve rather than a linear one.
//!
//! | level      | voltage                  |
//! |------------|--------------------------|
//! | >= 90      | 12.6 + (level-90) * 0.02 |
//! | 50 .. 90   | 12.2 + (level-50) * 0.01 |
//! | 20 .. 50   | 11.8 + (level-20) * 0.013|
//! | < 20       | 11.0 + level * 0.04      |

pub const MIN_LEVEL: f64 = 0.0;
pub const MAX_LEVEL: f64 = 100.0;

const SECONDS_PER_HOUR: f64 = 3600.0;

pub fn clamp_level(level: f64) -> f64 {
    level.clamp(MIN_LEVEL, MAX_LEVEL)
}

pub fn voltage_for_level(level: f64) -> f64 {
    if level >= 90.0 {
        12.6 + (level - 90.0) * 0.02
    } else if level >= 50.0 {
        12.2 + (level - 50.0) * 0.01
    } else if level >= 20.0 {
        11.8 + (level - 20.0) * 0.013
    } else {
        11.0 + level * 0.04
    }
}

/// Change in state of charge (percentage points) from `net_amps` flowing
/// for `dt_secs` into a pack of `capacity_ah`.
pub fn charge_delta_percent(net_amps: f64, dt_secs: f64, capacity_ah: f64) -> f64 {
    let amp_hours = net_amps * dt_secs / SECONDS_PER_HOUR;
    amp_hours / capacity_ah * 100.0
}

/// Integrate `net_amps` over `dt_secs` and clamp the result.
pub fn integrate(level: f64, net_amps: f64, dt_secs: f64, capacity_ah: f64) -> f64 {
    clamp_level(level + charge_delta_percent(net_amps, dt_secs, capacity_ah))
}
