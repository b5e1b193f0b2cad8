//! Device simulation control endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use super::{error::ApiError, response::ApiResponse, AppState};
use crate::{simulation::Reading, telemetry::reading_logger};

#[derive(Debug, Deserialize)]
pub struct SetBatteryRequest {
    pub level: f64,
}

#[derive(Debug, Serialize)]
pub struct BatteryOverride {
    pub device_id: String,
    pub battery_level: f64,
}

/// GET /devices
pub async fn list_devices(State(st): State<AppState>) -> impl IntoResponse {
    let devices = st.engine.active_devices();
    let count = devices.len();
    ApiResponse::success(devices).with_count(count)
}

/// POST /devices/:id/simulation
pub async fn start_simulation(
    State(st): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<ApiResponse<Reading>, ApiError> {
    let reading = st
        .engine
        .start(device_id.clone(), reading_logger(device_id.clone()))
        .ok_or_else(|| ApiError::Conflict(format!("simulation for {device_id} was stopped while starting")))?;
    Ok(ApiResponse::created(reading))
}

/// DELETE /devices/:id/simulation
pub async fn stop_simulation(
    State(st): State<AppState>,
    Path(device_id): Path<String>,
) -> impl IntoResponse {
    st.engine.stop(&device_id);
    StatusCode::NO_CONTENT
}

/// GET /devices/:id/reading
pub async fn get_reading(
    State(st): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<ApiResponse<Reading>, ApiError> {
    st.engine
        .snapshot(&device_id)
        .map(ApiResponse::success)
        .ok_or_else(|| ApiError::NotFound(format!("device {device_id} not found or simulation not running")))
}

/// PUT /devices/:id/battery
pub async fn set_battery_level(
    State(st): State<AppState>,
    Path(device_id): Path<String>,
    Json(req): Json<SetBatteryRequest>,
) -> Result<ApiResponse<BatteryOverride>, ApiError> {
    let battery_level = st.engine.set_battery_level(&device_id, req.level)?;
    Ok(ApiResponse::success(BatteryOverride {
        device_id,
        battery_level,
    }))
}

/// POST /devices/:id/power-cut
pub async fn simulate_power_cut(
    State(st): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    st.engine.simulate_power_cut(&device_id)?;
    Ok(StatusCode::ACCEPTED)
}
