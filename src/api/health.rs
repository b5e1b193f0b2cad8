use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;

use super::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    active_devices: usize,
    virtual_hour: u32,
}

/// GET /healthz
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        active_devices: state.engine.active_count(),
        virtual_hour: state.engine.clock().hour_now(),
    })
}
