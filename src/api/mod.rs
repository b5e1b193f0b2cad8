pub mod devices;
pub mod error;
pub mod health;
pub mod response;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{config::Config, simulation::SimulationEngine};

#[derive(Clone, Debug)]
pub struct AppState {
    pub engine: SimulationEngine,
}

impl AppState {
    pub fn new(engine: SimulationEngine) -> Self {
        Self { engine }
    }
}

pub fn router(state: AppState, cfg: &Config) -> Router {
    Router::new()
        .nest("/api/v1", v1_router(state))
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(64 * 1024))
                .layer(TimeoutLayer::new(Duration::from_secs(cfg.server.request_timeout_secs))),
        )
        .layer(TraceLayer::new_for_http())
}

fn v1_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::health_check))
        .route("/devices", get(devices::list_devices))
        .route(
            "/devices/:id/simulation",
            post(devices::start_simulation).delete(devices::stop_simulation),
        )
        .route("/devices/:id/reading", get(devices::get_reading))
        .route("/devices/:id/battery", put(devices::set_battery_level))
        .route("/devices/:id/power-cut", post(devices::simulate_power_cut))
        .with_state(state)
}
