use anyhow::Result;
use solar_telemetry_sim::{api, config, simulation::SimulationEngine, telemetry};
use config::Config;
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load()?;

    let engine = SimulationEngine::from_config(&cfg)?;
    for device_id in &cfg.devices.autostart {
        engine.start(device_id.clone(), telemetry::reading_logger(device_id.clone()));
    }

    let app = api::router(api::AppState::new(engine.clone()), &cfg);
    let addr = cfg.server.socket_addr()?;

    if cfg.server.host == "0.0.0.0" {
        warn!("server binding to 0.0.0.0 - simulation controls will be reachable from the network");
    }

    info!(
        %addr,
        devices = engine.active_count(),
        tick_interval_secs = cfg.simulation.tick_interval_secs,
        virtual_hour = engine.clock().hour_now(),
        "starting solar telemetry simulator"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    engine.stop_all();
    warn!("shutdown complete");
    Ok(())
}
