use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::simulation::Reading;

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hyper=warn,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Sink that emits every reading as a structured log event
pub fn reading_logger(device_id: impl Into<String>) -> impl Fn(Reading) + Send + Sync + 'static {
    let device_id = device_id.into();
    move |reading: Reading| {
        info!(
            device_id = %device_id,
            battery_level = reading.battery_level,
            voltage = reading.voltage,
            current = reading.current,
            power_consumption = reading.power_consumption,
            solar_generation = reading.solar_generation,
            temperature = reading.temperature,
            hour_of_day = reading.hour_of_day,
            is_daytime = reading.is_daytime,
            "sensor reading"
        );
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! { _ = ctrl_c => {}, _ = terminate => {}, }
    info!("shutdown signal received");
}
