use std::sync::Arc;

use delivery_tracker::{api, config, error, state};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let shared_state = Arc::new(state::AppState::new(
        config.lock_timeout(),
        config.event_buffer_size,
    ));

    let app = api::rest::router(shared_state.clone());

    let scheduler = shared_state.simulation(config.simulation_settings(), config.simulation_seed);
    let stop_simulation = CancellationToken::new();
    let simulation = tokio::spawn({
        let cancel = stop_simulation.clone();
        async move { scheduler.run(cancel).await }
    });

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")));

    stop_simulation.cancel();
    if let Err(err) = simulation.await {
        tracing::error!(error = %err, "simulation task panicked");
    }

    served
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
