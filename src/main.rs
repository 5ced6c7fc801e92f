mod api;
mod config;
mod engine;
mod error;
mod events;
mod geo;
mod models;
mod observability;
mod state;
mod store;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let providers = config::load_providers(config.providers_file.as_deref())?;
    let coverage = config::load_coverage(config.coverage_file.as_deref())?;

    let app_state = state::AppState::new(providers, coverage, config.event_buffer_size)?;
    let shared_state = Arc::new(app_state);

    tracing::info!(
        providers = shared_state.providers.len(),
        coverage_areas = shared_state.coverage.len(),
        "registry seeded"
    );

    let app = api::rest::router(shared_state.clone());

    tokio::spawn(engine::reminders::run_reminder_sweep(
        shared_state.clone(),
        config.sweep_interval_secs,
    ));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
