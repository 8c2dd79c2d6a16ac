mod auth;
mod autosave;
mod error;
mod handlers;
mod metrics;
mod orchestrator;
mod routes;
#[cfg(test)]
mod testing;

use anyhow::Context;
use axum::Router;
use judge_common::config::{Config, LogFormat};
use judge_common::RedisStore;
use judge_engine::HttpEngine;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::autosave::AutosaveCoordinator;
use crate::orchestrator::Judge;

pub struct AppState {
    pub judge: Arc<Judge>,
    pub autosave: AutosaveCoordinator,
    pub start_time: Arc<std::time::Instant>,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new().merge(routes::routes()).with_state(state)
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    init_tracing(config.log_format);

    info!("Judge API booting...");

    metrics::init_metrics().context("Failed to register metrics")?;
    info!("Metrics registry initialized");

    let store = RedisStore::connect(&config.redis_url)
        .await
        .context("Failed to connect to Redis")?;
    info!("Connected to Redis: {}", config.redis_url);

    let engine = HttpEngine::with_deadlines(
        &config.execution_service_url,
        config.execution_timeout(),
        config.execution_connect_timeout(),
    )
    .context("Failed to build execution client")?;
    info!(
        "Execution service: {} (timeout {:?}, attempts {})",
        engine.run_url(),
        config.execution_timeout(),
        config.execution_max_attempts
    );

    let store = Arc::new(store);
    let judge = Judge::new(store.clone(), Arc::new(engine), config.execution_max_attempts);
    let autosave = AutosaveCoordinator::new(store, config.autosave_debounce());

    let state = Arc::new(AppState {
        judge: Arc::new(judge),
        autosave: autosave.clone(),
        start_time: Arc::new(std::time::Instant::now()),
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    let flushed = autosave.flush_all().await;
    info!("Flushed {} pending drafts, exiting", flushed);
    Ok(())
}
