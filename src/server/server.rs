use std::future::Future;

use anyhow::{Context, Result};
use axum::Router;
use tracing::info;

use crate::config::settings::SettingsConfig;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
}

impl AppState {
    pub fn new(metrics: &Metrics) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
        }
    }
}

pub fn router(settings_config: &SettingsConfig, metrics: &Metrics) -> Router {
    let state = AppState::new(metrics);
    Router::new()
        .merge(state.metrics_state.router(&settings_config.metrics))
        .with_state(state)
}

/// Serve the metrics endpoint until `shutdown` resolves. Returns immediately
/// when there is nothing to serve.
pub async fn start<F>(settings_config: &SettingsConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics = get_metrics().await;
    let app = router(settings_config, metrics);

    let Some(server) = &settings_config.server else {
        return Ok(());
    };
    if !app.has_routes() {
        return Ok(());
    }

    let bind_addr = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind metrics server on {}", bind_addr))?;
    info!(address = %bind_addr, path = %settings_config.metrics.path, "metrics server listening");

    metrics.up.set(1);
    let served = axum::serve(listener, app).with_graceful_shutdown(shutdown).await;
    metrics.up.set(0);
    served.context("metrics server failed")
}
