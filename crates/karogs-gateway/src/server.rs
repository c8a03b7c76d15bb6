//! HTTP server implementation using Axum.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::get;
use karogs_calendar::FlagDayRegistry;
use karogs_core::SubscriberDirectory;
use karogs_core::config::GatewayConfig;
use tokio::sync::Notify;
use tower_http::trace::TraceLayer;

/// Shared state for the gateway server.
pub struct AppState {
    pub registry: Arc<FlagDayRegistry>,
    pub directory: Arc<dyn SubscriberDirectory>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(registry: Arc<FlagDayRegistry>, directory: Arc<dyn SubscriberDirectory>) -> Self {
        Self {
            registry,
            directory,
            start_time: Instant::now(),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(super::routes::health_check))
        .route("/api/v1/flag-days", get(super::routes::list_flag_days))
        .route("/api/v1/flag-days/next", get(super::routes::next_flag_day))
        .fallback(super::routes::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `stop` is notified. In-flight requests are allowed to finish.
pub async fn start(config: &GatewayConfig, state: Arc<AppState>, stop: Arc<Notify>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Gateway listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { stop.notified().await })
        .await?;

    tracing::info!("🌐 Gateway stopped");
    Ok(())
}
