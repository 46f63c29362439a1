//! API server: HTTP router, middleware stack, and metrics exporter.

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use beacon_core::config::AppConfig;

use crate::rest::AppState;
use crate::{funnel_rest, goal_rest, rest};

pub struct ApiServer {
    config: AppConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: AppConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = router(self.state.clone());

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);
        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the Prometheus metrics exporter on its own port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        let handle = builder
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install_recorder()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");

        // Keep the handle alive
        std::mem::forget(handle);
        Ok(())
    }
}

/// Build the REST router.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Funnel definitions and analytics
        .route(
            "/v1/funnels",
            post(funnel_rest::create_funnel).get(funnel_rest::list_funnels),
        )
        .route(
            "/v1/funnels/:id",
            get(funnel_rest::get_funnel)
                .put(funnel_rest::update_funnel)
                .delete(funnel_rest::delete_funnel),
        )
        .route("/v1/funnels/:id/analytics", get(funnel_rest::funnel_analytics))
        .route(
            "/v1/funnels/:id/analytics/referrers",
            get(funnel_rest::funnel_referrer_analytics),
        )
        // Goal definitions and analytics
        .route(
            "/v1/goals",
            post(goal_rest::create_goal).get(goal_rest::list_goals),
        )
        .route(
            "/v1/goals/:id",
            get(goal_rest::get_goal)
                .put(goal_rest::update_goal)
                .delete(goal_rest::delete_goal),
        )
        .route("/v1/goals/:id/analytics", get(goal_rest::goal_analytics))
        .route(
            "/v1/goals/analytics/bulk",
            post(goal_rest::bulk_goal_analytics),
        )
        // Operational endpoints
        .route("/health", get(rest::health_check))
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
