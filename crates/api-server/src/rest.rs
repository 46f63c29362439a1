//! Shared REST plumbing: application state, error mapping, and the
//! operational endpoints.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use beacon_core::error::BeaconError;
use beacon_core::types::QueryContext;
use beacon_funnel::{FunnelEngine, FunnelRegistry, GoalRegistry};
use beacon_store::ClickHouseEventStore;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<FunnelEngine<ClickHouseEventStore>>,
    pub funnels: Arc<FunnelRegistry>,
    pub goals: Arc<GoalRegistry>,
    pub node_id: String,
    pub start_time: Instant,
    pub default_range_days: u32,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map engine/registry errors onto HTTP responses.
pub(crate) fn error_response(error: BeaconError) -> ApiError {
    let (status, code) = match &error {
        BeaconError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "invalid_argument"),
        BeaconError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        BeaconError::QueryFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "query_failed"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    };
    (
        status,
        Json(ErrorResponse {
            error: code.to_string(),
            message: error.to_string(),
        }),
    )
}

/// Optional date range attached to analytics requests.
#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub website_id: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebsiteQuery {
    pub website_id: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

/// Resolve the requested range, defaulting to the trailing N days.
pub(crate) fn resolve_range(
    start_date: &Option<String>,
    end_date: &Option<String>,
    default_days: u32,
) -> (String, String) {
    match (start_date, end_date) {
        (Some(start), Some(end)) => (start.clone(), end.clone()),
        _ => {
            let end = Utc::now().date_naive();
            let start = end - Duration::days(default_days as i64);
            (
                start.format("%Y-%m-%d").to_string(),
                end.format("%Y-%m-%d").to_string(),
            )
        }
    }
}

/// Assemble the engine query context. The end date is widened to the end
/// of day; the start date is expected to already be clamped by the
/// definition's historic-data policy.
pub(crate) fn query_context(website_id: &str, start_date: String, end_date: &str) -> QueryContext {
    QueryContext {
        website_id: website_id.to_string(),
        start_date,
        end_date: format!("{end_date} 23:59:59"),
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
