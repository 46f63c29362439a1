//! REST handlers for funnel definitions and funnel analytics.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::error;
use uuid::Uuid;

use beacon_core::types::{FunnelReport, ReferrerReport};
use beacon_funnel::registry::{CreateFunnel, FunnelDefinition, UpdateFunnel};

use crate::rest::{
    error_response, query_context, resolve_range, AnalyticsQuery, ApiError, AppState,
    DeleteResponse, WebsiteQuery,
};

/// POST /v1/funnels
pub async fn create_funnel(
    State(state): State<AppState>,
    Json(request): Json<CreateFunnel>,
) -> Result<(StatusCode, Json<FunnelDefinition>), ApiError> {
    let funnel = state.funnels.create(request).map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(funnel)))
}

/// GET /v1/funnels
pub async fn list_funnels(
    State(state): State<AppState>,
    Query(query): Query<WebsiteQuery>,
) -> Json<Vec<FunnelDefinition>> {
    Json(state.funnels.list(&query.website_id))
}

/// GET /v1/funnels/:id
pub async fn get_funnel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<WebsiteQuery>,
) -> Result<Json<FunnelDefinition>, ApiError> {
    let funnel = state
        .funnels
        .get(&id, &query.website_id)
        .map_err(error_response)?;
    Ok(Json(funnel))
}

/// PUT /v1/funnels/:id
pub async fn update_funnel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateFunnel>,
) -> Result<Json<FunnelDefinition>, ApiError> {
    let funnel = state.funnels.update(&id, request).map_err(error_response)?;
    Ok(Json(funnel))
}

/// DELETE /v1/funnels/:id
pub async fn delete_funnel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.funnels.delete(&id).map_err(error_response)?;
    Ok(Json(DeleteResponse { success: true }))
}

/// GET /v1/funnels/:id/analytics
pub async fn funnel_analytics(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<FunnelReport>, ApiError> {
    let funnel = state
        .funnels
        .get(&id, &query.website_id)
        .map_err(error_response)?;

    let (start, end) = resolve_range(&query.start_date, &query.end_date, state.default_range_days);
    let ctx = query_context(
        &query.website_id,
        funnel.effective_start_date(&start),
        &end,
    );

    let report = state
        .engine
        .analyze(&funnel.analytics_steps(), &funnel.filters, &ctx)
        .await
        .map_err(|e| {
            error!(error = %e, funnel_id = %id, "Funnel analytics failed");
            metrics::counter!("api.analytics_errors").increment(1);
            error_response(e)
        })?;

    Ok(Json(report))
}

/// GET /v1/funnels/:id/analytics/referrers
pub async fn funnel_referrer_analytics(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<ReferrerReport>, ApiError> {
    let funnel = state
        .funnels
        .get(&id, &query.website_id)
        .map_err(error_response)?;

    let (start, end) = resolve_range(&query.start_date, &query.end_date, state.default_range_days);
    let ctx = query_context(
        &query.website_id,
        funnel.effective_start_date(&start),
        &end,
    );

    let report = state
        .engine
        .analyze_by_referrer(&funnel.analytics_steps(), &funnel.filters, &ctx)
        .await
        .map_err(|e| {
            error!(error = %e, funnel_id = %id, "Referrer analytics failed");
            metrics::counter!("api.analytics_errors").increment(1);
            error_response(e)
        })?;

    Ok(Json(report))
}
