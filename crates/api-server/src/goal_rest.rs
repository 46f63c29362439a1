//! REST handlers for goal definitions and goal analytics. Goal conversion
//! is measured against the site-wide distinct-visitor baseline, not the
//! funnel-entry count.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use beacon_core::error::BeaconResult;
use beacon_core::types::{FunnelReport, QueryContext};
use beacon_funnel::registry::{CreateGoal, GoalDefinition, UpdateGoal};

use crate::rest::{
    error_response, query_context, resolve_range, AnalyticsQuery, ApiError, AppState,
    DeleteResponse, WebsiteQuery,
};

/// POST /v1/goals
pub async fn create_goal(
    State(state): State<AppState>,
    Json(request): Json<CreateGoal>,
) -> Result<(StatusCode, Json<GoalDefinition>), ApiError> {
    let goal = state.goals.create(request).map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(goal)))
}

/// GET /v1/goals
pub async fn list_goals(
    State(state): State<AppState>,
    Query(query): Query<WebsiteQuery>,
) -> Json<Vec<GoalDefinition>> {
    Json(state.goals.list(&query.website_id))
}

/// GET /v1/goals/:id
pub async fn get_goal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<WebsiteQuery>,
) -> Result<Json<GoalDefinition>, ApiError> {
    let goal = state
        .goals
        .get(&id, &query.website_id)
        .map_err(error_response)?;
    Ok(Json(goal))
}

/// PUT /v1/goals/:id
pub async fn update_goal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateGoal>,
) -> Result<Json<GoalDefinition>, ApiError> {
    let goal = state.goals.update(&id, request).map_err(error_response)?;
    Ok(Json(goal))
}

/// DELETE /v1/goals/:id
pub async fn delete_goal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.goals.delete(&id).map_err(error_response)?;
    Ok(Json(DeleteResponse { success: true }))
}

async fn run_goal_analytics(
    state: &AppState,
    goal: &GoalDefinition,
    ctx: &QueryContext,
    baseline: u64,
) -> BeaconResult<FunnelReport> {
    state
        .engine
        .analyze_goal(&goal.analytics_step(), &goal.filters, ctx, baseline)
        .await
}

/// GET /v1/goals/:id/analytics
pub async fn goal_analytics(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<FunnelReport>, ApiError> {
    let goal = state
        .goals
        .get(&id, &query.website_id)
        .map_err(error_response)?;

    let (start, end) = resolve_range(&query.start_date, &query.end_date, state.default_range_days);
    let ctx = query_context(&query.website_id, goal.effective_start_date(&start), &end);

    let baseline = state
        .engine
        .total_website_users(&ctx)
        .await
        .map_err(error_response)?;

    let report = run_goal_analytics(&state, &goal, &ctx, baseline)
        .await
        .map_err(|e| {
            error!(error = %e, goal_id = %id, "Goal analytics failed");
            metrics::counter!("api.analytics_errors").increment(1);
            error_response(e)
        })?;

    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct BulkGoalRequest {
    pub website_id: String,
    pub goal_ids: Vec<Uuid>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BulkGoalOutcome {
    Report(Box<FunnelReport>),
    Failed { error: String },
}

/// POST /v1/goals/analytics/bulk
pub async fn bulk_goal_analytics(
    State(state): State<AppState>,
    Json(request): Json<BulkGoalRequest>,
) -> Result<Json<HashMap<Uuid, BulkGoalOutcome>>, ApiError> {
    let (start, end) = resolve_range(
        &request.start_date,
        &request.end_date,
        state.default_range_days,
    );

    // Shared baseline over the requested range; goals that exclude
    // historic data get their own narrower baseline below.
    let base_ctx = query_context(&request.website_id, start.clone(), &end);
    let base_total = state
        .engine
        .total_website_users(&base_ctx)
        .await
        .map_err(error_response)?;

    let mut results = HashMap::with_capacity(request.goal_ids.len());
    for goal_id in &request.goal_ids {
        let goal = match state.goals.get(goal_id, &request.website_id) {
            Ok(goal) => goal,
            Err(e) => {
                results.insert(*goal_id, BulkGoalOutcome::Failed {
                    error: e.to_string(),
                });
                continue;
            }
        };

        let ctx = query_context(&request.website_id, goal.effective_start_date(&start), &end);
        let outcome = async {
            let baseline = if goal.ignore_historic_data {
                state.engine.total_website_users(&ctx).await?
            } else {
                base_total
            };
            run_goal_analytics(&state, &goal, &ctx, baseline).await
        }
        .await;

        results.insert(
            *goal_id,
            match outcome {
                Ok(report) => BulkGoalOutcome::Report(Box::new(report)),
                Err(e) => BulkGoalOutcome::Failed {
                    error: e.to_string(),
                },
            },
        );
    }

    Ok(Json(results))
}
