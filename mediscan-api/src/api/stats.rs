//! Per-caller dashboard counts

use axum::{extract::State, routing::get, Extension, Json, Router};
use mediscan_common::diagnosis::Severity;
use mediscan_common::events::ImageStatus;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::api::auth::AuthenticatedUser;
use crate::db;
use crate::error::ApiResult;
use crate::models::ApiResponse;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_images: i64,
    pub total_predictions: i64,
    /// Every status appears, zero if unused
    pub by_status: BTreeMap<&'static str, i64>,
    pub by_severity: BTreeMap<&'static str, i64>,
}

/// GET /api/stats
pub async fn get_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<ApiResponse<StatsResponse>>> {
    let status_counts = db::images::count_by_status(&state.db, user.user_id).await?;
    let severity_counts = db::predictions::count_by_severity(&state.db, user.user_id).await?;

    let by_status: BTreeMap<_, _> = [
        ImageStatus::Pending,
        ImageStatus::Analyzing,
        ImageStatus::Completed,
        ImageStatus::Failed,
    ]
    .into_iter()
    .map(|s| (s.as_str(), status_counts.get(&s).copied().unwrap_or(0)))
    .collect();

    let by_severity: BTreeMap<_, _> = [Severity::Low, Severity::Medium, Severity::High]
        .into_iter()
        .map(|s| (s.as_str(), severity_counts.get(&s).copied().unwrap_or(0)))
        .collect();

    Ok(Json(ApiResponse::ok(StatsResponse {
        total_images: by_status.values().sum(),
        total_predictions: by_severity.values().sum(),
        by_status,
        by_severity,
    })))
}

pub fn stats_routes() -> Router<AppState> {
    Router::new().route("/api/stats", get(get_stats))
}
