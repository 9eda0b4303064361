//! Report generation

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::auth::AuthenticatedUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{AnalysisReport, ApiResponse};
use crate::services::report_builder::{build_report, ReportFormat, PDF_FALLBACK_MESSAGE};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub prediction_id: Uuid,
    #[serde(default)]
    pub format: ReportFormat,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub report_id: Uuid,
    /// Format actually returned; always JSON
    pub format: ReportFormat,
    pub report: serde_json::Value,
}

/// POST /api/reports
///
/// Builds the report, stores it in `analysis_reports`, and returns it.
pub async fn generate_report(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    body: Result<Json<ReportRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<ReportResponse>>> {
    let Json(request) = body.map_err(|e| ApiError::Validation(e.body_text()))?;

    let joined = db::predictions::get_by_id(&state.db, user.user_id, request.prediction_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("Prediction {} not found", request.prediction_id))
        })?;

    let report_id = Uuid::new_v4();
    let generated_at = Utc::now();
    let document = build_report(report_id, generated_at, &joined, &user);
    let report_data = serde_json::to_value(&document)
        .map_err(|e| ApiError::Internal(format!("Failed to serialize report: {}", e)))?;

    let record = AnalysisReport {
        id: report_id,
        xray_image_id: joined.prediction.xray_image_id,
        prediction_id: joined.prediction.id,
        user_id: user.user_id,
        report_data,
        generated_at,
    };
    db::reports::insert_report(&state.db, &record).await?;

    info!(
        report_id = %report_id,
        prediction_id = %record.prediction_id,
        user_id = %user.user_id,
        requested_format = ?request.format,
        "Report generated"
    );

    let response = ApiResponse::ok(ReportResponse {
        report_id,
        format: ReportFormat::Json,
        report: record.report_data,
    });

    let response = match request.format {
        ReportFormat::Pdf => response.with_message(PDF_FALLBACK_MESSAGE),
        ReportFormat::Json => response,
    };

    Ok(Json(response))
}

pub fn report_routes() -> Router<AppState> {
    Router::new().route("/api/reports", post(generate_report))
}
