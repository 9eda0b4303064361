//! Prediction queries

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::auth::AuthenticatedUser;
use crate::db;
use crate::db::predictions::DEFAULT_LIST_LIMIT;
use crate::error::{ApiError, ApiResult};
use crate::models::{ApiResponse, PredictionWithImage};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PredictionQuery {
    #[serde(rename = "xrayImageId")]
    pub xray_image_id: Option<Uuid>,
    /// Page size for listings, at most 50
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PredictionPayload {
    Single(PredictionWithImage),
    List(Vec<PredictionWithImage>),
}

/// GET /api/predictions[?xrayImageId=<uuid>]
///
/// With `xrayImageId`, the prediction for that image; otherwise the caller's
/// most recent predictions, newest first.
pub async fn get_predictions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    query: Result<Query<PredictionQuery>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<PredictionPayload>>> {
    let Query(query) = query.map_err(|e| ApiError::Validation(e.body_text()))?;

    if let Some(image_id) = query.xray_image_id {
        let prediction = db::predictions::get_for_image(&state.db, user.user_id, image_id)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("No prediction for X-ray image {}", image_id))
            })?;
        return Ok(Json(ApiResponse::ok(PredictionPayload::Single(prediction))));
    }

    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, DEFAULT_LIST_LIMIT);
    let predictions = db::predictions::list_recent(&state.db, user.user_id, limit).await?;
    Ok(Json(ApiResponse::ok(PredictionPayload::List(predictions))))
}

pub fn prediction_routes() -> Router<AppState> {
    Router::new().route("/api/predictions", get(get_predictions))
}
