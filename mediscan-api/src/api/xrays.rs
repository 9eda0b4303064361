//! X-ray upload and listing
//!
//! POST /api/xrays runs the upload gatekeeper, writes the blob, inserts a
//! Pending row, and spawns the analysis task. The response returns as soon
//! as the row exists; progress is observable via /api/events or by polling
//! GET /api/xrays/:id.

use axum::{
    extract::{rejection::PathRejection, DefaultBodyLimit, Multipart, Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use mediscan_common::diagnosis::{content_type_for_extension, UploadCandidate};
use mediscan_common::events::{ImageStatus, ScanEvent, ScanStatus};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::auth::AuthenticatedUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{ApiResponse, XrayImage};
use crate::services::{spawn_analysis, ObjectStore};
use crate::AppState;

/// Multipart field carrying the image
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: Uuid,
    pub file_name: String,
    pub upload_path: String,
    pub status: ImageStatus,
}

struct ReceivedFile {
    file_name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

async fn read_file_field(multipart: &mut Multipart) -> ApiResult<Option<ReceivedFile>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("Failed to read upload: {}", e)))?;

        return Ok(Some(ReceivedFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        }));
    }
    Ok(None)
}

/// POST /api/xrays
pub async fn upload_xray(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    mut multipart: Multipart,
) -> ApiResult<Json<ApiResponse<UploadResponse>>> {
    let file = read_file_field(&mut multipart)
        .await?
        .ok_or_else(|| ApiError::Validation("No file provided".to_string()))?;

    let candidate = UploadCandidate::new(file.file_name, file.bytes.len() as u64);
    let extension = state
        .settings
        .upload
        .check(&candidate)
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let file_type = file
        .content_type
        .filter(|t| !t.is_empty() && t != "application/octet-stream")
        .unwrap_or_else(|| content_type_for_extension(&extension).to_string());

    let storage_path = ObjectStore::key_for(user.user_id, &extension);
    state.store.put(&storage_path, &file.bytes).await?;

    let image = XrayImage::new_pending(
        user.user_id,
        candidate.file_name.clone(),
        file.bytes.len() as i64,
        file_type,
        storage_path.clone(),
    );

    if let Err(e) = db::images::insert_image(&state.db, &image).await {
        if let Err(cleanup) = state.store.remove(&storage_path).await {
            warn!(storage_path = %storage_path, error = %cleanup, "Failed to remove orphaned upload");
        }
        return Err(e.into());
    }

    info!(
        image_id = %image.id,
        user_id = %user.user_id,
        file_name = %image.file_name,
        file_size = image.file_size,
        "X-ray uploaded"
    );

    state.event_bus.emit_lossy(ScanEvent::status_changed(
        image.id,
        image.user_id,
        ScanStatus::Pending,
    ));

    let response = UploadResponse {
        id: image.id,
        file_name: image.file_name.clone(),
        upload_path: image.storage_path.clone(),
        status: image.status,
    };

    spawn_analysis(state.clone(), image);

    Ok(Json(ApiResponse::ok(response)))
}

/// GET /api/xrays
pub async fn list_xrays(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<ApiResponse<Vec<XrayImage>>>> {
    let images = db::images::list_images(&state.db, user.user_id).await?;
    Ok(Json(ApiResponse::ok(images)))
}

/// GET /api/xrays/:id
pub async fn get_xray(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<ApiResponse<XrayImage>>> {
    let Path(image_id) = path.map_err(|e| ApiError::Validation(e.body_text()))?;

    let image = db::images::get_image(&state.db, user.user_id, image_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("X-ray image {} not found", image_id)))?;

    Ok(Json(ApiResponse::ok(image)))
}

/// `body_limit` caps the upload request size
pub fn xray_routes(body_limit: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/api/xrays",
            post(upload_xray)
                .layer(DefaultBodyLimit::max(body_limit))
                .get(list_xrays),
        )
        .route("/api/xrays/:id", get(get_xray))
}
