//! Error types for mediscan-api
//!
//! Every error leaves the service as `{success: false, error, code}` with a
//! status code chosen by variant.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mediscan_common::api::ApiAuthError;
use serde_json::json;
use thiserror::Error;

use crate::services::model_backend::ModelError;
use crate::services::storage::StorageError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid bearer token (401)
    #[error("{0}")]
    Unauthenticated(String),

    /// Request rejected before any side effect (400)
    #[error("{0}")]
    Validation(String),

    /// Resource not found or not owned by the caller (404)
    #[error("{0}")]
    NotFound(String),

    /// Blob storage failure (500)
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Record store failure (500)
    #[error("Database error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Model backend failure (502)
    #[error("Model backend error: {0}")]
    UpstreamModel(#[from] ModelError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UpstreamModel(_) => StatusCode::BAD_GATEWAY,
            ApiError::Storage(_) | ApiError::Persistence(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "UNAUTHENTICATED",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Storage(_) => "STORAGE_ERROR",
            ApiError::Persistence(_) => "PERSISTENCE_ERROR",
            ApiError::UpstreamModel(_) => "UPSTREAM_MODEL_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<ApiAuthError> for ApiError {
    fn from(err: ApiAuthError) -> Self {
        match err {
            ApiAuthError::DatabaseError(msg) => ApiError::Internal(msg),
            other => ApiError::Unauthenticated(other.to_string()),
        }
    }
}

impl From<mediscan_common::Error> for ApiError {
    fn from(err: mediscan_common::Error) -> Self {
        match err {
            mediscan_common::Error::Database(e) => ApiError::Persistence(e),
            mediscan_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            mediscan_common::Error::InvalidInput(msg) => ApiError::Validation(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "Request failed");
        }

        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
            "code": self.error_code(),
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
