//! Bearer token middleware
//!
//! Resolves `Authorization: Bearer <token>` to an [`AuthenticatedUser`] and
//! stores it in the request extensions for handlers to extract.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use mediscan_common::api::auth::{authenticate, parse_bearer, ApiAuthError};
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

pub use mediscan_common::api::AuthenticatedUser;

/// Reject the request with 401 unless it carries a known token
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let token = parse_bearer(header)?.to_string();

    let user = authenticate(&state.db, &token).await.map_err(|e| {
        if e == ApiAuthError::UnknownToken {
            warn!(path = %request.uri().path(), "Rejected unknown bearer token");
        }
        e
    })?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
