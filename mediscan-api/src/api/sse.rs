//! Server-Sent Events for scan progress
//!
//! GET /api/events streams the caller's [`ScanEvent`]s. With
//! `?xrayImageId=<uuid>` only events for that image are sent.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::sse::{Event, Sse},
    Extension,
};
use futures::stream::Stream;
use mediscan_common::events::ScanEvent;
use mediscan_common::sse::scan_event_sse_stream;
use serde::Deserialize;
use std::convert::Infallible;
use uuid::Uuid;

use crate::api::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct EventQuery {
    #[serde(rename = "xrayImageId")]
    pub xray_image_id: Option<Uuid>,
}

/// True when `event` belongs to `user_id` and, if given, to `image_id`
pub fn event_visible_to(event: &ScanEvent, user_id: Uuid, image_id: Option<Uuid>) -> bool {
    event.user_id() == user_id && image_id.map_or(true, |id| event.image_id() == id)
}

/// GET /api/events
pub async fn scan_event_stream(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    query: Result<Query<EventQuery>, QueryRejection>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let Query(query) = query.map_err(|e| ApiError::Validation(e.body_text()))?;

    let user_id = user.user_id;
    let image_id = query.xray_image_id;
    let rx = state.event_bus.subscribe();

    Ok(scan_event_sse_stream("mediscan-api", rx, move |event| {
        event_visible_to(event, user_id, image_id)
    }))
}
