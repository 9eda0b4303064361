//! mediscan-api library - X-ray upload and analysis service
//!
//! Accepts chest X-ray uploads, stores them, runs a (simulated or remote)
//! classifier in a background task per upload, and serves the resulting
//! predictions, reports, and live status events.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use mediscan_common::config::{TomlConfig, DEFAULT_MODEL_VERSION};
use mediscan_common::diagnosis::{SeverityThresholds, UploadPolicy};
use mediscan_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::{ModelBackend, ObjectStore};

/// Multipart framing allowance on top of the file size limit
const UPLOAD_BODY_OVERHEAD: usize = 1024 * 1024;

/// Analysis and intake settings resolved from configuration
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub upload: UploadPolicy,
    pub severity: SeverityThresholds,
    pub model_version: String,
    pub model_accuracy: f64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            upload: UploadPolicy::default(),
            severity: SeverityThresholds::default(),
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            model_accuracy: 94.0,
        }
    }
}

impl AnalysisSettings {
    pub fn from_config(config: &TomlConfig) -> Self {
        Self {
            upload: config.upload.clone(),
            severity: config.severity,
            model_version: config.analysis.model_version.clone(),
            model_accuracy: config.analysis.model_accuracy,
        }
    }
}

/// Application state shared across HTTP handlers and analysis tasks
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub event_bus: EventBus,
    pub store: ObjectStore,
    pub backend: Arc<ModelBackend>,
    pub settings: Arc<AnalysisSettings>,
    /// Service start time, for uptime reporting
    pub startup_time: DateTime<Utc>,
    /// Most recent background failure, reported by /health
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        store: ObjectStore,
        backend: ModelBackend,
        settings: AnalysisSettings,
    ) -> Self {
        Self {
            db,
            event_bus,
            store,
            backend: Arc::new(backend),
            settings: Arc::new(settings),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
///
/// `/health` is public; everything under `/api` requires a bearer token.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::get;

    let body_limit = usize::try_from(state.settings.upload.max_file_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(UPLOAD_BODY_OVERHEAD);

    let protected = Router::new()
        .merge(api::xray_routes(body_limit))
        .merge(api::prediction_routes())
        .merge(api::report_routes())
        .merge(api::stats_routes())
        .route("/api/events", get(api::scan_event_stream))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    Router::new()
        .merge(protected)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
