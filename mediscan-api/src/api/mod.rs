//! HTTP API handlers for mediscan-api

pub mod auth;
pub mod health;
pub mod predictions;
pub mod reports;
pub mod sse;
pub mod stats;
pub mod xrays;

pub use auth::auth_middleware;
pub use health::health_routes;
pub use predictions::prediction_routes;
pub use reports::report_routes;
pub use sse::scan_event_stream;
pub use stats::stats_routes;
pub use xrays::xray_routes;
