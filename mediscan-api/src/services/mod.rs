//! Services for mediscan-api

pub mod analyzer;
pub mod model_backend;
pub mod report_builder;
pub mod storage;

pub use analyzer::{run_analysis, spawn_analysis};
pub use model_backend::{ModelBackend, ModelError, RemoteModelClient};
pub use report_builder::{build_report, recommendation, ReportFormat};
pub use storage::{ObjectStore, StorageError};
