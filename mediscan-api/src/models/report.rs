//! Persisted analysis report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Row in `analysis_reports`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub id: Uuid,
    pub xray_image_id: Uuid,
    pub prediction_id: Uuid,
    pub user_id: Uuid,
    pub report_data: Value,
    pub generated_at: DateTime<Utc>,
}
