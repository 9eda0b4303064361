//! `analysis_reports` queries

use mediscan_common::{Error, Result};
use sqlx::SqlitePool;

use super::format_timestamp;
use crate::models::AnalysisReport;

pub async fn insert_report(pool: &SqlitePool, report: &AnalysisReport) -> Result<()> {
    let data = serde_json::to_string(&report.report_data)
        .map_err(|e| Error::Internal(format!("Failed to serialize report: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO analysis_reports (id, xray_image_id, prediction_id, user_id, report_data, generated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(report.id.to_string())
    .bind(report.xray_image_id.to_string())
    .bind(report.prediction_id.to_string())
    .bind(report.user_id.to_string())
    .bind(data)
    .bind(format_timestamp(&report.generated_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Number of reports generated for a prediction
pub async fn count_for_prediction(pool: &SqlitePool, prediction_id: uuid::Uuid) -> Result<i64> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analysis_reports WHERE prediction_id = ?")
        .bind(prediction_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(n)
}
