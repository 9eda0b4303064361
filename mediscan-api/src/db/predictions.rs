//! `model_predictions` queries
//!
//! Reads always join `xray_images` and filter on its `user_id`, so a caller
//! can only see predictions for their own uploads.

use mediscan_common::diagnosis::{DiagnosisLabel, Severity};
use mediscan_common::events::ImageStatus;
use mediscan_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid};
use crate::models::{ImageSummary, ModelPrediction, PredictionWithImage};

/// Default page size for prediction listings
pub const DEFAULT_LIST_LIMIT: i64 = 50;

const JOINED_SELECT: &str = r#"
    SELECT p.id, p.xray_image_id, p.model_version,
           p.no_finding_confidence, p.pneumonia_confidence, p.other_diseases_confidence,
           p.primary_diagnosis, p.primary_confidence, p.severity, p.heatmap_path,
           p.processing_time_ms, p.explanation_data, p.model_accuracy,
           p.created_at, p.updated_at,
           i.id AS img_id, i.user_id AS img_user_id, i.file_name AS img_file_name,
           i.file_size AS img_file_size, i.status AS img_status,
           i.uploaded_at AS img_uploaded_at
    FROM model_predictions p
    JOIN xray_images i ON i.id = p.xray_image_id
"#;

pub async fn insert_prediction<'e, E>(executor: E, prediction: &ModelPrediction) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let explanation = serde_json::to_string(&prediction.explanation_data)
        .map_err(|e| Error::Internal(format!("Failed to serialize explanation: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO model_predictions (
            id, xray_image_id, model_version,
            no_finding_confidence, pneumonia_confidence, other_diseases_confidence,
            primary_diagnosis, primary_confidence, severity, heatmap_path,
            processing_time_ms, explanation_data, model_accuracy, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(prediction.id.to_string())
    .bind(prediction.xray_image_id.to_string())
    .bind(&prediction.model_version)
    .bind(prediction.no_finding_confidence)
    .bind(prediction.pneumonia_confidence)
    .bind(prediction.other_diseases_confidence)
    .bind(prediction.primary_diagnosis.as_str())
    .bind(prediction.primary_confidence)
    .bind(prediction.severity.as_str())
    .bind(&prediction.heatmap_path)
    .bind(prediction.processing_time_ms)
    .bind(explanation)
    .bind(prediction.model_accuracy)
    .bind(format_timestamp(&prediction.created_at))
    .bind(format_timestamp(&prediction.updated_at))
    .execute(executor)
    .await?;

    Ok(())
}

/// Prediction for one of the caller's images
pub async fn get_for_image(
    pool: &SqlitePool,
    user_id: Uuid,
    image_id: Uuid,
) -> Result<Option<PredictionWithImage>> {
    let row = sqlx::query(&format!("{} WHERE p.xray_image_id = ? AND i.user_id = ?", JOINED_SELECT))
        .bind(image_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|r| joined_from_row(&r)).transpose()
}

/// Prediction by its own id, scoped to the caller
pub async fn get_by_id(
    pool: &SqlitePool,
    user_id: Uuid,
    prediction_id: Uuid,
) -> Result<Option<PredictionWithImage>> {
    let row = sqlx::query(&format!("{} WHERE p.id = ? AND i.user_id = ?", JOINED_SELECT))
        .bind(prediction_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|r| joined_from_row(&r)).transpose()
}

/// Caller's most recent predictions, newest first
pub async fn list_recent(
    pool: &SqlitePool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<PredictionWithImage>> {
    let rows = sqlx::query(&format!(
        "{} WHERE i.user_id = ? ORDER BY p.created_at DESC LIMIT ?",
        JOINED_SELECT
    ))
    .bind(user_id.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(joined_from_row).collect()
}

/// Count the caller's predictions per severity
pub async fn count_by_severity(pool: &SqlitePool, user_id: Uuid) -> Result<HashMap<Severity, i64>> {
    let rows = sqlx::query(
        r#"
        SELECT p.severity, COUNT(*) AS n
        FROM model_predictions p
        JOIN xray_images i ON i.id = p.xray_image_id
        WHERE i.user_id = ?
        GROUP BY p.severity
        "#,
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut counts = HashMap::new();
    for row in rows {
        let severity: String = row.get("severity");
        let severity = Severity::parse_str(&severity)
            .ok_or_else(|| Error::Internal(format!("Unknown severity: {}", severity)))?;
        counts.insert(severity, row.get::<i64, _>("n"));
    }
    Ok(counts)
}

fn joined_from_row(row: &SqliteRow) -> Result<PredictionWithImage> {
    let diagnosis: String = row.get("primary_diagnosis");
    let severity: String = row.get("severity");
    let explanation: String = row.get("explanation_data");
    let img_status: String = row.get("img_status");

    let prediction = ModelPrediction {
        id: parse_uuid("id", row.get("id"))?,
        xray_image_id: parse_uuid("xray_image_id", row.get("xray_image_id"))?,
        model_version: row.get("model_version"),
        no_finding_confidence: row.get("no_finding_confidence"),
        pneumonia_confidence: row.get("pneumonia_confidence"),
        other_diseases_confidence: row.get("other_diseases_confidence"),
        primary_diagnosis: DiagnosisLabel::parse_str(&diagnosis)
            .ok_or_else(|| Error::Internal(format!("Unknown diagnosis: {}", diagnosis)))?,
        primary_confidence: row.get("primary_confidence"),
        severity: Severity::parse_str(&severity)
            .ok_or_else(|| Error::Internal(format!("Unknown severity: {}", severity)))?,
        heatmap_path: row.get("heatmap_path"),
        processing_time_ms: row.get("processing_time_ms"),
        explanation_data: serde_json::from_str(&explanation)
            .map_err(|e| Error::Internal(format!("Bad explanation_data: {}", e)))?,
        model_accuracy: row.get("model_accuracy"),
        created_at: parse_timestamp("created_at", row.get("created_at"))?,
        updated_at: parse_timestamp("updated_at", row.get("updated_at"))?,
    };

    let image = ImageSummary {
        id: parse_uuid("img_id", row.get("img_id"))?,
        user_id: parse_uuid("img_user_id", row.get("img_user_id"))?,
        file_name: row.get("img_file_name"),
        file_size: row.get("img_file_size"),
        status: ImageStatus::parse_str(&img_status)
            .ok_or_else(|| Error::Internal(format!("Unknown image status: {}", img_status)))?,
        uploaded_at: parse_timestamp("img_uploaded_at", row.get("img_uploaded_at"))?,
    };

    Ok(PredictionWithImage {
        prediction,
        xray_images: image,
    })
}
