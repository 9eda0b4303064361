//! `xray_images` queries

use mediscan_common::events::ImageStatus;
use mediscan_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid};
use crate::models::{StatusTransition, XrayImage};

const IMAGE_COLUMNS: &str = "id, user_id, file_name, file_size, file_type, storage_path, status, \
                             uploaded_at, processed_at, created_at, updated_at";

pub async fn insert_image(pool: &SqlitePool, image: &XrayImage) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO xray_images (
            id, user_id, file_name, file_size, file_type, storage_path, status,
            uploaded_at, processed_at, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(image.id.to_string())
    .bind(image.user_id.to_string())
    .bind(&image.file_name)
    .bind(image.file_size)
    .bind(&image.file_type)
    .bind(&image.storage_path)
    .bind(image.status.as_str())
    .bind(format_timestamp(&image.uploaded_at))
    .bind(image.processed_at.as_ref().map(format_timestamp))
    .bind(format_timestamp(&image.created_at))
    .bind(format_timestamp(&image.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load an image owned by `user_id`
pub async fn get_image(pool: &SqlitePool, user_id: Uuid, image_id: Uuid) -> Result<Option<XrayImage>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM xray_images WHERE id = ? AND user_id = ?",
        IMAGE_COLUMNS
    ))
    .bind(image_id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(|r| image_from_row(&r)).transpose()
}

/// Caller's images, newest first
pub async fn list_images(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<XrayImage>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM xray_images WHERE user_id = ? ORDER BY uploaded_at DESC",
        IMAGE_COLUMNS
    ))
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(image_from_row).collect()
}

/// Persist a transition, conditional on the row still holding the old status
///
/// Returns false when the row was not in `old_status` (another task got
/// there first, or the image was removed). Nothing is written in that case.
/// Accepts the pool or an open transaction (`&mut *tx`).
pub async fn apply_transition<'e, E>(executor: E, transition: &StatusTransition) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = format_timestamp(&transition.transitioned_at);
    let processed_at = (transition.new_status == ImageStatus::Analyzing).then(|| now.clone());

    let result = sqlx::query(
        r#"
        UPDATE xray_images
        SET status = ?,
            processed_at = COALESCE(?, processed_at),
            updated_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(transition.new_status.as_str())
    .bind(processed_at)
    .bind(&now)
    .bind(transition.image_id.to_string())
    .bind(transition.old_status.as_str())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Count the caller's images per status
pub async fn count_by_status(pool: &SqlitePool, user_id: Uuid) -> Result<HashMap<ImageStatus, i64>> {
    let rows = sqlx::query(
        "SELECT status, COUNT(*) AS n FROM xray_images WHERE user_id = ? GROUP BY status",
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut counts = HashMap::new();
    for row in rows {
        let status: String = row.get("status");
        let status = ImageStatus::parse_str(&status)
            .ok_or_else(|| Error::Internal(format!("Unknown image status: {}", status)))?;
        counts.insert(status, row.get::<i64, _>("n"));
    }
    Ok(counts)
}

pub(crate) fn image_from_row(row: &SqliteRow) -> Result<XrayImage> {
    let status: String = row.get("status");
    let processed_at: Option<String> = row.get("processed_at");

    Ok(XrayImage {
        id: parse_uuid("id", row.get("id"))?,
        user_id: parse_uuid("user_id", row.get("user_id"))?,
        file_name: row.get("file_name"),
        file_size: row.get("file_size"),
        file_type: row.get("file_type"),
        storage_path: row.get("storage_path"),
        status: ImageStatus::parse_str(&status)
            .ok_or_else(|| Error::Internal(format!("Unknown image status: {}", status)))?,
        uploaded_at: parse_timestamp("uploaded_at", row.get("uploaded_at"))?,
        processed_at: processed_at
            .as_deref()
            .map(|s| parse_timestamp("processed_at", s))
            .transpose()?,
        created_at: parse_timestamp("created_at", row.get("created_at"))?,
        updated_at: parse_timestamp("updated_at", row.get("updated_at"))?,
    })
}
