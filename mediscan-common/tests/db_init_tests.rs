//! Tests for database initialization and token authentication

use mediscan_common::api::auth::{authenticate, hash_token, issue_token, ApiAuthError};
use mediscan_common::db::init::{init_database, SCHEMA_VERSION};
use sqlx::Row;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp = tempfile::tempdir().unwrap();
    let db_path = temp.path().join("data").join("mediscan.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp = tempfile::tempdir().unwrap();
    let db_path = temp.path().join("mediscan.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_all_tables_created() {
    let temp = tempfile::tempdir().unwrap();
    let pool = init_database(&temp.path().join("mediscan.db")).await.unwrap();

    for table in [
        "schema_version",
        "users",
        "api_tokens",
        "xray_images",
        "model_predictions",
        "analysis_reports",
    ] {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1, "table {} missing", table);
    }

    let version: i64 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(version, SCHEMA_VERSION);
}

#[tokio::test]
async fn test_status_check_constraint() {
    let temp = tempfile::tempdir().unwrap();
    let pool = init_database(&temp.path().join("mediscan.db")).await.unwrap();
    let (user, _token) = issue_token(&pool, "checker@example.com").await.unwrap();

    let result = sqlx::query(
        r#"
        INSERT INTO xray_images
            (id, user_id, file_name, file_size, file_type, storage_path, status,
             uploaded_at, created_at, updated_at)
        VALUES ('x', ?, 'a.png', 1, 'image/png', 'p', 'exploded', 't', 't', 't')
        "#,
    )
    .bind(user.user_id.to_string())
    .execute(&pool)
    .await;

    assert!(result.is_err(), "unknown status should violate the CHECK constraint");
}

#[tokio::test]
async fn test_issue_and_authenticate_token() {
    let temp = tempfile::tempdir().unwrap();
    let pool = init_database(&temp.path().join("mediscan.db")).await.unwrap();

    let (user, token) = issue_token(&pool, "radiologist@example.com").await.unwrap();
    let resolved = authenticate(&pool, &token).await.unwrap();
    assert_eq!(resolved, user);

    // Only the digest is stored
    let row = sqlx::query("SELECT token_hash, last_used_at FROM api_tokens")
        .fetch_one(&pool)
        .await
        .unwrap();
    let stored: String = row.get("token_hash");
    assert_eq!(stored, hash_token(&token));
    assert_ne!(stored, token);
    let last_used: Option<String> = row.get("last_used_at");
    assert!(last_used.is_some());
}

#[tokio::test]
async fn test_second_token_reuses_user() {
    let temp = tempfile::tempdir().unwrap();
    let pool = init_database(&temp.path().join("mediscan.db")).await.unwrap();

    let (first, token_a) = issue_token(&pool, "same@example.com").await.unwrap();
    let (second, token_b) = issue_token(&pool, "same@example.com").await.unwrap();

    assert_eq!(first.user_id, second.user_id);
    assert_ne!(token_a, token_b);
    assert_eq!(authenticate(&pool, &token_a).await.unwrap().user_id, first.user_id);
    assert_eq!(authenticate(&pool, &token_b).await.unwrap().user_id, first.user_id);
}

#[tokio::test]
async fn test_unknown_token_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let pool = init_database(&temp.path().join("mediscan.db")).await.unwrap();

    let result = authenticate(&pool, "not-a-real-token").await;
    assert_eq!(result, Err(ApiAuthError::UnknownToken));
}

#[tokio::test]
async fn test_issue_token_rejects_bad_email() {
    let temp = tempfile::tempdir().unwrap();
    let pool = init_database(&temp.path().join("mediscan.db")).await.unwrap();

    assert!(issue_token(&pool, "").await.is_err());
    assert!(issue_token(&pool, "no-at-sign").await.is_err());
}
