//! Integration tests for the mediscan-api HTTP surface
//!
//! Each test gets its own temporary root folder, database, and object store,
//! and a simulated model backend with no latency.

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use mediscan_api::services::{run_analysis, ModelBackend, ObjectStore};
use mediscan_api::{build_router, db, models::XrayImage, AnalysisSettings, ApiError, AppState};
use mediscan_common::api::{issue_token, AuthenticatedUser};
use mediscan_common::db::init_database;
use mediscan_common::diagnosis::{ConfidenceSynthesizer, SynthesizerConfig};
use mediscan_common::events::{EventBus, ImageStatus, ScanEvent, ScanStatus};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::broadcast;
use tower::util::ServiceExt;
use uuid::Uuid;

const BOUNDARY: &str = "mediscan-test-boundary";

struct TestApp {
    _dir: TempDir,
    state: AppState,
    app: Router,
    user: AuthenticatedUser,
    token: String,
}

async fn create_test_app() -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let pool = init_database(&dir.path().join("mediscan.db"))
        .await
        .expect("Failed to init database");
    let (user, token) = issue_token(&pool, "radiologist@example.com")
        .await
        .expect("Failed to issue token");

    let backend = ModelBackend::simulated(
        ConfidenceSynthesizer::new(SynthesizerConfig::default()),
        Duration::ZERO,
    );
    let state = AppState::new(
        pool,
        EventBus::new(100),
        ObjectStore::new(dir.path().join("medical-images")),
        backend,
        AnalysisSettings::default(),
    );
    let app = build_router(state.clone());

    TestApp {
        _dir: dir,
        state,
        app,
        user,
        token,
    }
}

async fn test_request(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    app.clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap()
}

async fn extract_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn multipart_body(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

async fn upload(app: &Router, token: &str, field: &str, file_name: &str, data: &[u8]) -> axum::response::Response {
    let request = Request::builder()
        .method("POST")
        .uri("/api/xrays")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(field, file_name, "image/png", data)))
        .unwrap();

    app.clone().oneshot(request).await.unwrap()
}

/// Collect status changes for `image_id` until it reaches a terminal state
async fn wait_for_terminal(
    rx: &mut broadcast::Receiver<ScanEvent>,
    image_id: Uuid,
) -> Vec<ScanStatus> {
    let mut seen = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match rx.recv().await.unwrap() {
                ScanEvent::ImageStatusChanged {
                    image_id: id,
                    status,
                    ..
                } if id == image_id => {
                    let terminal = status.image_status().is_terminal();
                    seen.push(status);
                    if terminal {
                        break;
                    }
                }
                _ => {}
            }
        }
    })
    .await
    .expect("Timed out waiting for analysis");
    seen
}

/// Upload a PNG and wait for its analysis; returns (image_id, prediction_id)
async fn upload_and_complete(t: &TestApp, file_name: &str) -> (Uuid, Uuid) {
    let mut rx = t.state.event_bus.subscribe();
    let response = upload(&t.app, &t.token, "file", file_name, &[0x89, b'P', b'N', b'G']).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = extract_json(response).await;
    let image_id: Uuid = json["data"]["id"].as_str().unwrap().parse().unwrap();

    let statuses = wait_for_terminal(&mut rx, image_id).await;
    match statuses.last() {
        Some(ScanStatus::Completed { prediction_id, .. }) => (image_id, *prediction_id),
        other => panic!("Expected completion, got {:?}", other),
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let t = create_test_app().await;

    let response = test_request(&t.app, "GET", "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = extract_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "mediscan-api");
    assert!(json["uptime_seconds"].is_u64());
    assert!(json.get("last_error").is_none());
}

#[tokio::test]
async fn test_missing_token_rejected() {
    let t = create_test_app().await;

    let response = test_request(&t.app, "GET", "/api/xrays", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let json = extract_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_unknown_token_rejected() {
    let t = create_test_app().await;

    let response = test_request(&t.app, "GET", "/api/stats", Some("not-a-real-token"), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(extract_json(response).await["success"], false);
}

#[tokio::test]
async fn test_upload_rejects_unsupported_extension() {
    let t = create_test_app().await;

    let response = upload(&t.app, &t.token, "file", "notes.txt", b"hello").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = extract_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("notes.txt"));

    let list = extract_json(test_request(&t.app, "GET", "/api/xrays", Some(&t.token), None).await).await;
    assert_eq!(list["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let t = create_test_app().await;

    let response = upload(&t.app, &t.token, "attachment", "chest.png", b"data").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = extract_json(response).await;
    assert_eq!(json["error"], "No file provided");
}

#[tokio::test]
async fn test_upload_runs_analysis_to_completion() {
    let t = create_test_app().await;
    let mut rx = t.state.event_bus.subscribe();

    let data = vec![7u8; 2_000_000];
    let response = upload(&t.app, &t.token, "file", "Chest-PA.PNG", &data).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = extract_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["fileName"], "Chest-PA.PNG");
    assert_eq!(json["data"]["status"], "pending");
    let upload_path = json["data"]["uploadPath"].as_str().unwrap();
    assert!(upload_path.starts_with(&format!("xray-images/{}/", t.user.user_id)));
    assert!(upload_path.ends_with(".png"));
    let image_id: Uuid = json["data"]["id"].as_str().unwrap().parse().unwrap();

    let statuses = wait_for_terminal(&mut rx, image_id).await;
    let order: Vec<ImageStatus> = statuses.iter().map(ScanStatus::image_status).collect();
    assert_eq!(
        order,
        vec![ImageStatus::Pending, ImageStatus::Analyzing, ImageStatus::Completed]
    );

    let uri = format!("/api/xrays/{}", image_id);
    let image = extract_json(test_request(&t.app, "GET", &uri, Some(&t.token), None).await).await;
    assert_eq!(image["data"]["status"], "completed");
    assert_eq!(image["data"]["file_size"], 2_000_000);
    assert!(image["data"]["processed_at"].is_string());

    let uri = format!("/api/predictions?xrayImageId={}", image_id);
    let response = test_request(&t.app, "GET", &uri, Some(&t.token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let prediction = extract_json(response).await;
    let data = &prediction["data"];

    let scores = [
        data["no_finding_confidence"].as_f64().unwrap(),
        data["pneumonia_confidence"].as_f64().unwrap(),
        data["other_diseases_confidence"].as_f64().unwrap(),
    ];
    for s in scores {
        assert!((0.0..=100.0).contains(&s));
    }
    let max = scores.iter().cloned().fold(f64::MIN, f64::max);
    assert_eq!(data["primary_confidence"].as_f64().unwrap(), max);
    assert!(["low", "medium", "high"].contains(&data["severity"].as_str().unwrap()));
    assert_eq!(data["xray_images"]["id"], image_id.to_string());
    assert!(data["heatmap_path"].is_null());
}

#[tokio::test]
async fn test_other_users_cannot_see_uploads() {
    let t = create_test_app().await;
    let (image_id, prediction_id) = upload_and_complete(&t, "lung.jpg").await;

    let (_, other_token) = issue_token(&t.state.db, "someone-else@example.com")
        .await
        .unwrap();

    let uri = format!("/api/xrays/{}", image_id);
    let response = test_request(&t.app, "GET", &uri, Some(&other_token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let uri = format!("/api/predictions?xrayImageId={}", image_id);
    let response = test_request(&t.app, "GET", &uri, Some(&other_token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = json!({ "predictionId": prediction_id });
    let response = test_request(&t.app, "POST", "/api/reports", Some(&other_token), Some(body)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let list = extract_json(test_request(&t.app, "GET", "/api/predictions", Some(&other_token), None).await).await;
    assert_eq!(list["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_prediction_listing_and_bad_query() {
    let t = create_test_app().await;
    upload_and_complete(&t, "first.png").await;
    upload_and_complete(&t, "second.dcm").await;

    let list = extract_json(test_request(&t.app, "GET", "/api/predictions", Some(&t.token), None).await).await;
    let items = list["data"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["xray_images"]["file_name"], "second.dcm");

    let limited = extract_json(
        test_request(&t.app, "GET", "/api/predictions?limit=1", Some(&t.token), None).await,
    )
    .await;
    assert_eq!(limited["data"].as_array().unwrap().len(), 1);

    let response = test_request(
        &t.app,
        "GET",
        "/api/predictions?xrayImageId=not-a-uuid",
        Some(&t.token),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_report_generation_with_pdf_fallback() {
    let t = create_test_app().await;
    let (_, prediction_id) = upload_and_complete(&t, "report.png").await;

    let body = json!({ "predictionId": prediction_id, "format": "pdf" });
    let response = test_request(&t.app, "POST", "/api/reports", Some(&t.token), Some(body)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = extract_json(response).await;
    assert_eq!(json["success"], true);
    assert!(json["message"].as_str().unwrap().contains("PDF"));
    assert_eq!(json["data"]["format"], "json");

    let report = &json["data"]["report"];
    assert_eq!(report["reportId"], json["data"]["reportId"]);
    assert_eq!(report["patientInfo"]["email"], "radiologist@example.com");
    assert_eq!(report["imageInfo"]["fileName"], "report.png");
    assert_eq!(report["analysis"]["predictions"].as_array().unwrap().len(), 3);
    assert!(report["analysis"]["primaryDiagnosis"]["recommendation"].is_string());
    assert_eq!(report["xaiExplanation"]["heatmapAvailable"], false);
    assert!(report["disclaimer"].is_string());

    assert_eq!(
        db::reports::count_for_prediction(&t.state.db, prediction_id).await.unwrap(),
        1
    );

    let body = json!({ "predictionId": prediction_id });
    let json = extract_json(test_request(&t.app, "POST", "/api/reports", Some(&t.token), Some(body)).await).await;
    assert!(json.get("message").is_none());
    assert_eq!(
        db::reports::count_for_prediction(&t.state.db, prediction_id).await.unwrap(),
        2
    );
}

#[tokio::test]
async fn test_report_requires_prediction_id() {
    let t = create_test_app().await;

    let body = json!({ "format": "json" });
    let response = test_request(&t.app, "POST", "/api/reports", Some(&t.token), Some(body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json!({ "predictionId": Uuid::new_v4() });
    let response = test_request(&t.app, "POST", "/api/reports", Some(&t.token), Some(body)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stats_counts() {
    let t = create_test_app().await;

    let empty = extract_json(test_request(&t.app, "GET", "/api/stats", Some(&t.token), None).await).await;
    assert_eq!(empty["data"]["totalImages"], 0);
    assert_eq!(empty["data"]["byStatus"]["pending"], 0);
    assert_eq!(empty["data"]["bySeverity"]["high"], 0);

    upload_and_complete(&t, "a.png").await;
    upload_and_complete(&t, "b.jpeg").await;

    let stats = extract_json(test_request(&t.app, "GET", "/api/stats", Some(&t.token), None).await).await;
    let data = &stats["data"];
    assert_eq!(data["totalImages"], 2);
    assert_eq!(data["totalPredictions"], 2);
    assert_eq!(data["byStatus"]["completed"], 2);
    assert_eq!(data["byStatus"]["failed"], 0);
    let severity_total: i64 = ["low", "medium", "high"]
        .iter()
        .map(|k| data["bySeverity"][k].as_i64().unwrap())
        .sum();
    assert_eq!(severity_total, 2);
}

#[tokio::test]
async fn test_missing_blob_marks_image_failed() {
    let t = create_test_app().await;
    let mut rx = t.state.event_bus.subscribe();

    let image = XrayImage::new_pending(
        t.user.user_id,
        "ghost.png".to_string(),
        1024,
        "image/png".to_string(),
        ObjectStore::key_for(t.user.user_id, "png"),
    );
    db::images::insert_image(&t.state.db, &image).await.unwrap();

    let result = run_analysis(&t.state, image.clone()).await;
    assert!(matches!(result, Err(ApiError::Storage(_))));

    let stored = db::images::get_image(&t.state.db, t.user.user_id, image.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, ImageStatus::Failed);

    let statuses = wait_for_terminal(&mut rx, image.id).await;
    assert!(matches!(statuses.last(), Some(ScanStatus::Failed { .. })));

    assert!(db::predictions::get_for_image(&t.state.db, t.user.user_id, image.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_second_claim_is_noop() {
    let t = create_test_app().await;

    let key = ObjectStore::key_for(t.user.user_id, "png");
    t.state.store.put(&key, b"pixels").await.unwrap();
    let image = XrayImage::new_pending(
        t.user.user_id,
        "twice.png".to_string(),
        6,
        "image/png".to_string(),
        key,
    );
    db::images::insert_image(&t.state.db, &image).await.unwrap();

    let first = run_analysis(&t.state, image.clone()).await.unwrap();
    assert!(first.is_some());

    let second = run_analysis(&t.state, image.clone()).await.unwrap();
    assert!(second.is_none());

    let stored = db::images::get_image(&t.state.db, t.user.user_id, image.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, ImageStatus::Completed);
}

/// Abort any update that moves an image into one of `statuses`
async fn reject_status_updates(state: &AppState, statuses: &str) {
    sqlx::query(&format!(
        "CREATE TRIGGER reject_status BEFORE UPDATE ON xray_images \
         WHEN NEW.status IN ({}) BEGIN SELECT RAISE(ABORT, 'status write rejected'); END",
        statuses
    ))
    .execute(&state.db)
    .await
    .unwrap();
}

#[tokio::test]
async fn test_failed_completion_rolls_back_prediction() {
    let t = create_test_app().await;
    reject_status_updates(&t.state, "'completed'").await;
    let mut rx = t.state.event_bus.subscribe();

    let response = upload(&t.app, &t.token, "file", "chest.png", b"pixels").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = extract_json(response).await;
    let image_id: Uuid = json["data"]["id"].as_str().unwrap().parse().unwrap();

    let statuses = wait_for_terminal(&mut rx, image_id).await;
    let order: Vec<ImageStatus> = statuses.iter().map(ScanStatus::image_status).collect();
    assert_eq!(
        order,
        vec![ImageStatus::Pending, ImageStatus::Analyzing, ImageStatus::Failed]
    );

    let stored = db::images::get_image(&t.state.db, t.user.user_id, image_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, ImageStatus::Failed);

    assert!(db::predictions::get_for_image(&t.state.db, t.user.user_id, image_id)
        .await
        .unwrap()
        .is_none());
    let uri = format!("/api/predictions?xrayImageId={}", image_id);
    let response = test_request(&t.app, "GET", &uri, Some(&t.token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_event_only_after_failed_write() {
    let t = create_test_app().await;
    reject_status_updates(&t.state, "'completed', 'failed'").await;

    let key = ObjectStore::key_for(t.user.user_id, "png");
    t.state.store.put(&key, b"pixels").await.unwrap();
    let image = XrayImage::new_pending(
        t.user.user_id,
        "stuck.png".to_string(),
        6,
        "image/png".to_string(),
        key,
    );
    db::images::insert_image(&t.state.db, &image).await.unwrap();

    let mut rx = t.state.event_bus.subscribe();
    assert!(run_analysis(&t.state, image.clone()).await.is_err());

    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let ScanEvent::ImageStatusChanged { status, .. } = event {
            seen.push(status.image_status());
        }
    }
    assert_eq!(seen, vec![ImageStatus::Analyzing]);

    // Row and event stream agree
    let stored = db::images::get_image(&t.state.db, t.user.user_id, image.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, ImageStatus::Analyzing);
    assert!(db::predictions::get_for_image(&t.state.db, t.user.user_id, image.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_dot_only_name_keeps_matched_extension() {
    let t = create_test_app().await;

    let response = upload(&t.app, &t.token, "file", ".png", b"pixels").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = extract_json(response).await;
    let upload_path = json["data"]["uploadPath"].as_str().unwrap();
    assert!(upload_path.ends_with(".png"), "got {}", upload_path);

    let image_id = json["data"]["id"].as_str().unwrap();
    let uri = format!("/api/xrays/{}", image_id);
    let image = extract_json(test_request(&t.app, "GET", &uri, Some(&t.token), None).await).await;
    assert_eq!(image["data"]["file_type"], "image/png");
}
