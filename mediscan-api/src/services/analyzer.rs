//! Analysis orchestration
//!
//! One background task per upload drives the image through
//! Pending → Analyzing → Completed | Failed, publishing a [`ScanEvent`] at
//! each step. The Pending → Analyzing claim is a conditional update, so a
//! second trigger for the same image does nothing.

use mediscan_common::diagnosis::Diagnosis;
use mediscan_common::events::{ImageStatus, ScanEvent, ScanStatus};
use sqlx::{Sqlite, Transaction};
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{ModelPrediction, StatusTransition, XrayImage};
use crate::AppState;

/// Run [`run_analysis`] in a background task
///
/// Failures are logged and recorded as the service's last error.
pub fn spawn_analysis(state: AppState, image: XrayImage) -> JoinHandle<()> {
    tokio::spawn(async move {
        let image_id = image.id;
        info!(image_id = %image_id, "Analysis task started");

        match run_analysis(&state, image).await {
            Ok(Some(prediction)) => {
                info!(
                    image_id = %image_id,
                    prediction_id = %prediction.id,
                    diagnosis = %prediction.primary_diagnosis,
                    severity = %prediction.severity,
                    "Analysis completed"
                );
            }
            Ok(None) => {
                info!(image_id = %image_id, "Analysis skipped, image already claimed");
            }
            Err(e) => {
                error!(image_id = %image_id, error = %e, "Analysis failed");
                *state.last_error.write().await =
                    Some(format!("Analysis of {} failed: {}", image_id, e));
            }
        }
    })
}

/// Claim and analyze a pending image
///
/// Returns `Ok(None)` without side effects when the image is no longer
/// Pending. On failure after the claim, the image is marked Failed (best
/// effort) and the original error is returned.
pub async fn run_analysis(state: &AppState, mut image: XrayImage) -> ApiResult<Option<ModelPrediction>> {
    let claim = match image.transition_to(ImageStatus::Analyzing) {
        Ok(t) => t,
        Err(e) => {
            info!(image_id = %image.id, "Not starting analysis: {}", e);
            return Ok(None);
        }
    };

    if !db::images::apply_transition(&state.db, &claim).await? {
        return Ok(None);
    }

    state.event_bus.emit_lossy(ScanEvent::status_changed(
        image.id,
        image.user_id,
        ScanStatus::Analyzing {
            started_at: claim.transitioned_at,
        },
    ));

    match classify(state, &mut image).await {
        Ok(prediction) => {
            state.event_bus.emit_lossy(ScanEvent::PredictionCreated {
                prediction_id: prediction.id,
                image_id: image.id,
                user_id: image.user_id,
                timestamp: prediction.created_at,
            });
            state.event_bus.emit_lossy(ScanEvent::status_changed(
                image.id,
                image.user_id,
                ScanStatus::Completed {
                    prediction_id: prediction.id,
                    primary_diagnosis: prediction.primary_diagnosis,
                    primary_confidence: prediction.primary_confidence,
                    severity: prediction.severity,
                },
            ));
            Ok(Some(prediction))
        }
        Err(e) => {
            mark_failed(state, &mut image, &e).await;
            Err(e)
        }
    }
}

/// Score the image, then store the prediction and the Completed status in
/// one transaction
///
/// `image` is only moved to Completed after the commit, so on any error it
/// still holds the status the row actually has (Analyzing).
async fn classify(state: &AppState, image: &mut XrayImage) -> ApiResult<ModelPrediction> {
    let started = Instant::now();

    let bytes = state.store.get(&image.storage_path).await?;
    let scores = state.backend.predict(&bytes, &image.file_name).await?;
    let diagnosis = Diagnosis::from_scores(&scores, &state.settings.severity);

    let prediction = ModelPrediction::new(
        image.id,
        scores,
        diagnosis,
        &state.settings.model_version,
        state.settings.model_accuracy,
        i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX),
    );

    let mut completed = image.clone();
    let done = completed
        .transition_to(ImageStatus::Completed)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let mut tx = state.db.begin().await?;
    if let Err(e) = record_completion(&mut tx, &prediction, &done).await {
        if let Err(rollback) = tx.rollback().await {
            warn!(image_id = %image.id, error = %rollback, "Rollback failed");
        }
        return Err(e);
    }
    tx.commit().await?;

    *image = completed;
    Ok(prediction)
}

async fn record_completion(
    tx: &mut Transaction<'_, Sqlite>,
    prediction: &ModelPrediction,
    done: &StatusTransition,
) -> ApiResult<()> {
    db::predictions::insert_prediction(&mut **tx, prediction).await?;
    if !db::images::apply_transition(&mut **tx, done).await? {
        return Err(ApiError::Internal(format!(
            "Image {} left the analyzing state during analysis",
            done.image_id
        )));
    }
    Ok(())
}

/// Record the failure on the image row
///
/// The Failed event is published only when the row was actually moved to
/// Failed; otherwise the problem is logged and the row is left as it is.
async fn mark_failed(state: &AppState, image: &mut XrayImage, cause: &ApiError) {
    let transition = match image.transition_to(ImageStatus::Failed) {
        Ok(t) => t,
        Err(e) => {
            warn!(image_id = %image.id, "Could not mark image failed: {}", e);
            return;
        }
    };

    match db::images::apply_transition(&state.db, &transition).await {
        Ok(true) => {
            state.event_bus.emit_lossy(ScanEvent::status_changed(
                image.id,
                image.user_id,
                ScanStatus::Failed {
                    error: cause.to_string(),
                },
            ));
        }
        Ok(false) => {
            warn!(
                image_id = %image.id,
                from = %transition.old_status,
                "Could not mark image failed: row no longer in expected status"
            );
        }
        Err(e) => {
            warn!(image_id = %image.id, error = %e, "Could not mark image failed");
        }
    }
}
