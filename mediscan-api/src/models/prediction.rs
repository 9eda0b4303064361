//! Model prediction record

use chrono::{DateTime, Utc};
use mediscan_common::diagnosis::{Diagnosis, DiagnosisLabel, PredictionScores, Severity};
use mediscan_common::events::ImageStatus;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Row in `model_predictions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPrediction {
    pub id: Uuid,
    pub xray_image_id: Uuid,
    pub model_version: String,
    pub no_finding_confidence: f64,
    pub pneumonia_confidence: f64,
    pub other_diseases_confidence: f64,
    pub primary_diagnosis: DiagnosisLabel,
    pub primary_confidence: f64,
    pub severity: Severity,
    /// Always null; heatmaps are not generated
    pub heatmap_path: Option<String>,
    pub processing_time_ms: i64,
    pub explanation_data: Value,
    pub model_accuracy: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModelPrediction {
    pub fn new(
        xray_image_id: Uuid,
        scores: PredictionScores,
        diagnosis: Diagnosis,
        model_version: &str,
        model_accuracy: f64,
        processing_time_ms: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            xray_image_id,
            model_version: model_version.to_string(),
            no_finding_confidence: scores.no_finding,
            pneumonia_confidence: scores.pneumonia,
            other_diseases_confidence: scores.other_disease,
            primary_diagnosis: diagnosis.label,
            primary_confidence: diagnosis.confidence,
            severity: diagnosis.severity,
            heatmap_path: None,
            processing_time_ms,
            explanation_data: explanation_data(),
            model_accuracy,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn scores(&self) -> PredictionScores {
        PredictionScores::new(
            self.no_finding_confidence,
            self.pneumonia_confidence,
            self.other_diseases_confidence,
        )
    }
}

/// Static description of the model attached to every prediction
pub fn explanation_data() -> Value {
    json!({
        "model_architecture": "DenseNet121 with GlobalAveragePooling2D",
        "loss_function": "Weighted Sigmoid Focal Loss (γ=2.0)",
        "input_size": "224×224 pixels (3-channel)",
        "classes": ["No Finding", "Pneumonia", "Other Diseases"],
        "confidence_threshold": 0.5,
        "preprocessing": "DICOM VOI LUT + normalization + ImageNet preprocessing"
    })
}

/// Subset of the image row returned alongside a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub file_size: i64,
    pub status: ImageStatus,
    pub uploaded_at: DateTime<Utc>,
}

/// Prediction joined with its image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionWithImage {
    #[serde(flatten)]
    pub prediction: ModelPrediction,
    pub xray_images: ImageSummary,
}
