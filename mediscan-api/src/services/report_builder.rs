//! Structured analysis reports

use chrono::{DateTime, Utc};
use mediscan_common::api::AuthenticatedUser;
use mediscan_common::diagnosis::{DiagnosisLabel, Severity};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::PredictionWithImage;

pub const DISCLAIMER: &str = "This analysis is for research and educational purposes only. \
    Always consult with qualified medical professionals for clinical diagnosis and treatment decisions.";

pub const PDF_FALLBACK_MESSAGE: &str = "PDF generation not implemented yet. Returning JSON format.";

/// Requested report format; PDF is answered with JSON
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Pdf,
}

/// Canned clinical recommendation for a diagnosis
pub fn recommendation(label: DiagnosisLabel, severity: Severity) -> &'static str {
    match (label, severity) {
        (DiagnosisLabel::NoFinding, _) => {
            "No significant abnormalities detected. Regular follow-up as recommended by healthcare provider."
        }
        (DiagnosisLabel::Pneumonia, Severity::High) => {
            "High confidence pneumonia detection. Immediate medical attention recommended."
        }
        (DiagnosisLabel::Pneumonia, Severity::Medium) => {
            "Moderate confidence pneumonia detection. Clinical correlation and medical evaluation advised."
        }
        (DiagnosisLabel::Pneumonia, Severity::Low) => {
            "Low confidence pneumonia detection. Additional imaging or clinical assessment may be needed."
        }
        (DiagnosisLabel::OtherDisease, _) => {
            "Other pathological findings detected. Further medical evaluation and specialist consultation recommended."
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDocument {
    pub report_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub patient_info: PatientInfo,
    pub image_info: ImageInfo,
    pub analysis: AnalysisSection,
    pub technical_details: Value,
    pub disclaimer: String,
    pub xai_explanation: XaiExplanation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInfo {
    pub user_id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    pub file_name: String,
    pub file_size: i64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSection {
    pub model_version: String,
    pub processing_time: String,
    pub accuracy: String,
    pub predictions: Vec<ConditionLine>,
    pub primary_diagnosis: PrimaryDiagnosis,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConditionLine {
    pub condition: DiagnosisLabel,
    pub confidence: String,
    /// "Primary" above 50%, otherwise "Secondary"
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrimaryDiagnosis {
    pub condition: DiagnosisLabel,
    pub confidence: String,
    pub severity: Severity,
    pub recommendation: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XaiExplanation {
    pub method: &'static str,
    pub heatmap_available: bool,
    pub description: &'static str,
}

fn percent(value: f64) -> String {
    format!("{}%", value)
}

/// Assemble the report for a prediction owned by `user`
pub fn build_report(
    report_id: Uuid,
    generated_at: DateTime<Utc>,
    joined: &PredictionWithImage,
    user: &AuthenticatedUser,
) -> ReportDocument {
    let prediction = &joined.prediction;
    let scores = prediction.scores();

    let predictions = DiagnosisLabel::ALL
        .iter()
        .map(|label| {
            let confidence = scores.get(*label);
            ConditionLine {
                condition: *label,
                confidence: percent(confidence),
                status: if confidence > 50.0 { "Primary" } else { "Secondary" },
            }
        })
        .collect();

    ReportDocument {
        report_id,
        generated_at,
        patient_info: PatientInfo {
            user_id: user.user_id,
            email: user.email.clone(),
        },
        image_info: ImageInfo {
            file_name: joined.xray_images.file_name.clone(),
            file_size: joined.xray_images.file_size,
            uploaded_at: joined.xray_images.uploaded_at,
        },
        analysis: AnalysisSection {
            model_version: prediction.model_version.clone(),
            processing_time: format!("{}ms", prediction.processing_time_ms),
            accuracy: percent(prediction.model_accuracy),
            predictions,
            primary_diagnosis: PrimaryDiagnosis {
                condition: prediction.primary_diagnosis,
                confidence: percent(prediction.primary_confidence),
                severity: prediction.severity,
                recommendation: recommendation(prediction.primary_diagnosis, prediction.severity),
            },
        },
        technical_details: json!({
            "architecture": "DenseNet121 with GlobalAveragePooling2D",
            "lossFunction": "Weighted Sigmoid Focal Loss (γ=2.0)",
            "inputSize": "224×224 pixels (3-channel)",
            "preprocessing": "DICOM VOI LUT + normalization + ImageNet preprocessing",
            "classWeights": "Balanced for class imbalance",
            "validationMetrics": {
                "accuracy": "94.0%",
                "auc": "0.92",
                "precision": "0.89",
                "recall": "0.91"
            }
        }),
        disclaimer: DISCLAIMER.to_string(),
        xai_explanation: XaiExplanation {
            method: "Grad-CAM + LIME",
            heatmap_available: prediction.heatmap_path.is_some(),
            description: "Explainable AI techniques highlight the image regions that most \
                influenced the model's prediction, providing transparency in the diagnostic process.",
        },
    }
}
