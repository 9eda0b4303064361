//! Data models for mediscan-api

pub mod prediction;
pub mod report;
pub mod xray_image;

pub use prediction::{ImageSummary, ModelPrediction, PredictionWithImage};
pub use report::AnalysisReport;
pub use xray_image::{InvalidTransition, StatusTransition, XrayImage};

use serde::Serialize;

/// Response envelope shared by every `/api/*` route
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
