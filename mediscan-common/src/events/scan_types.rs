//! Scan lifecycle types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::diagnosis::{DiagnosisLabel, Severity};

/// Stored status of an uploaded image
///
/// Transitions: Pending → Analyzing → Completed | Failed.
/// Completed and Failed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    Pending,
    Analyzing,
    Completed,
    Failed,
}

impl ImageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStatus::Pending => "pending",
            ImageStatus::Analyzing => "analyzing",
            ImageStatus::Completed => "completed",
            ImageStatus::Failed => "failed",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ImageStatus::Pending),
            "analyzing" => Some(ImageStatus::Analyzing),
            "completed" => Some(ImageStatus::Completed),
            "failed" => Some(ImageStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ImageStatus::Completed | ImageStatus::Failed)
    }

    pub fn can_transition_to(&self, next: ImageStatus) -> bool {
        matches!(
            (self, next),
            (ImageStatus::Pending, ImageStatus::Analyzing)
                | (ImageStatus::Analyzing, ImageStatus::Completed)
                | (ImageStatus::Analyzing, ImageStatus::Failed)
        )
    }
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status payload carried by [`super::ScanEvent::ImageStatusChanged`]
///
/// Each state carries only the fields meaningful for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum ScanStatus {
    Pending,
    Analyzing {
        started_at: DateTime<Utc>,
    },
    Completed {
        prediction_id: Uuid,
        primary_diagnosis: DiagnosisLabel,
        primary_confidence: f64,
        severity: Severity,
    },
    Failed {
        error: String,
    },
}

impl ScanStatus {
    pub fn image_status(&self) -> ImageStatus {
        match self {
            ScanStatus::Pending => ImageStatus::Pending,
            ScanStatus::Analyzing { .. } => ImageStatus::Analyzing,
            ScanStatus::Completed { .. } => ImageStatus::Completed,
            ScanStatus::Failed { .. } => ImageStatus::Failed,
        }
    }
}
