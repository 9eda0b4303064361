//! Severity triage

use serde::{Deserialize, Serialize};
use std::fmt;

use super::scores::DiagnosisLabel;

/// Coarse triage tag attached to every diagnosis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence cut-offs for severity classification
///
/// A confidence strictly above `*_high` is High, strictly above `*_medium` is
/// Medium, anything else Low. No Finding is always Low.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityThresholds {
    pub pneumonia_high: f64,
    pub pneumonia_medium: f64,
    pub other_disease_high: f64,
    pub other_disease_medium: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            pneumonia_high: 70.0,
            pneumonia_medium: 40.0,
            other_disease_high: 60.0,
            other_disease_medium: 30.0,
        }
    }
}

impl SeverityThresholds {
    pub fn classify(&self, label: DiagnosisLabel, confidence: f64) -> Severity {
        let (high, medium) = match label {
            DiagnosisLabel::NoFinding => return Severity::Low,
            DiagnosisLabel::Pneumonia => (self.pneumonia_high, self.pneumonia_medium),
            DiagnosisLabel::OtherDisease => (self.other_disease_high, self.other_disease_medium),
        };

        if confidence > high {
            Severity::High
        } else if confidence > medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Reject threshold sets where medium is not below high
    pub fn validate(&self) -> crate::Result<()> {
        let pairs = [
            ("pneumonia", self.pneumonia_medium, self.pneumonia_high),
            ("other_disease", self.other_disease_medium, self.other_disease_high),
        ];
        for (name, medium, high) in pairs {
            if !(0.0..=100.0).contains(&medium) || !(0.0..=100.0).contains(&high) || medium >= high {
                return Err(crate::Error::Config(format!(
                    "severity thresholds for {} must satisfy 0 <= medium < high <= 100 (got {} / {})",
                    name, medium, high
                )));
            }
        }
        Ok(())
    }
}

/// Classify with the default threshold set
pub fn severity(label: DiagnosisLabel, confidence: f64) -> Severity {
    SeverityThresholds::default().classify(label, confidence)
}
