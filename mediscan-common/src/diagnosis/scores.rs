//! Prediction scores and primary diagnosis selection

use serde::{Deserialize, Serialize};
use std::fmt;

use super::severity::{Severity, SeverityThresholds};

/// Conditions tracked by the classifier
///
/// Declaration order is the tie-break order for primary selection.
/// Serialized with the display names stored in the database
/// (`"No Finding"`, `"Pneumonia"`, `"Other Disease"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosisLabel {
    #[serde(rename = "No Finding", alias = "NoFinding")]
    NoFinding,
    #[serde(rename = "Pneumonia")]
    Pneumonia,
    #[serde(rename = "Other Disease", alias = "OtherDisease", alias = "Other Diseases")]
    OtherDisease,
}

impl DiagnosisLabel {
    /// All labels in evaluation order
    pub const ALL: [DiagnosisLabel; 3] = [
        DiagnosisLabel::NoFinding,
        DiagnosisLabel::Pneumonia,
        DiagnosisLabel::OtherDisease,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosisLabel::NoFinding => "No Finding",
            DiagnosisLabel::Pneumonia => "Pneumonia",
            DiagnosisLabel::OtherDisease => "Other Disease",
        }
    }

    /// Parse a stored label. Accepts the display names and the variant names.
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "No Finding" | "NoFinding" => Some(DiagnosisLabel::NoFinding),
            "Pneumonia" => Some(DiagnosisLabel::Pneumonia),
            "Other Disease" | "OtherDisease" | "Other Diseases" => {
                Some(DiagnosisLabel::OtherDisease)
            }
            _ => None,
        }
    }
}

impl fmt::Display for DiagnosisLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Round to one decimal place
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Three confidence percentages, one per tracked condition
///
/// Each value lies in [0, 100]. The triple is not required to sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionScores {
    pub no_finding: f64,
    pub pneumonia: f64,
    pub other_disease: f64,
}

impl PredictionScores {
    pub fn new(no_finding: f64, pneumonia: f64, other_disease: f64) -> Self {
        Self {
            no_finding,
            pneumonia,
            other_disease,
        }
    }

    pub fn get(&self, label: DiagnosisLabel) -> f64 {
        match label {
            DiagnosisLabel::NoFinding => self.no_finding,
            DiagnosisLabel::Pneumonia => self.pneumonia,
            DiagnosisLabel::OtherDisease => self.other_disease,
        }
    }

    pub fn sum(&self) -> f64 {
        self.no_finding + self.pneumonia + self.other_disease
    }

    /// True when every score is a finite value in [0, 100]
    pub fn is_within_bounds(&self) -> bool {
        DiagnosisLabel::ALL.iter().all(|label| {
            let v = self.get(*label);
            v.is_finite() && (0.0..=100.0).contains(&v)
        })
    }

    /// Scale all three scores by `cap / sum` when the sum exceeds 100
    ///
    /// Triples summing to 100 or less are returned unchanged.
    pub fn normalized(&self, cap: f64) -> Self {
        let total = self.sum();
        if total <= 100.0 {
            return *self;
        }
        let factor = cap / total;
        Self::new(
            self.no_finding * factor,
            self.pneumonia * factor,
            self.other_disease * factor,
        )
    }

    pub fn rounded(&self) -> Self {
        Self::new(
            round_to_tenth(self.no_finding),
            round_to_tenth(self.pneumonia),
            round_to_tenth(self.other_disease),
        )
    }

    /// Highest scoring label and its score
    ///
    /// Ties resolve to the first label in [`DiagnosisLabel::ALL`].
    pub fn primary(&self) -> (DiagnosisLabel, f64) {
        let mut best = DiagnosisLabel::NoFinding;
        let mut best_score = self.no_finding;
        for label in &DiagnosisLabel::ALL[1..] {
            let score = self.get(*label);
            if score > best_score {
                best = *label;
                best_score = score;
            }
        }
        (best, best_score)
    }
}

/// Primary diagnosis derived from a score triple
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub label: DiagnosisLabel,
    pub confidence: f64,
    pub severity: Severity,
}

impl Diagnosis {
    pub fn from_scores(scores: &PredictionScores, thresholds: &SeverityThresholds) -> Self {
        let (label, confidence) = scores.primary();
        Self {
            label,
            confidence,
            severity: thresholds.classify(label, confidence),
        }
    }
}
