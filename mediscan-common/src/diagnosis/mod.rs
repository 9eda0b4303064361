//! Diagnosis logic shared by the MediScan services
//!
//! Everything in this module is pure: no I/O, no clocks. The only source of
//! nondeterminism is the random generator handed to [`ConfidenceSynthesizer`].
//!
//! Pipeline:
//! 1. [`ConfidenceSynthesizer`] (or a remote model) produces [`PredictionScores`]
//! 2. [`Diagnosis::from_scores`] picks the primary label
//! 3. [`SeverityThresholds::classify`] tags it Low / Medium / High

mod gatekeeper;
mod scores;
mod severity;
mod synthesizer;

pub use gatekeeper::{
    admits, content_type_for_extension, UploadCandidate, UploadPolicy, UploadRejection,
    ALLOWED_EXTENSIONS, MAX_UPLOAD_BYTES,
};
pub use scores::{round_to_tenth, Diagnosis, DiagnosisLabel, PredictionScores};
pub use severity::{severity, Severity, SeverityThresholds};
pub use synthesizer::{ConfidenceSynthesizer, ScoreRange, SynthesizerConfig};
