//! Simulated classifier output
//!
//! Stands in for real inference: draws one uniform value per condition from a
//! configured range, optionally rescales the triple, and rounds to one decimal.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::scores::PredictionScores;

/// Inclusive range a simulated score is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
}

impl ScoreRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        rng.gen_range(self.min..=self.max)
    }
}

/// Synthesizer settings (`[analysis.synthesizer]` in the TOML file)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesizerConfig {
    pub no_finding: ScoreRange,
    pub pneumonia: ScoreRange,
    pub other_disease: ScoreRange,
    /// Rescale triples whose sum exceeds 100
    pub normalize: bool,
    /// Target sum after rescaling
    pub normalization_cap: f64,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            no_finding: ScoreRange::new(40.0, 90.0),
            pneumonia: ScoreRange::new(5.0, 35.0),
            other_disease: ScoreRange::new(2.0, 22.0),
            normalize: true,
            normalization_cap: 95.0,
        }
    }
}

impl SynthesizerConfig {
    pub fn validate(&self) -> crate::Result<()> {
        let ranges = [
            ("no_finding", self.no_finding),
            ("pneumonia", self.pneumonia),
            ("other_disease", self.other_disease),
        ];
        for (name, range) in ranges {
            if !(range.min.is_finite() && range.max.is_finite())
                || range.min < 0.0
                || range.max > 100.0
                || range.min > range.max
            {
                return Err(crate::Error::Config(format!(
                    "score range for {} must satisfy 0 <= min <= max <= 100 (got {}..{})",
                    name, range.min, range.max
                )));
            }
        }
        if !(self.normalization_cap > 0.0 && self.normalization_cap <= 100.0) {
            return Err(crate::Error::Config(format!(
                "normalization_cap must be in (0, 100] (got {})",
                self.normalization_cap
            )));
        }
        Ok(())
    }
}

/// Produces simulated prediction scores
#[derive(Debug, Clone)]
pub struct ConfidenceSynthesizer {
    config: SynthesizerConfig,
}

impl Default for ConfidenceSynthesizer {
    fn default() -> Self {
        Self::new(SynthesizerConfig::default())
    }
}

impl ConfidenceSynthesizer {
    pub fn new(config: SynthesizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SynthesizerConfig {
        &self.config
    }

    /// Independent uniform draws, before normalization and rounding
    pub fn draw_raw<R: Rng + ?Sized>(&self, rng: &mut R) -> PredictionScores {
        PredictionScores::new(
            self.config.no_finding.sample(rng),
            self.config.pneumonia.sample(rng),
            self.config.other_disease.sample(rng),
        )
    }

    /// Apply normalization (when enabled) and round to one decimal
    pub fn finalize(&self, raw: PredictionScores) -> PredictionScores {
        let scores = if self.config.normalize {
            raw.normalized(self.config.normalization_cap)
        } else {
            raw
        };
        scores.rounded()
    }

    pub fn synthesize<R: Rng + ?Sized>(&self, rng: &mut R) -> PredictionScores {
        let raw = self.draw_raw(rng);
        self.finalize(raw)
    }
}
