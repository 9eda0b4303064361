//! Model backends producing prediction scores
//!
//! Two backends:
//! - **Simulated**: waits a fixed latency and draws scores from the
//!   [`ConfidenceSynthesizer`]
//! - **Remote**: posts the image to `{base_url}/predict` as multipart field
//!   `image` and reads back three confidences
//!
//! Either way only the three scores are returned; the primary label and
//! severity are derived locally by the caller.

use mediscan_common::config::AnalysisConfig;
use mediscan_common::diagnosis::{ConfidenceSynthesizer, PredictionScores};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("image is empty")]
    EmptyImage,

    #[error("model server request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model server rejected the image: {0}")]
    Rejected(String),

    #[error("model returned out-of-range scores: {0:?}")]
    InvalidScores(PredictionScores),
}

/// Response body of the remote `/predict` endpoint
#[derive(Debug, Deserialize)]
struct RemotePredictResponse {
    success: bool,
    #[serde(default)]
    predictions: Option<RemoteScores>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemoteScores {
    no_finding_confidence: f64,
    pneumonia_confidence: f64,
    #[serde(alias = "other_diseases_confidence")]
    other_disease_confidence: f64,
}

/// HTTP client for an external model server
#[derive(Debug, Clone)]
pub struct RemoteModelClient {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteModelClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn predict(&self, image: &[u8], file_name: &str) -> Result<PredictionScores, ModelError> {
        let part = reqwest::multipart::Part::bytes(image.to_vec()).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("image", part);

        let response = self
            .client
            .post(format!("{}/predict", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body: RemotePredictResponse = response.json().await?;

        if !status.is_success() || !body.success {
            return Err(ModelError::Rejected(
                body.error
                    .unwrap_or_else(|| format!("model server returned {}", status)),
            ));
        }

        let scores = body
            .predictions
            .ok_or_else(|| ModelError::Rejected("response carried no predictions".to_string()))?;

        Ok(PredictionScores::new(
            scores.no_finding_confidence,
            scores.pneumonia_confidence,
            scores.other_disease_confidence,
        ))
    }
}

pub enum ModelBackend {
    Simulated {
        synthesizer: ConfidenceSynthesizer,
        latency: Duration,
    },
    Remote(RemoteModelClient),
}

impl ModelBackend {
    pub fn simulated(synthesizer: ConfidenceSynthesizer, latency: Duration) -> Self {
        ModelBackend::Simulated {
            synthesizer,
            latency,
        }
    }

    /// Remote backend when `model_server_url` is set, simulated otherwise
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, ModelError> {
        match &config.model_server_url {
            Some(url) => Ok(ModelBackend::Remote(RemoteModelClient::new(
                url,
                Duration::from_secs(config.model_server_timeout_secs),
            )?)),
            None => Ok(Self::simulated(
                ConfidenceSynthesizer::new(config.synthesizer),
                Duration::from_millis(config.simulated_latency_ms),
            )),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ModelBackend::Simulated { latency, .. } => {
                format!("simulated ({} ms latency)", latency.as_millis())
            }
            ModelBackend::Remote(client) => format!("remote ({})", client.base_url()),
        }
    }

    /// Score an image. Scores are validated to lie in [0, 100].
    pub async fn predict(&self, image: &[u8], file_name: &str) -> Result<PredictionScores, ModelError> {
        if image.is_empty() {
            return Err(ModelError::EmptyImage);
        }

        let scores = match self {
            ModelBackend::Simulated {
                synthesizer,
                latency,
            } => {
                if !latency.is_zero() {
                    tokio::time::sleep(*latency).await;
                }
                synthesizer.synthesize(&mut rand::thread_rng())
            }
            ModelBackend::Remote(client) => client.predict(image, file_name).await?,
        };

        if !scores.is_within_bounds() {
            return Err(ModelError::InvalidScores(scores));
        }
        Ok(scores)
    }
}
