// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 AgroLens Contributors

//! Flood-damage classifier backed by a local Ollama vision model

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::config::EngineConfig;
use crate::{AgroLensError, Result};

/// Label returned when the model produces no usable output
pub const NO_PREDICTION: &str = "No prediction";

/// A single classification outcome
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
}

impl Prediction {
    /// Sentinel for an empty or unparseable model response
    pub fn none() -> Self {
        Self {
            label: NO_PREDICTION.to_string(),
            confidence: 0.0,
        }
    }
}

/// Seam for the vision model so handlers and tests can swap implementations
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify a stored image, returning a label and a confidence in [0,1]
    async fn classify(&self, image: &Path) -> Result<Prediction>;

    /// Verify the backing engine is reachable
    async fn health_check(&self) -> Result<()>;
}

/// Ollama API client adapter
pub struct OllamaClassifier {
    client: Client,
    base_url: String,
    model: String,
    prompt: String,
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    images: Vec<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClassifier {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgroLensError::Config(format!("Failed to create HTTP client: {}", e)))?;

        // Normalize URL
        let base_url = config
            .url
            .trim_end_matches('/')
            .replace("/api/generate", "");

        Ok(Self {
            client,
            base_url,
            model: config.model.clone(),
            prompt: config.prompt.clone(),
        })
    }

    /// Downscale and re-encode the image for the vision model.
    ///
    /// Large uploads are resized to at most 1024px on the longest side and
    /// converted to JPEG for consistent encoding.
    fn prepare_image(path: &Path) -> Result<Vec<u8>> {
        let img = image::open(path)?;

        let img = if img.width() > 1024 || img.height() > 1024 {
            img.resize(1024, 1024, image::imageops::FilterType::Triangle)
        } else {
            img
        };

        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        img.write_to(&mut cursor, image::ImageFormat::Jpeg)?;

        Ok(buffer)
    }
}

#[async_trait]
impl Classifier for OllamaClassifier {
    async fn classify(&self, image: &Path) -> Result<Prediction> {
        // Fall back to the raw bytes if the image crate cannot decode
        let payload = match Self::prepare_image(image) {
            Ok(data) => data,
            Err(_) => std::fs::read(image)?,
        };
        let encoded = general_purpose::STANDARD.encode(&payload);

        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: self.prompt.clone(),
            stream: false,
            images: vec![encoded],
        };

        debug!("Sending vision request: model={}", self.model);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgroLensError::Prediction(format!("engine request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AgroLensError::Prediction(format!(
                "engine returned status {}",
                response.status()
            )));
        }

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AgroLensError::Prediction(format!("invalid engine response: {}", e)))?;

        Ok(parse_prediction(&result.response))
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);

        self.client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                AgroLensError::Prediction(format!(
                    "Cannot connect to engine at {}: {}",
                    self.base_url, e
                ))
            })?;

        Ok(())
    }
}

/// Parse a `label|confidence` model response.
///
/// Anything empty or malformed yields the "No prediction" sentinel with
/// confidence 0.0 rather than an error.
pub fn parse_prediction(raw: &str) -> Prediction {
    let line = raw.trim().lines().next().unwrap_or("").trim();
    if line.is_empty() {
        return Prediction::none();
    }

    let Some((label, confidence)) = line.rsplit_once('|') else {
        return Prediction::none();
    };

    let label = label.trim();
    let Ok(confidence) = confidence.trim().parse::<f64>() else {
        return Prediction::none();
    };

    if label.is_empty() || !confidence.is_finite() {
        return Prediction::none();
    }

    Prediction {
        label: label.to_string(),
        confidence: confidence.clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_response() {
        let p = parse_prediction("flood damage|0.87\n");
        assert_eq!(p.label, "flood damage");
        assert!((p.confidence - 0.87).abs() < 1e-9);
    }

    #[test]
    fn empty_response_is_no_prediction() {
        let p = parse_prediction("   \n  ");
        assert_eq!(p.label, NO_PREDICTION);
        assert_eq!(p.confidence, 0.0);
    }

    #[test]
    fn missing_separator_is_no_prediction() {
        let p = parse_prediction("severe flooding everywhere");
        assert_eq!(p.label, NO_PREDICTION);
        assert_eq!(p.confidence, 0.0);
    }

    #[test]
    fn unparseable_confidence_is_no_prediction() {
        let p = parse_prediction("flood damage|very high");
        assert_eq!(p.label, NO_PREDICTION);
        assert_eq!(p.confidence, 0.0);
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(parse_prediction("flood damage|1.7").confidence, 1.0);
        assert_eq!(parse_prediction("no flood damage|-0.2").confidence, 0.0);
    }
}
