// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 AgroLens Contributors

//! Error types for AgroLens

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

/// Result type alias for AgroLens operations
pub type Result<T> = std::result::Result<T, AgroLensError>;

/// AgroLens error types
#[derive(Error, Debug)]
pub enum AgroLensError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}

impl IntoResponse for AgroLensError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AgroLensError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            // Model failures carry internal detail (engine URL, model name);
            // log the full error and return a fixed body to the client.
            AgroLensError::Prediction(detail) => {
                tracing::error!("Prediction failed: {}", detail);
                (StatusCode::BAD_GATEWAY, "prediction failed".to_string())
            }
            other => {
                tracing::error!("Request failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        let resp = AgroLensError::Validation("No file part".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn prediction_maps_to_502_without_detail() {
        let resp =
            AgroLensError::Prediction("connect refused at 127.0.0.1:11434".to_string())
                .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
