// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 AgroLens Contributors

//! Configuration management for AgroLens

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Web server settings
    #[serde(default)]
    pub web: WebConfig,

    /// On-disk storage layout
    #[serde(default)]
    pub storage: StorageConfig,

    /// AI engine configuration
    #[serde(default)]
    pub ai_engine: EngineConfig,

    /// Upload validation settings
    #[serde(default)]
    pub uploads: UploadConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebConfig {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Root directory served at /static
    #[serde(default = "default_static_root")]
    pub static_root: PathBuf,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
    #[serde(default = "default_progress_dir")]
    pub progress_dir: PathBuf,
    /// JSONL log backing the progress history view
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_engine_url")]
    pub url: String,
    #[serde(default = "default_vision_model")]
    pub model: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Prompt sent alongside the uploaded image
    #[serde(default = "default_prompt")]
    pub prompt: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default = "default_max_body_mb")]
    pub max_body_mb: usize,
}

// Default value functions
fn default_web_host() -> String { "127.0.0.1".to_string() }
fn default_web_port() -> u16 { 8080 }
fn default_static_root() -> PathBuf { PathBuf::from("static") }
fn default_upload_dir() -> PathBuf { PathBuf::from("static/uploads") }
fn default_report_dir() -> PathBuf { PathBuf::from("static/reports") }
fn default_progress_dir() -> PathBuf { PathBuf::from("static/uploads_progress") }
fn default_history_path() -> PathBuf { PathBuf::from("progress_history.jsonl") }
fn default_engine_url() -> String { "http://localhost:11434".to_string() }
fn default_vision_model() -> String { "moondream".to_string() }
fn default_timeout() -> u64 { 120 }
fn default_max_body_mb() -> usize { 5 }

fn default_allowed_extensions() -> Vec<String> {
    vec!["png", "jpg", "jpeg"].into_iter().map(String::from).collect()
}

fn default_prompt() -> String {
    "Classify the flood damage visible in this field photo. Answer with a \
     single line of the form label|confidence, where label is one of \
     'flood damage' or 'no flood damage' and confidence is a number \
     between 0 and 1. Return ONLY that line.".to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            static_root: default_static_root(),
            upload_dir: default_upload_dir(),
            report_dir: default_report_dir(),
            progress_dir: default_progress_dir(),
            history_path: default_history_path(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: default_engine_url(),
            model: default_vision_model(),
            timeout_secs: default_timeout(),
            prompt: default_prompt(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
            max_body_mb: default_max_body_mb(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            web: WebConfig::default(),
            storage: StorageConfig::default(),
            ai_engine: EngineConfig::default(),
            uploads: UploadConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::AgroLensError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Upload body limit in bytes
    pub fn body_limit_bytes(&self) -> usize {
        self.uploads.max_body_mb * 1024 * 1024
    }
}
