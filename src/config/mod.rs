// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration loaded from `config.toml`
//!
//! Sections:
//! - `[server]` bind address, temp directory
//! - `[inference]` ONNX Runtime threads and YOLO post-processing thresholds
//! - `[background_removal]` optional segmentation model
//! - `[models]` the static model catalog and its default key

pub mod models;

pub use models::{ModelCatalog, ModelConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default location of the config file
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Model catalog is empty")]
    EmptyCatalog,

    #[error("Duplicate model key '{0}' in catalog")]
    DuplicateModelKey(String),

    #[error("Default model '{0}' is not in the catalog")]
    UnknownDefaultModel(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub background_removal: BackgroundRemovalConfig,
    #[serde(default)]
    pub models: ModelCatalog,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory for per-request upload files; system temp dir when unset
    pub temp_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            temp_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// ONNX Runtime intra-op threads per session
    pub intra_threads: usize,
    /// Minimum detection confidence kept after decoding
    pub confidence_threshold: f32,
    /// IoU above which overlapping boxes of one class are suppressed
    pub iou_threshold: f32,
    pub max_detections: usize,
    /// Load the default model at startup instead of on first request
    pub preload_default: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            intra_threads: 4,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
            preload_default: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundRemovalConfig {
    /// Run background removal when the request does not say otherwise
    pub enabled: bool,
    /// ISNet / U2Net style ONNX segmentation model
    pub model_path: Option<PathBuf>,
    pub input_size: u32,
}

impl Default for BackgroundRemovalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model_path: None,
            input_size: 1024,
        }
    }
}

impl AppConfig {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.models.validate()?;

        if !(0.0..=1.0).contains(&self.inference.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.inference.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.inference.iou_threshold) {
            return Err(ConfigError::Invalid(format!(
                "iou_threshold must be within [0, 1], got {}",
                self.inference.iou_threshold
            )));
        }
        if self.inference.intra_threads == 0 {
            return Err(ConfigError::Invalid("intra_threads must be at least 1".to_string()));
        }
        if self.background_removal.enabled && self.background_removal.model_path.is_none() {
            return Err(ConfigError::Invalid(
                "background_removal.enabled requires background_removal.model_path".to_string(),
            ));
        }

        Ok(())
    }
}
