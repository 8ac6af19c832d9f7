// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Static model catalog: key -> weights path, display name and class names

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use super::ConfigError;

/// A single servable model
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Lookup key used by clients (`model` form field)
    pub key: String,
    /// Path to the weights file (ONNX)
    pub weights_path: PathBuf,
    /// Human readable name shown by `/api/models/`
    pub display_name: String,
    /// Class names indexed by class id. Empty means "use names embedded in the model"
    #[serde(default)]
    pub class_names: Vec<String>,
    /// Square input edge in pixels; falls back to model metadata, then 640
    #[serde(default)]
    pub input_size: Option<u32>,
}

impl ModelConfig {
    pub fn new(
        key: impl Into<String>,
        weights_path: impl Into<PathBuf>,
        display_name: impl Into<String>,
        class_names: Vec<String>,
    ) -> Self {
        Self {
            key: key.into(),
            weights_path: weights_path.into(),
            display_name: display_name.into(),
            class_names,
            input_size: None,
        }
    }

    pub fn with_input_size(mut self, input_size: u32) -> Self {
        self.input_size = Some(input_size);
        self
    }
}

/// The full set of configured models plus the default key
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ModelCatalog {
    /// Key used when a request does not name a model
    pub default: String,
    #[serde(default)]
    pub catalog: Vec<ModelConfig>,
}

impl ModelCatalog {
    pub fn new(default: impl Into<String>, catalog: Vec<ModelConfig>) -> Result<Self, ConfigError> {
        let catalog = Self {
            default: default.into(),
            catalog,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Keys must be unique, non-empty, and the default must be one of them
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }

        let mut seen = HashSet::new();
        for model in &self.catalog {
            if model.key.trim().is_empty() {
                return Err(ConfigError::Invalid("model key must not be empty".to_string()));
            }
            if !seen.insert(model.key.as_str()) {
                return Err(ConfigError::DuplicateModelKey(model.key.clone()));
            }
            if model.input_size == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "model '{}' has input_size 0",
                    model.key
                )));
            }
        }

        if !seen.contains(self.default.as_str()) {
            return Err(ConfigError::UnknownDefaultModel(self.default.clone()));
        }

        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&ModelConfig> {
        self.catalog.iter().find(|model| model.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> Vec<String> {
        self.catalog.iter().map(|model| model.key.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelConfig> {
        self.catalog.iter()
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            default: "trash-cls".to_string(),
            catalog: vec![ModelConfig::new(
                "trash-cls",
                "models/trash_cls.onnx",
                "Trash classifier (YOLO11n-cls)",
                vec![
                    "cardboard".to_string(),
                    "glass".to_string(),
                    "plastic".to_string(),
                ],
            )
            .with_input_size(224)],
        }
    }
}
