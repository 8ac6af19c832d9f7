// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model catalog response types

use serde::{Deserialize, Serialize};

use crate::vision::ModelInfo;

/// One configured model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelEntry {
    pub key: String,
    /// Display name
    pub name: String,
    /// Configured class names; empty when the model carries its own
    pub classes: Vec<String>,
    /// Whether the model is already in memory
    pub loaded: bool,
}

impl From<ModelInfo> for ModelEntry {
    fn from(info: ModelInfo) -> Self {
        Self {
            key: info.key,
            name: info.name,
            classes: info.classes,
            loaded: info.loaded,
        }
    }
}

/// Response from GET /api/models/
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelsResponse {
    pub models: Vec<ModelEntry>,
    /// Key used when a request names no model
    pub default: String,
}
