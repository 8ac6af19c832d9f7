// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Classification response types

use serde::{Deserialize, Serialize};

use crate::vision::{ClassificationOutcome, Prediction};

/// Response from POST /api/classify/
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifyResponse {
    /// "Image classified successfully" or "No objects detected in the image"
    pub message: String,
    pub predictions: Vec<Prediction>,
    pub count: usize,
    /// Catalog key of the model used
    pub model: String,
    /// Base64 PNG with the background removed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreground_image: Option<String>,
}

impl From<ClassificationOutcome> for ClassifyResponse {
    fn from(outcome: ClassificationOutcome) -> Self {
        Self {
            message: outcome.message().to_string(),
            predictions: outcome.predictions,
            count: outcome.count,
            model: outcome.model,
            foreground_image: outcome.foreground_image,
        }
    }
}
