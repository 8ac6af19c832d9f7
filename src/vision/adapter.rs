// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Inference adapter: runs a loaded model on an image file and normalizes
//! classifier and detector outputs into one prediction list

use std::cmp::Ordering;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::vision::backend::ModelOutput;
use crate::vision::error::InferenceError;
use crate::vision::image_utils::open_image;
use crate::vision::model_manager::LoadedModel;
use crate::vision::yolo::postprocessing::to_probabilities;

/// Number of classes reported for classification models
pub const TOP_K: usize = 5;

/// A single class prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class_id: u32,
    pub class_name: String,
    /// Always within [0, 1]
    pub confidence: f32,
}

/// Run `model` on the image stored at `image_path`
pub fn predict(model: &LoadedModel, image_path: &Path) -> Result<Vec<Prediction>, InferenceError> {
    let image = open_image(image_path).map_err(|e| InferenceError::ImageDecode {
        path: image_path.display().to_string(),
        message: e.to_string(),
    })?;

    let output = model.model().run(&image)?;
    let predictions = to_predictions(model, output);
    debug!(
        "Model '{}' produced {} predictions",
        model.key(),
        predictions.len()
    );
    Ok(predictions)
}

/// Normalize a raw model output into predictions
///
/// Classification keeps the top [`TOP_K`] classes by probability;
/// detection yields one prediction per box in backend order.
pub fn to_predictions(model: &LoadedModel, output: ModelOutput) -> Vec<Prediction> {
    match output {
        ModelOutput::Classification { probabilities } => {
            let probabilities = to_probabilities(&probabilities);
            let mut ranked: Vec<(usize, f32)> = probabilities
                .into_iter()
                .map(clamp_confidence)
                .enumerate()
                .collect();
            ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
            ranked.truncate(TOP_K);

            ranked
                .into_iter()
                .map(|(id, confidence)| Prediction {
                    class_id: id as u32,
                    class_name: model.class_name(id as u32),
                    confidence,
                })
                .collect()
        }
        ModelOutput::Detection { boxes } => boxes
            .into_iter()
            .map(|b| Prediction {
                class_id: b.class_id,
                class_name: model.class_name(b.class_id),
                confidence: clamp_confidence(b.confidence),
            })
            .collect(),
    }
}

fn clamp_confidence(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
