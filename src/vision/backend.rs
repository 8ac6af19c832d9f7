// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Inference backend abstraction
//!
//! A backend turns a catalog entry into a runnable [`VisionModel`]. The
//! loader walks backends in priority order and uses the first one that is
//! available in this build.

use std::sync::Arc;

use image::DynamicImage;
use serde::Serialize;

use crate::config::{InferenceConfig, ModelConfig};
use crate::vision::error::{InferenceError, ModelLoadError};
use crate::vision::weights::{detect_weights_format, WeightsFormat};

/// One detected object, in original image pixels
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionBox {
    pub class_id: u32,
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl DetectionBox {
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }
}

/// Raw model result before it is turned into predictions
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    /// Score per class id; not necessarily normalized
    Classification { probabilities: Vec<f32> },
    /// Boxes after thresholding and NMS, confidence descending
    Detection { boxes: Vec<DetectionBox> },
}

/// A model ready to run on decoded images
pub trait VisionModel: Send + Sync {
    fn run(&self, image: &DynamicImage) -> Result<ModelOutput, InferenceError>;

    /// Class names shipped inside the weights, indexed by class id
    fn embedded_class_names(&self) -> &[String] {
        &[]
    }
}

/// Loads weights into a [`VisionModel`]
#[cfg_attr(test, mockall::automock)]
pub trait InferenceBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this backend can run in the current build
    fn is_available(&self) -> bool;

    fn load(
        &self,
        model: &ModelConfig,
        inference: &InferenceConfig,
    ) -> Result<Arc<dyn VisionModel>, ModelLoadError>;
}

/// Lowest priority backend: reads the weights header and explains why the
/// file cannot be served. It never produces a model.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightsInspector;

impl InferenceBackend for WeightsInspector {
    fn name(&self) -> &'static str {
        "weights-inspector"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn load(
        &self,
        model: &ModelConfig,
        _inference: &InferenceConfig,
    ) -> Result<Arc<dyn VisionModel>, ModelLoadError> {
        let format = detect_weights_format(&model.weights_path)?;
        let reason = match format {
            WeightsFormat::Onnx => {
                "ONNX weights need the onnx backend, which is not compiled into this build \
                 (rebuild with `--features onnx`)"
                    .to_string()
            }
            other => format!("{} weights: {}", other.as_str(), other.conversion_hint()),
        };

        Err(ModelLoadError::IncompatibleWeights {
            path: model.weights_path.display().to_string(),
            reason,
        })
    }
}

/// Backends compiled into this build, highest priority first
pub fn default_backends() -> Vec<Arc<dyn InferenceBackend>> {
    let mut backends: Vec<Arc<dyn InferenceBackend>> = Vec::new();

    #[cfg(feature = "onnx")]
    backends.push(Arc::new(crate::vision::yolo::OnnxBackend::new()));

    backends.push(Arc::new(WeightsInspector));
    backends
}
