// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image classification on CPU
//!
//! This module provides:
//! - A model loader with a process-lifetime cache over a static catalog
//! - YOLO classification and detection through ONNX Runtime
//! - Optional background removal before inference
//! - The request pipeline used by the HTTP layer

pub mod adapter;
pub mod background;
pub mod backend;
pub mod error;
pub mod image_utils;
pub mod model_manager;
pub mod service;
pub mod weights;
pub mod yolo;

pub use adapter::{predict, Prediction, TOP_K};
#[cfg(feature = "onnx")]
pub use background::OnnxBackgroundRemover;
pub use background::BackgroundRemover;
pub use backend::{
    default_backends, DetectionBox, InferenceBackend, ModelOutput, VisionModel, WeightsInspector,
};
pub use error::{BackgroundRemovalError, InferenceError, ModelLoadError};
pub use image_utils::{decode_upload, detect_format, validate_upload, ImageError, MAX_IMAGE_SIZE};
pub use model_manager::{LoadedModel, ModelInfo, ModelLoader};
pub use service::{ClassificationOutcome, ClassificationService, ClassifyError, ClassifyRequest};
pub use weights::{detect_weights_format, WeightsFormat};
