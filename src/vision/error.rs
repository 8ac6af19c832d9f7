// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for model loading, inference and background removal
//!
//! - `ModelLoadError`: resolving a model key, locating weights, building a session
//! - `InferenceError`: decoding the image, running the model, interpreting outputs
//! - `BackgroundRemovalError`: segmentation failures (never fatal to a request)

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while resolving or loading a model
#[derive(Error, Debug)]
pub enum ModelLoadError {
    /// Key is not part of the static model catalog
    #[error("Unknown model '{key}', available models: {available:?}")]
    UnknownModel { key: String, available: Vec<String> },

    /// Weights file does not exist on disk
    #[error("Model weights not found at {}", .0.display())]
    WeightsNotFound(PathBuf),

    /// No inference backend is compiled in or usable
    #[error("No inference backend available: {0}")]
    NoBackend(String),

    /// Weights exist but the backend cannot execute their format
    #[error("Cannot load {path}: {reason}")]
    IncompatibleWeights { path: String, reason: String },

    /// Backend accepted the format but failed to build a runnable model
    #[error("Failed to load model '{key}' with {backend}: {message}")]
    Backend {
        key: String,
        backend: &'static str,
        message: String,
    },

    #[error("I/O error while reading weights: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while running a loaded model on an image
#[derive(Error, Debug)]
pub enum InferenceError {
    /// Model output is neither a class distribution nor a box tensor
    #[error("Unsupported model output: {0}")]
    UnsupportedModel(String),

    #[error("Failed to decode image {path}: {message}")]
    ImageDecode { path: String, message: String },

    #[error("Inference failed: {0}")]
    Runtime(String),

    #[error("Failed to prepare input tensor: {0}")]
    Preprocess(String),
}

/// Errors raised by the background removal filter
#[derive(Error, Debug)]
pub enum BackgroundRemovalError {
    #[error("Background removal model not found at {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("Background removal model failed to load: {0}")]
    Load(String),

    #[error("Segmentation failed: {0}")]
    Segmentation(String),

    #[error("Failed to encode foreground image: {0}")]
    Encode(String),
}
