// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Ultralytics YOLO support
//!
//! Preprocessing and output decoding are pure functions over `image` and
//! `ndarray` types; only `model` depends on ONNX Runtime.

pub mod metadata;
#[cfg(feature = "onnx")]
pub mod model;
pub mod postprocessing;
pub mod preprocessing;

pub use metadata::{YoloMetadata, YoloTask};
#[cfg(feature = "onnx")]
pub use model::{OnnxBackend, OnnxYoloModel};
pub use postprocessing::{decode_output, non_max_suppression, softmax, DetectionParams};
pub use preprocessing::{center_crop, letterbox, Letterbox, DEFAULT_INPUT_SIZE};
