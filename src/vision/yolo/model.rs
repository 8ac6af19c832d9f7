// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX Runtime backend for Ultralytics YOLO exports

use std::sync::{Arc, Mutex, PoisonError};

use image::{DynamicImage, GenericImageView};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use tracing::{debug, info};

use crate::config::{InferenceConfig, ModelConfig};
use crate::vision::backend::{InferenceBackend, ModelOutput, VisionModel};
use crate::vision::error::{InferenceError, ModelLoadError};
use crate::vision::weights::{detect_weights_format, WeightsFormat};

use super::metadata::{YoloMetadata, YoloTask};
use super::postprocessing::{decode_output, DetectionParams};
use super::preprocessing::{center_crop, letterbox, Letterbox, DEFAULT_INPUT_SIZE};

const BACKEND_NAME: &str = "onnx";

/// Loads `.onnx` weights into CPU ONNX Runtime sessions
#[derive(Debug, Default, Clone, Copy)]
pub struct OnnxBackend;

impl OnnxBackend {
    pub fn new() -> Self {
        Self
    }
}

impl InferenceBackend for OnnxBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn is_available(&self) -> bool {
        true
    }

    fn load(
        &self,
        model: &ModelConfig,
        inference: &InferenceConfig,
    ) -> Result<Arc<dyn VisionModel>, ModelLoadError> {
        let format = detect_weights_format(&model.weights_path)?;
        if format != WeightsFormat::Onnx {
            return Err(ModelLoadError::IncompatibleWeights {
                path: model.weights_path.display().to_string(),
                reason: format!("{} weights: {}", format.as_str(), format.conversion_hint()),
            });
        }

        Ok(Arc::new(OnnxYoloModel::load(model, inference)?))
    }
}

/// A YOLO classifier or detector backed by one ONNX session
pub struct OnnxYoloModel {
    /// `Session::run` needs `&mut`, so concurrent requests take turns
    session: Mutex<Session>,
    input_name: String,
    input_size: u32,
    task: Option<YoloTask>,
    embedded_names: Vec<String>,
    /// Known class count, used to validate detection heads
    num_classes: Option<usize>,
    params: DetectionParams,
}

impl std::fmt::Debug for OnnxYoloModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxYoloModel")
            .field("input_name", &self.input_name)
            .field("input_size", &self.input_size)
            .field("task", &self.task)
            .field("num_classes", &self.num_classes)
            .finish_non_exhaustive()
    }
}

impl OnnxYoloModel {
    pub fn load(model: &ModelConfig, inference: &InferenceConfig) -> Result<Self, ModelLoadError> {
        let backend_error = |context: &str, e: String| ModelLoadError::Backend {
            key: model.key.clone(),
            backend: BACKEND_NAME,
            message: format!("{}: {}", context, e),
        };

        info!(
            "Loading model '{}' from {}",
            model.key,
            model.weights_path.display()
        );

        // CPU only; GPU scheduling is out of scope
        let session = Session::builder()
            .map_err(|e| backend_error("Failed to create session builder", e.to_string()))?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .map_err(|e| backend_error("Failed to set CPU execution provider", e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| backend_error("Failed to set optimization level", e.to_string()))?
            .with_intra_threads(inference.intra_threads)
            .map_err(|e| backend_error("Failed to set intra threads", e.to_string()))?
            .commit_from_file(&model.weights_path)
            .map_err(|e| backend_error("Failed to load ONNX model", e.to_string()))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());

        let metadata = read_metadata(&session);
        debug!("Model '{}' metadata: {:?}", model.key, metadata);

        let input_size = model
            .input_size
            .or(metadata.imgsz)
            .unwrap_or(DEFAULT_INPUT_SIZE);

        let num_classes = if !model.class_names.is_empty() {
            Some(model.class_names.len())
        } else if !metadata.names.is_empty() {
            Some(metadata.names.len())
        } else {
            None
        };

        info!(
            "✅ Model '{}' loaded (task: {:?}, input: {}px, classes: {:?})",
            model.key, metadata.task, input_size, num_classes
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            input_size,
            task: metadata.task,
            embedded_names: metadata.names,
            num_classes,
            params: DetectionParams {
                confidence_threshold: inference.confidence_threshold,
                iou_threshold: inference.iou_threshold,
                max_detections: inference.max_detections,
            },
        })
    }
}

impl VisionModel for OnnxYoloModel {
    fn run(&self, image: &DynamicImage) -> Result<ModelOutput, InferenceError> {
        let (width, height) = image.dimensions();

        let (tensor, mapping) = match &self.task {
            Some(YoloTask::Classify) => (
                center_crop(image, self.input_size),
                Letterbox::identity(width, height),
            ),
            Some(YoloTask::Other(task)) => {
                return Err(InferenceError::UnsupportedModel(format!(
                    "'{}' models are not supported, only classify and detect",
                    task
                )))
            }
            // Detection, or an export without task metadata
            _ => letterbox(image, self.input_size),
        };

        let input = Value::from_array(tensor)
            .map_err(|e| InferenceError::Preprocess(e.to_string()))?;

        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let outputs = session
            .run(ort::inputs![&self.input_name => input])
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Runtime(format!("Failed to extract output: {}", e)))?;
        let shape: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        debug!("Output shape: {:?}", shape);

        decode_output(&shape, data, self.num_classes, &self.params, &mapping)
    }

    fn embedded_class_names(&self) -> &[String] {
        &self.embedded_names
    }
}

fn read_metadata(session: &Session) -> YoloMetadata {
    let Ok(metadata) = session.metadata() else {
        return YoloMetadata::default();
    };
    let custom = |key: &str| metadata.custom(key).ok().flatten();

    let task = custom("task");
    let names = custom("names");
    let imgsz = custom("imgsz");
    YoloMetadata::from_properties(task.as_deref(), names.as_deref(), imgsz.as_deref())
}
