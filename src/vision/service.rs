// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Classification request pipeline
//!
//! Validates the upload, stages it in a scoped temporary file, optionally
//! cuts out the background, then loads the requested model and runs the
//! inference adapter. Blocking work runs on the tokio blocking pool.
//! Temporary files are owned by `NamedTempFile` values and are removed when
//! they go out of scope on every path.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::vision::adapter::{predict, Prediction};
use crate::vision::background::BackgroundRemover;
use crate::vision::error::{BackgroundRemovalError, InferenceError, ModelLoadError};
use crate::vision::image_utils::{
    decode_upload, encode_png, format_to_extension, to_base64, validate_upload, ImageError,
};
use crate::vision::model_manager::ModelLoader;

pub const MESSAGE_CLASSIFIED: &str = "Image classified successfully";
pub const MESSAGE_NOTHING_DETECTED: &str = "No objects detected in the image";

/// Failures of a classification request
#[derive(Error, Debug)]
pub enum ClassifyError {
    /// Bad upload or form field; the client can fix it
    #[error("{message}")]
    Validation { field: String, message: String },

    /// Requested key is not in the catalog; checked before the loader runs
    #[error("Unknown model '{key}'")]
    UnknownModel { key: String, available: Vec<String> },

    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("Failed to stage upload: {0}")]
    TempFile(#[source] std::io::Error),

    /// The blocking task panicked or was cancelled
    #[error("Classification task failed: {0}")]
    Task(String),
}

impl ClassifyError {
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ClassifyError::Validation { .. } | ClassifyError::UnknownModel { .. }
        )
    }
}

impl From<ImageError> for ClassifyError {
    fn from(err: ImageError) -> Self {
        let message = match &err {
            ImageError::TooLarge(_, _) => "Image size cannot exceed 10MB".to_string(),
            ImageError::EmptyData => "Uploaded image is empty".to_string(),
            ImageError::UnsupportedFormat => {
                "Upload a valid image (PNG, JPEG, WebP, GIF, BMP or TIFF)".to_string()
            }
            ImageError::DecodeFailed(detail) => {
                format!("Uploaded file is not a valid image: {}", detail)
            }
            other => other.to_string(),
        };
        ClassifyError::Validation {
            field: "image".to_string(),
            message,
        }
    }
}

/// One upload to classify
#[derive(Debug, Clone, Default)]
pub struct ClassifyRequest {
    pub image: Vec<u8>,
    /// Catalog key; the default model when `None`
    pub model: Option<String>,
    /// Overrides the configured background removal default
    pub remove_background: Option<bool>,
}

/// Successful classification
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClassificationOutcome {
    pub predictions: Vec<Prediction>,
    pub count: usize,
    /// Key of the model that produced the predictions
    pub model: String,
    /// Base64 PNG cutout, present when background removal succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreground_image: Option<String>,
}

impl ClassificationOutcome {
    pub fn message(&self) -> &'static str {
        if self.predictions.is_empty() {
            MESSAGE_NOTHING_DETECTED
        } else {
            MESSAGE_CLASSIFIED
        }
    }
}

/// Shared, cheaply cloneable request handler
#[derive(Clone)]
pub struct ClassificationService {
    loader: Arc<ModelLoader>,
    remover: Option<Arc<dyn BackgroundRemover>>,
    remove_background_by_default: bool,
    temp_dir: PathBuf,
}

impl std::fmt::Debug for ClassificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassificationService")
            .field("loader", &self.loader)
            .field("background_removal", &self.remover.is_some())
            .field("remove_background_by_default", &self.remove_background_by_default)
            .field("temp_dir", &self.temp_dir)
            .finish()
    }
}

impl ClassificationService {
    pub fn new(loader: Arc<ModelLoader>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            loader,
            remover: None,
            remove_background_by_default: false,
            temp_dir: temp_dir.into(),
        }
    }

    pub fn with_background_remover(
        mut self,
        remover: Arc<dyn BackgroundRemover>,
        enabled_by_default: bool,
    ) -> Self {
        self.remover = Some(remover);
        self.remove_background_by_default = enabled_by_default;
        self
    }

    pub fn loader(&self) -> &Arc<ModelLoader> {
        &self.loader
    }

    pub fn has_background_removal(&self) -> bool {
        self.remover.is_some()
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Classify one upload
    pub async fn classify(
        &self,
        request: ClassifyRequest,
    ) -> Result<ClassificationOutcome, ClassifyError> {
        // Cheap checks first: nothing touches disk or the loader until they pass
        let format = validate_upload(&request.image)?;

        if let Some(key) = request.model.as_deref() {
            if !self.loader.contains(key) {
                return Err(ClassifyError::UnknownModel {
                    key: key.to_string(),
                    available: self.loader.catalog().keys(),
                });
            }
        }

        let remove_background = request
            .remove_background
            .unwrap_or(self.remove_background_by_default);

        let service = self.clone();
        tokio::task::spawn_blocking(move || {
            service.classify_blocking(
                &request.image,
                format,
                request.model.as_deref(),
                remove_background,
            )
        })
        .await
        .map_err(|e| ClassifyError::Task(e.to_string()))?
    }

    fn classify_blocking(
        &self,
        image: &[u8],
        format: ImageFormat,
        model_key: Option<&str>,
        remove_background: bool,
    ) -> Result<ClassificationOutcome, ClassifyError> {
        let start = Instant::now();
        // A corrupt body is the client's fault; reject it before staging or loading
        let decoded = decode_upload(image, format)?;
        let upload = self.stage(image, format_to_extension(format))?;
        debug!("Upload staged at {}", upload.path().display());

        let mut foreground_file = None;
        let mut foreground_image = None;
        if remove_background {
            if let Some(remover) = &self.remover {
                match self.cut_out_foreground(remover.as_ref(), &decoded) {
                    Ok((file, encoded)) => {
                        foreground_file = Some(file);
                        foreground_image = Some(encoded);
                    }
                    Err(e) => warn!("Background removal failed, using original image: {}", e),
                }
            }
        }

        drop(decoded);

        let inference_path = foreground_file
            .as_ref()
            .map(|file| file.path())
            .unwrap_or_else(|| upload.path());

        let model = self.loader.get_model(model_key)?;
        let predictions = predict(&model, inference_path)?;

        if let Some(file) = foreground_file {
            release(file);
        }
        release(upload);

        info!(
            "Classified upload with '{}': {} predictions in {:?}",
            model.key(),
            predictions.len(),
            start.elapsed()
        );

        Ok(ClassificationOutcome {
            count: predictions.len(),
            predictions,
            model: model.key().to_string(),
            foreground_image,
        })
    }

    fn stage(&self, bytes: &[u8], extension: &str) -> Result<NamedTempFile, ClassifyError> {
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&format!(".{}", extension))
            .tempfile_in(&self.temp_dir)
            .map_err(ClassifyError::TempFile)?;
        file.write_all(bytes).map_err(ClassifyError::TempFile)?;
        file.flush().map_err(ClassifyError::TempFile)?;
        Ok(file)
    }

    /// Returns the staged PNG cutout and its base64 encoding
    fn cut_out_foreground(
        &self,
        remover: &dyn BackgroundRemover,
        image: &DynamicImage,
    ) -> Result<(NamedTempFile, String), BackgroundRemovalError> {
        let cutout = remover.remove_background(image)?;
        let png = encode_png(&cutout).map_err(|e| BackgroundRemovalError::Encode(e.to_string()))?;

        let file = self
            .stage(&png, "png")
            .map_err(|e| BackgroundRemovalError::Encode(e.to_string()))?;

        Ok((file, to_base64(&png)))
    }
}

/// Delete a temp file now, logging instead of failing the request
fn release(file: NamedTempFile) {
    let path = file.path().to_path_buf();
    if let Err(e) = file.close() {
        warn!("Failed to remove temp file {}: {}", path.display(), e);
    }
}
