// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Shared fixtures for the HTTP tests: a stub backend, an app with a
//! throwaway staging directory, and a multipart body builder

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{body::Body, http::Request, Router};
use eco_classifier::config::{InferenceConfig, ModelCatalog, ModelConfig};
use eco_classifier::vision::{
    InferenceBackend, InferenceError, ModelLoadError, ModelOutput, VisionModel,
};
use eco_classifier::{create_router, AppState, ClassificationService, ModelLoader};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tempfile::TempDir;

pub const BOUNDARY: &str = "eco-classifier-test-boundary";

pub struct StubModel {
    pub output: ModelOutput,
}

impl VisionModel for StubModel {
    fn run(&self, _image: &DynamicImage) -> Result<ModelOutput, InferenceError> {
        Ok(self.output.clone())
    }
}

/// Backend returning the same output for every image
pub struct StubBackend {
    pub output: ModelOutput,
    pub loads: Arc<AtomicUsize>,
}

impl InferenceBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn load(
        &self,
        _model: &ModelConfig,
        _inference: &InferenceConfig,
    ) -> Result<Arc<dyn VisionModel>, ModelLoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(StubModel {
            output: self.output.clone(),
        }))
    }
}

pub struct TestApp {
    pub router: Router,
    pub loads: Arc<AtomicUsize>,
    pub staging: TempDir,
    _weights: TempDir,
}

impl TestApp {
    /// "trash-cls" has weights on disk; "missing" points at a path that does not exist
    pub fn new(output: ModelOutput) -> Self {
        let weights = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();

        let weights_path = weights.path().join("trash.onnx");
        std::fs::write(&weights_path, b"stub weights").unwrap();

        let catalog = ModelCatalog::new(
            "trash-cls",
            vec![
                ModelConfig::new(
                    "trash-cls",
                    &weights_path,
                    "Trash classifier",
                    vec!["glass".into(), "metal".into(), "paper".into(), "plastic".into()],
                ),
                ModelConfig::new(
                    "missing",
                    weights.path().join("missing.onnx"),
                    "Missing weights",
                    vec![],
                ),
            ],
        )
        .unwrap();

        let loads = Arc::new(AtomicUsize::new(0));
        let backend = StubBackend {
            output,
            loads: loads.clone(),
        };
        let loader = Arc::new(ModelLoader::with_backends(
            catalog,
            InferenceConfig::default(),
            vec![Arc::new(backend)],
        ));
        let service = ClassificationService::new(loader, staging.path());

        Self {
            router: create_router(AppState::new(service)),
            loads,
            staging,
            _weights: weights,
        }
    }

    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(self.staging.path()).unwrap().count()
    }
}

pub fn classification(probabilities: Vec<f32>) -> ModelOutput {
    ModelOutput::Classification { probabilities }
}

pub fn png_bytes() -> Vec<u8> {
    let image = RgbImage::from_pixel(8, 8, Rgb([40, 120, 200]));
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut bytes, ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

/// Build a multipart/form-data body; `image` becomes a file part
pub fn multipart_body(image: Option<&[u8]>, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();

    if let Some(bytes) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"upload.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }

    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn classify_request(path: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
