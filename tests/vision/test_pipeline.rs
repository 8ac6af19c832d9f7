// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Inference adapter and classification service against files on disk

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use eco_classifier::config::{InferenceConfig, ModelConfig};
use eco_classifier::vision::{predict, InferenceError, LoadedModel, ModelOutput};
use eco_classifier::{ClassificationService, ClassifyError, ClassifyRequest, ModelLoader};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use super::support::*;

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([10, 200, 30]));
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut bytes, format)
        .unwrap();
    bytes.into_inner()
}

fn recording_model(names: Vec<String>) -> (LoadedModel, Arc<RecordingModel>) {
    let model = Arc::new(RecordingModel {
        output: ModelOutput::Classification {
            probabilities: vec![0.1, 0.2, 0.3, 0.05, 0.05, 0.2, 0.1],
        },
        seen: Default::default(),
    });
    let config = ModelConfig::new("trash-cls", "unused.onnx", "Trash", names);
    (LoadedModel::new(config, "stub", model.clone()), model)
}

#[test]
fn test_predict_decodes_by_content_not_extension() {
    let dir = tempfile::tempdir().unwrap();
    // JPEG bytes behind a .png name
    let path = dir.path().join("upload.png");
    std::fs::write(&path, encode(12, 7, ImageFormat::Jpeg)).unwrap();

    let (loaded, model) = recording_model(vec![]);
    let predictions = predict(&loaded, &path).unwrap();

    assert_eq!(model.seen.lock().unwrap().as_slice(), &[(12, 7)]);
    assert_eq!(predictions.len(), 5);
    assert_eq!(predictions[0].class_id, 2);
    assert_eq!(predictions[0].class_name, "class_2");
    assert!(predictions
        .windows(2)
        .all(|w| w[0].confidence >= w[1].confidence));
}

#[test]
fn test_predict_uses_configured_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("upload.jpg");
    std::fs::write(&path, encode(4, 4, ImageFormat::Png)).unwrap();

    let names = ["a", "b", "glass", "d", "e", "f", "g"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let (loaded, _) = recording_model(names);
    let predictions = predict(&loaded, &path).unwrap();

    assert_eq!(predictions[0].class_name, "glass");
}

#[test]
fn test_predict_corrupt_file_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("upload.png");
    std::fs::write(&path, b"\x89PNG\r\n\x1a\ntruncated").unwrap();

    let (loaded, model) = recording_model(vec![]);
    assert!(matches!(
        predict(&loaded, &path),
        Err(InferenceError::ImageDecode { .. })
    ));
    assert!(model.seen.lock().unwrap().is_empty());
}

fn service_with_counter(
    weights: &tempfile::TempDir,
    staging: &tempfile::TempDir,
    loads: Arc<AtomicUsize>,
) -> ClassificationService {
    let loader = ModelLoader::with_backends(
        catalog(weights, &["trash-cls"]),
        InferenceConfig::default(),
        vec![Arc::new(SlowBackend {
            delay: Duration::from_millis(10),
            loads,
        })],
    );
    ClassificationService::new(Arc::new(loader), staging.path())
}

fn service(weights: &tempfile::TempDir, staging: &tempfile::TempDir) -> ClassificationService {
    service_with_counter(weights, staging, Arc::new(AtomicUsize::new(0)))
}

fn staged(staging: &tempfile::TempDir) -> usize {
    std::fs::read_dir(staging.path()).unwrap().count()
}

#[tokio::test]
async fn test_concurrent_requests_leave_no_temp_files() {
    let weights = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let service = service(&weights, &staging);

    let mut tasks = Vec::new();
    for i in 0..6 {
        let service = service.clone();
        tasks.push(tokio::spawn(async move {
            service
                .classify(ClassifyRequest {
                    image: encode(8 + i, 8, ImageFormat::Png),
                    ..Default::default()
                })
                .await
        }));
    }
    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome.model, "trash-cls");
        assert_eq!(outcome.count, 2);
    }

    assert_eq!(staged(&staging), 0);
}

#[tokio::test]
async fn test_load_failure_leaves_no_temp_files() {
    let weights = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let service = service(&weights, &staging);
    std::fs::remove_file(weights.path().join("trash-cls.onnx")).unwrap();

    let err = service
        .classify(ClassifyRequest {
            image: encode(8, 8, ImageFormat::Png),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ClassifyError::ModelLoad(_)));
    assert!(!err.is_client_error());
    assert_eq!(staged(&staging), 0);
}

#[tokio::test]
async fn test_corrupt_image_with_valid_magic_is_rejected_before_loading() {
    let weights = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let loads = Arc::new(AtomicUsize::new(0));
    let service = service_with_counter(&weights, &staging, loads.clone());

    let mut image = encode(8, 8, ImageFormat::Png);
    image.truncate(20);
    let err = service
        .classify(ClassifyRequest {
            image,
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ClassifyError::Validation { .. }));
    assert!(err.is_client_error());
    assert_eq!(loads.load(Ordering::SeqCst), 0);
    assert_eq!(staged(&staging), 0);
}
