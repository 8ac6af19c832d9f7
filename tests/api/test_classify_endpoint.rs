// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /api/classify/ through the full router

use std::sync::atomic::Ordering;

use axum::http::StatusCode;
use eco_classifier::vision::{DetectionBox, ModelOutput, MAX_IMAGE_SIZE};
use tower::ServiceExt;

use super::support::*;

#[tokio::test]
async fn test_classify_returns_top_predictions() {
    let app = TestApp::new(classification(vec![0.1, 0.6, 0.05, 0.25]));

    let body = multipart_body(Some(&png_bytes()), &[]);
    let response = app
        .router
        .clone()
        .oneshot(classify_request("/api/classify/", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["message"], "Image classified successfully");
    assert_eq!(json["model"], "trash-cls");
    assert_eq!(json["count"], 4);

    let predictions = json["predictions"].as_array().unwrap();
    assert_eq!(predictions[0]["class_name"], "metal");
    assert_eq!(predictions[0]["class_id"], 1);
    assert_eq!(predictions[1]["class_name"], "plastic");
    assert!(json.get("foreground_image").is_none());

    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn test_classify_without_trailing_slash() {
    let app = TestApp::new(classification(vec![0.9, 0.1]));

    let body = multipart_body(Some(&png_bytes()), &[("model", "trash-cls")]);
    let response = app
        .router
        .clone()
        .oneshot(classify_request("/api/classify", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_model_is_loaded_once_across_requests() {
    let app = TestApp::new(classification(vec![0.5, 0.5]));

    for _ in 0..3 {
        let body = multipart_body(Some(&png_bytes()), &[]);
        let response = app
            .router
            .clone()
            .oneshot(classify_request("/api/classify/", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(app.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_image_is_400() {
    let app = TestApp::new(classification(vec![1.0]));

    let body = multipart_body(None, &[("model", "trash-cls")]);
    let response = app
        .router
        .clone()
        .oneshot(classify_request("/api/classify/", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = read_json(response).await;
    assert_eq!(json["error"], "No image provided");
    assert_eq!(json["error_type"], "validation_error");
    assert!(json["request_id"].is_string());
}

#[tokio::test]
async fn test_oversized_image_is_400() {
    let app = TestApp::new(classification(vec![1.0]));

    let mut image = png_bytes();
    image.resize(MAX_IMAGE_SIZE + 1, 0);
    let body = multipart_body(Some(&image), &[]);
    let response = app
        .router
        .clone()
        .oneshot(classify_request("/api/classify/", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = read_json(response).await;
    assert_eq!(json["error"], "Image size cannot exceed 10MB");
    assert_eq!(app.loads.load(Ordering::SeqCst), 0);
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn test_non_image_upload_is_400() {
    let app = TestApp::new(classification(vec![1.0]));

    let body = multipart_body(Some(b"definitely not an image"), &[]);
    let response = app
        .router
        .clone()
        .oneshot(classify_request("/api/classify/", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn test_truncated_image_is_400_without_loading() {
    let app = TestApp::new(classification(vec![1.0]));
    let image = png_bytes()[..20].to_vec();

    // The client's bad upload wins over the server's missing weights
    for model in ["trash-cls", "missing"] {
        let body = multipart_body(Some(&image), &[("model", model)]);
        let response = app
            .router
            .clone()
            .oneshot(classify_request("/api/classify/", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = read_json(response).await;
        assert_eq!(json["error_type"], "validation_error");
        assert_eq!(json["details"]["field"], "image");
        let error = json["error"].as_str().unwrap();
        assert!(error.starts_with("Uploaded file is not a valid image"));
        assert!(!error.contains("upload-"));
    }

    assert_eq!(app.loads.load(Ordering::SeqCst), 0);
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn test_unknown_model_is_400_listing_catalog() {
    let app = TestApp::new(classification(vec![1.0]));

    let body = multipart_body(Some(&png_bytes()), &[("model", "resnet50")]);
    let response = app
        .router
        .clone()
        .oneshot(classify_request("/api/classify/", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = read_json(response).await;
    assert_eq!(json["error_type"], "validation_error");
    assert_eq!(
        json["details"]["available_models"],
        serde_json::json!(["trash-cls", "missing"])
    );
    assert_eq!(app.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_weights_is_500_naming_path() {
    let app = TestApp::new(classification(vec![1.0]));

    let body = multipart_body(Some(&png_bytes()), &[("model", "missing")]);
    let response = app
        .router
        .clone()
        .oneshot(classify_request("/api/classify/", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = read_json(response).await;
    assert_eq!(json["error_type"], "model_load_error");
    assert!(json["error"].as_str().unwrap().contains("missing.onnx"));
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn test_invalid_remove_background_flag_is_400() {
    let app = TestApp::new(classification(vec![1.0]));

    let body = multipart_body(Some(&png_bytes()), &[("remove_background", "maybe")]);
    let response = app
        .router
        .clone()
        .oneshot(classify_request("/api/classify/", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = read_json(response).await;
    assert_eq!(json["details"]["field"], "remove_background");
}

#[tokio::test]
async fn test_remove_background_without_remover_still_classifies() {
    let app = TestApp::new(classification(vec![0.2, 0.8]));

    let body = multipart_body(Some(&png_bytes()), &[("remove_background", "true")]);
    let response = app
        .router
        .clone()
        .oneshot(classify_request("/api/classify/", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["predictions"][0]["class_name"], "metal");
    assert!(json.get("foreground_image").is_none());
}

#[tokio::test]
async fn test_empty_detection_reports_nothing_detected() {
    let app = TestApp::new(ModelOutput::Detection { boxes: vec![] });

    let body = multipart_body(Some(&png_bytes()), &[]);
    let response = app
        .router
        .clone()
        .oneshot(classify_request("/api/classify/", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["message"], "No objects detected in the image");
    assert_eq!(json["count"], 0);
    assert_eq!(json["predictions"], serde_json::json!([]));
}

#[tokio::test]
async fn test_detection_returns_one_prediction_per_box() {
    let boxes = vec![
        DetectionBox {
            class_id: 3,
            confidence: 0.9,
            x1: 0.0,
            y1: 0.0,
            x2: 4.0,
            y2: 4.0,
        },
        DetectionBox {
            class_id: 0,
            confidence: 0.4,
            x1: 4.0,
            y1: 4.0,
            x2: 8.0,
            y2: 8.0,
        },
    ];
    let app = TestApp::new(ModelOutput::Detection { boxes });

    let body = multipart_body(Some(&png_bytes()), &[]);
    let response = app
        .router
        .clone()
        .oneshot(classify_request("/api/classify/", body))
        .await
        .unwrap();

    let json = read_json(response).await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["predictions"][0]["class_name"], "plastic");
    assert_eq!(json["predictions"][1]["class_name"], "glass");
}
