// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Classification endpoint handler

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::multipart::Multipart;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::request::ClassifyForm;
use super::response::ClassifyResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;

/// POST /api/classify/ - Classify an uploaded image
///
/// # Request (multipart/form-data)
/// - `image`: image file, at most 10MB (required)
/// - `model`: catalog key, defaults to the configured default model
/// - `remove_background`: run background removal first (true/false)
///
/// # Response
/// - `message`, `predictions`, `count`, `model`
/// - `foreground_image`: base64 PNG cutout when background removal ran
///
/// # Errors
/// - 400 Bad Request: missing/oversized/invalid image, unknown model
/// - 500 Internal Server Error: model load or inference failure
pub async fn classify_handler(State(state): State<AppState>, multipart: Multipart) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let request = match ClassifyForm::from_multipart(multipart)
        .await
        .and_then(ClassifyForm::into_request)
    {
        Ok(request) => request,
        Err(e) => {
            warn!("[{}] Rejected classification request: {}", request_id, e);
            return e.into_response_with_id(request_id);
        }
    };

    debug!(
        "[{}] Classification request: {} bytes, model: {:?}, remove_background: {:?}",
        request_id,
        request.image.len(),
        request.model,
        request.remove_background
    );

    match state.service.classify(request).await {
        Ok(outcome) => {
            info!(
                "[{}] {} predictions from '{}'",
                request_id, outcome.count, outcome.model
            );
            Json(ClassifyResponse::from(outcome)).into_response()
        }
        Err(e) => {
            if e.is_client_error() {
                warn!("[{}] Classification rejected: {}", request_id, e);
            } else {
                error!("[{}] Classification failed: {}", request_id, e);
            }
            ApiError::from(e).into_response_with_id(request_id)
        }
    }
}
