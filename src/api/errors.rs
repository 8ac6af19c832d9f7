// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::vision::{ClassifyError, ModelLoadError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub error_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    NotFound(String),
    ValidationError {
        field: String,
        message: String,
    },
    ModelNotFound {
        model: String,
        available_models: Vec<String>,
    },
    ModelLoadError(String),
    InferenceError(String),
    InternalError(String),
}

impl ApiError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        ApiError::ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn to_response(&self, request_id: Option<String>) -> ErrorResponse {
        let (error_type, message, details) = match self {
            ApiError::NotFound(msg) => ("not_found", msg.clone(), None),
            ApiError::ValidationError { field, message } => {
                let mut details = HashMap::new();
                details.insert(
                    "field".to_string(),
                    serde_json::Value::String(field.clone()),
                );
                ("validation_error", message.clone(), Some(details))
            }
            ApiError::ModelNotFound {
                model,
                available_models,
            } => {
                let mut details = HashMap::new();
                details.insert(
                    "available_models".to_string(),
                    serde_json::Value::Array(
                        available_models
                            .iter()
                            .map(|m| serde_json::Value::String(m.clone()))
                            .collect(),
                    ),
                );
                (
                    "validation_error",
                    format!("Unknown model '{}'", model),
                    Some(details),
                )
            }
            ApiError::ModelLoadError(msg) => ("model_load_error", msg.clone(), None),
            ApiError::InferenceError(msg) => ("inference_error", msg.clone(), None),
            ApiError::InternalError(msg) => ("internal_error", msg.clone(), None),
        };

        ErrorResponse {
            error: message,
            error_type: error_type.to_string(),
            details,
            request_id,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::ValidationError { .. } | ApiError::ModelNotFound { .. } => 400,
            ApiError::ModelLoadError(_)
            | ApiError::InferenceError(_)
            | ApiError::InternalError(_) => 500,
        }
    }

    /// Render with the request id attached, for correlating with logs
    pub fn into_response_with_id(self, request_id: String) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_response(Some(request_id)))).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::ModelNotFound { model, .. } => write!(f, "Unknown model '{}'", model),
            ApiError::ModelLoadError(msg) => write!(f, "Model load error: {}", msg),
            ApiError::InferenceError(msg) => write!(f, "Inference error: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_response(None))).into_response()
    }
}

impl From<ClassifyError> for ApiError {
    fn from(err: ClassifyError) -> Self {
        match err {
            ClassifyError::Validation { field, message } => {
                ApiError::ValidationError { field, message }
            }
            ClassifyError::UnknownModel { key, available } => ApiError::ModelNotFound {
                model: key,
                available_models: available,
            },
            ClassifyError::ModelLoad(e) => e.into(),
            ClassifyError::Inference(e) => ApiError::InferenceError(e.to_string()),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl From<ModelLoadError> for ApiError {
    fn from(err: ModelLoadError) -> Self {
        ApiError::ModelLoadError(err.to_string())
    }
}
