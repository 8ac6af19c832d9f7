// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Multipart form parsing for classification uploads

use axum::http::StatusCode;
use axum_extra::extract::multipart::{Multipart, MultipartError};
use tracing::debug;

use crate::api::errors::ApiError;
use crate::vision::{ClassifyRequest, MAX_IMAGE_SIZE};

const SIZE_MESSAGE: &str = "Image size cannot exceed 10MB";

/// Fields of the classification form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifyForm {
    /// `image`: file contents (required)
    pub image: Option<Vec<u8>>,
    /// `model`: catalog key
    pub model: Option<String>,
    /// `remove_background`: true/false/1/0/yes/no
    pub remove_background: Option<bool>,
}

impl ClassifyForm {
    /// Read the form, rejecting an image over 10MB as soon as it crosses the
    /// limit instead of buffering the rest
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = ClassifyForm::default();

        while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "image" => {
                    let mut bytes = Vec::new();
                    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                        if bytes.len() + chunk.len() > MAX_IMAGE_SIZE {
                            return Err(ApiError::validation("image", SIZE_MESSAGE));
                        }
                        bytes.extend_from_slice(&chunk);
                    }
                    form.image = Some(bytes);
                }
                "model" => {
                    let value = field.text().await.map_err(multipart_error)?;
                    let value = value.trim();
                    form.model = (!value.is_empty()).then(|| value.to_string());
                }
                "remove_background" => {
                    let value = field.text().await.map_err(multipart_error)?;
                    form.remove_background = parse_flag(&value).ok_or_else(|| {
                        ApiError::validation(
                            "remove_background",
                            format!("remove_background must be true or false, got '{}'", value),
                        )
                    })?;
                }
                other => debug!("Ignoring unknown form field '{}'", other),
            }
        }

        Ok(form)
    }

    pub fn into_request(self) -> Result<ClassifyRequest, ApiError> {
        let image = self
            .image
            .ok_or_else(|| ApiError::validation("image", "No image provided"))?;

        Ok(ClassifyRequest {
            image,
            model: self.model,
            remove_background: self.remove_background,
        })
    }
}

/// Parse a boolean form value; an empty value means "not set"
pub fn parse_flag(value: &str) -> Option<Option<bool>> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" => Some(None),
        "true" | "1" | "yes" | "on" => Some(Some(true)),
        "false" | "0" | "no" | "off" => Some(Some(false)),
        _ => None,
    }
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::validation("image", SIZE_MESSAGE);
    }
    ApiError::validation("form", format!("Malformed multipart form: {}", err.body_text()))
}
