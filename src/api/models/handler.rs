// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model catalog endpoint handler

use axum::{extract::State, Json};
use tracing::debug;

use super::response::{ModelEntry, ModelsResponse};
use crate::api::http_server::AppState;

/// GET /api/models/ - List configured models and the default key
///
/// Listing never loads a model.
pub async fn models_handler(State(state): State<AppState>) -> Json<ModelsResponse> {
    let loader = state.service.loader();
    let models: Vec<ModelEntry> = loader
        .list_models()
        .into_iter()
        .map(ModelEntry::from)
        .collect();

    debug!("Listing {} models", models.len());

    Json(ModelsResponse {
        models,
        default: loader.default_key().to_string(),
    })
}
