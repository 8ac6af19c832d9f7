// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod classify;
pub mod errors;
pub mod http_server;
pub mod models;

pub use classify::{classify_handler, ClassifyForm, ClassifyResponse};
pub use errors::{ApiError, ErrorResponse};
pub use http_server::{create_router, start_server, AppState, HealthResponse, BODY_LIMIT};
pub use models::{models_handler, ModelEntry, ModelsResponse};
