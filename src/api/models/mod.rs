// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model catalog endpoint module
//!
//! Provides GET /api/models/ listing the configured models.

pub mod handler;
pub mod response;

pub use handler::models_handler;
pub use response::{ModelEntry, ModelsResponse};
