// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Classification API endpoint module
//!
//! Provides POST /api/classify/ for classifying an uploaded image.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::classify_handler;
pub use request::ClassifyForm;
pub use response::ClassifyResponse;
