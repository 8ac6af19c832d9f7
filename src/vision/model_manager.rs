// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model loader: resolves catalog keys to loaded models and caches them
//! for the lifetime of the process

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{InferenceConfig, ModelCatalog, ModelConfig};
use crate::vision::backend::{default_backends, InferenceBackend, VisionModel};
use crate::vision::error::ModelLoadError;

/// A model that has been loaded by a backend
pub struct LoadedModel {
    config: ModelConfig,
    backend: &'static str,
    model: Arc<dyn VisionModel>,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("key", &self.config.key)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl LoadedModel {
    pub fn new(config: ModelConfig, backend: &'static str, model: Arc<dyn VisionModel>) -> Self {
        Self {
            config,
            backend,
            model,
        }
    }

    pub fn key(&self) -> &str {
        &self.config.key
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }

    pub fn model(&self) -> &dyn VisionModel {
        self.model.as_ref()
    }

    /// Configured name, then the name embedded in the weights, then `class_{id}`
    pub fn class_name(&self, class_id: u32) -> String {
        let index = class_id as usize;
        self.config
            .class_names
            .get(index)
            .or_else(|| {
                if self.config.class_names.is_empty() {
                    self.model.embedded_class_names().get(index)
                } else {
                    None
                }
            })
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }
}

/// Catalog entry as listed by the models endpoint
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModelInfo {
    pub key: String,
    pub name: String,
    pub classes: Vec<String>,
    pub loaded: bool,
}

/// Loads models on first use and hands out shared handles afterwards
///
/// Each catalog key has its own load lock. A cold load holds that key's
/// lock and checks the cache again once it is held, so each key is loaded
/// at most once while different keys load in parallel.
pub struct ModelLoader {
    catalog: ModelCatalog,
    inference: InferenceConfig,
    backends: Vec<Arc<dyn InferenceBackend>>,
    cache: RwLock<HashMap<String, Arc<LoadedModel>>>,
    /// One entry per catalog key, fixed at construction
    load_locks: HashMap<String, Mutex<()>>,
}

impl std::fmt::Debug for ModelLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelLoader")
            .field("default", &self.catalog.default)
            .field("models", &self.catalog.keys())
            .field(
                "backends",
                &self.backends.iter().map(|b| b.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl ModelLoader {
    /// Loader using the backends compiled into this build
    pub fn new(catalog: ModelCatalog, inference: InferenceConfig) -> Self {
        Self::with_backends(catalog, inference, default_backends())
    }

    pub fn with_backends(
        catalog: ModelCatalog,
        inference: InferenceConfig,
        backends: Vec<Arc<dyn InferenceBackend>>,
    ) -> Self {
        let load_locks = catalog
            .iter()
            .map(|model| (model.key.clone(), Mutex::new(())))
            .collect();

        Self {
            catalog,
            inference,
            backends,
            cache: RwLock::new(HashMap::new()),
            load_locks,
        }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn default_key(&self) -> &str {
        &self.catalog.default
    }

    pub fn contains(&self, key: &str) -> bool {
        self.catalog.contains(key)
    }

    /// Get a loaded model, loading it on first request
    ///
    /// `None` selects the catalog default.
    pub fn get_model(&self, key: Option<&str>) -> Result<Arc<LoadedModel>, ModelLoadError> {
        let key = key.unwrap_or(&self.catalog.default);
        let config = self
            .catalog
            .get(key)
            .ok_or_else(|| ModelLoadError::UnknownModel {
                key: key.to_string(),
                available: self.catalog.keys(),
            })?;

        if let Some(model) = self.cached(key) {
            return Ok(model);
        }

        let _guard = self
            .load_locks
            .get(key)
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner));

        // Another request may have finished loading while we waited
        if let Some(model) = self.cached(key) {
            debug!("Model '{}' was loaded by a concurrent request", key);
            return Ok(model);
        }

        let loaded = Arc::new(self.load(config)?);
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), loaded.clone());

        Ok(loaded)
    }

    /// Load the default model ahead of the first request
    pub fn preload(&self) -> Result<Arc<LoadedModel>, ModelLoadError> {
        self.get_model(None)
    }

    pub fn is_loaded(&self, key: &str) -> bool {
        self.cached(key).is_some()
    }

    /// Keys of models currently in memory, in catalog order
    pub fn loaded_keys(&self) -> Vec<String> {
        self.catalog
            .iter()
            .filter(|model| self.is_loaded(&model.key))
            .map(|model| model.key.clone())
            .collect()
    }

    pub fn list_models(&self) -> Vec<ModelInfo> {
        self.catalog
            .iter()
            .map(|model| ModelInfo {
                key: model.key.clone(),
                name: model.display_name.clone(),
                classes: model.class_names.clone(),
                loaded: self.is_loaded(&model.key),
            })
            .collect()
    }

    fn cached(&self, key: &str) -> Option<Arc<LoadedModel>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn load(&self, config: &ModelConfig) -> Result<LoadedModel, ModelLoadError> {
        if !config.weights_path.exists() {
            warn!(
                "Weights for model '{}' not found at {}",
                config.key,
                config.weights_path.display()
            );
            return Err(ModelLoadError::WeightsNotFound(config.weights_path.clone()));
        }

        let backend = self
            .backends
            .iter()
            .find(|backend| backend.is_available())
            .ok_or_else(|| {
                ModelLoadError::NoBackend(format!(
                    "none of [{}] can run in this build",
                    self.backends
                        .iter()
                        .map(|b| b.name())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })?;

        let start = Instant::now();
        let model = backend.load(config, &self.inference)?;
        info!(
            "Model '{}' loaded with {} backend in {:?}",
            config.key,
            backend.name(),
            start.elapsed()
        );

        Ok(LoadedModel::new(config.clone(), backend.name(), model))
    }
}
