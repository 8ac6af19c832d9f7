// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use eco_classifier::config::{InferenceConfig, ModelCatalog, ModelConfig};
use eco_classifier::vision::{
    InferenceBackend, InferenceError, ModelLoadError, ModelOutput, VisionModel,
};
use image::DynamicImage;

/// Records the size of every image it sees
pub struct RecordingModel {
    pub output: ModelOutput,
    pub seen: std::sync::Mutex<Vec<(u32, u32)>>,
}

impl VisionModel for RecordingModel {
    fn run(&self, image: &DynamicImage) -> Result<ModelOutput, InferenceError> {
        self.seen
            .lock()
            .unwrap()
            .push((image.width(), image.height()));
        Ok(self.output.clone())
    }
}

/// Backend that takes `delay` to load, counting every load
pub struct SlowBackend {
    pub delay: Duration,
    pub loads: Arc<AtomicUsize>,
}

impl InferenceBackend for SlowBackend {
    fn name(&self) -> &'static str {
        "slow-stub"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn load(
        &self,
        _model: &ModelConfig,
        _inference: &InferenceConfig,
    ) -> Result<Arc<dyn VisionModel>, ModelLoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        Ok(Arc::new(RecordingModel {
            output: ModelOutput::Classification {
                probabilities: vec![0.7, 0.3],
            },
            seen: Default::default(),
        }))
    }
}

/// Catalog of `keys`, each with a weights file inside `dir`
pub fn catalog(dir: &tempfile::TempDir, keys: &[&str]) -> ModelCatalog {
    let models = keys
        .iter()
        .map(|key| {
            let path = dir.path().join(format!("{key}.onnx"));
            std::fs::write(&path, b"weights").unwrap();
            ModelConfig::new(*key, path, format!("Model {key}"), vec![])
        })
        .collect();
    ModelCatalog::new(keys[0], models).unwrap()
}

/// Backend whose load of `gated_key` waits until `release` is set
pub struct GatedBackend {
    pub gated_key: String,
    pub started: Arc<AtomicBool>,
    pub release: Arc<AtomicBool>,
    pub finished: Arc<AtomicBool>,
}

impl InferenceBackend for GatedBackend {
    fn name(&self) -> &'static str {
        "gated-stub"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn load(
        &self,
        model: &ModelConfig,
        _inference: &InferenceConfig,
    ) -> Result<Arc<dyn VisionModel>, ModelLoadError> {
        if model.key == self.gated_key {
            self.started.store(true, Ordering::SeqCst);
            let deadline = Instant::now() + Duration::from_secs(5);
            while !self.release.load(Ordering::SeqCst) && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(5));
            }
            self.finished.store(true, Ordering::SeqCst);
        }
        Ok(Arc::new(RecordingModel {
            output: ModelOutput::Classification {
                probabilities: vec![1.0],
            },
            seen: Default::default(),
        }))
    }
}
