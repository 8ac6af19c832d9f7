// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Background removal with an ISNet / U2Net style segmentation model
//!
//! The model predicts a single-channel saliency map. It is min-max
//! normalized, resized back to the source dimensions and written into the
//! alpha channel; fully transparent pixels are cleared to black.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use ndarray::Array4;

use crate::vision::error::BackgroundRemovalError;

/// ISNet normalization: (pixel / 255 - 0.5) / 1.0
const MEAN: f32 = 0.5;
const STD: f32 = 1.0;

/// Produces a foreground cutout of an image
#[cfg_attr(test, mockall::automock)]
pub trait BackgroundRemover: Send + Sync {
    fn remove_background(&self, image: &DynamicImage) -> Result<RgbaImage, BackgroundRemovalError>;
}

/// Resize to the square model input and normalize to `[1, 3, S, S]`
pub fn preprocess(image: &DynamicImage, input_size: u32) -> Array4<f32> {
    let resized = image
        .resize_exact(input_size, input_size, FilterType::Triangle)
        .to_rgb8();

    let size = input_size as usize;
    let mut tensor = Array4::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 / 255.0 - MEAN) / STD;
        }
    }
    tensor
}

/// Convert a `[1, 1, H, W]` saliency map into a mask at the original size
pub fn mask_from_output(
    shape: &[usize],
    data: &[f32],
    width: u32,
    height: u32,
) -> Result<GrayImage, BackgroundRemovalError> {
    let (mask_h, mask_w) = match shape {
        [1, 1, h, w] | [1, h, w] => (*h, *w),
        _ => {
            return Err(BackgroundRemovalError::Segmentation(format!(
                "unexpected mask shape {:?}",
                shape
            )))
        }
    };
    if mask_h * mask_w != data.len() || mask_h == 0 || mask_w == 0 {
        return Err(BackgroundRemovalError::Segmentation(format!(
            "mask shape {:?} does not match {} values",
            shape,
            data.len()
        )));
    }

    let (min, max) = data
        .iter()
        .fold((f32::MAX, f32::MIN), |(min, max), &v| (min.min(v), max.max(v)));
    let range = max - min;

    let raw = GrayImage::from_fn(mask_w as u32, mask_h as u32, |x, y| {
        let value = data[y as usize * mask_w + x as usize];
        let normalized = if range > f32::EPSILON {
            (value - min) / range
        } else {
            0.0
        };
        Luma([(normalized.clamp(0.0, 1.0) * 255.0).round() as u8])
    });

    if (mask_w as u32, mask_h as u32) == (width, height) {
        return Ok(raw);
    }
    Ok(image::imageops::resize(&raw, width, height, FilterType::Triangle))
}

/// Use the mask as the alpha channel of the image
pub fn apply_mask(image: &DynamicImage, mask: &GrayImage) -> RgbaImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();

    RgbaImage::from_fn(width, height, |x, y| {
        let pixel = rgba.get_pixel(x, y);
        let alpha = mask.get_pixel_checked(x, y).map(|p| p[0]).unwrap_or(0);
        if alpha > 0 {
            Rgba([pixel[0], pixel[1], pixel[2], alpha])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxBackgroundRemover;

#[cfg(feature = "onnx")]
mod onnx {
    use std::path::Path;
    use std::sync::{Mutex, PoisonError};

    use image::{DynamicImage, GenericImageView, RgbaImage};
    use ort::execution_providers::CPUExecutionProvider;
    use ort::session::builder::GraphOptimizationLevel;
    use ort::session::Session;
    use ort::value::Value;
    use tracing::info;

    use super::{apply_mask, mask_from_output, preprocess, BackgroundRemover};
    use crate::vision::error::BackgroundRemovalError;

    /// Segmentation model running in its own CPU session
    pub struct OnnxBackgroundRemover {
        session: Mutex<Session>,
        input_name: String,
        input_size: u32,
    }

    impl std::fmt::Debug for OnnxBackgroundRemover {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("OnnxBackgroundRemover")
                .field("input_name", &self.input_name)
                .field("input_size", &self.input_size)
                .finish_non_exhaustive()
        }
    }

    impl OnnxBackgroundRemover {
        pub fn load(
            model_path: &Path,
            input_size: u32,
            intra_threads: usize,
        ) -> Result<Self, BackgroundRemovalError> {
            if !model_path.exists() {
                return Err(BackgroundRemovalError::ModelNotFound(model_path.to_path_buf()));
            }

            info!(
                "Loading background removal model from {}",
                model_path.display()
            );

            let load_error = |e: String| BackgroundRemovalError::Load(e);
            let session = Session::builder()
                .map_err(|e| load_error(e.to_string()))?
                .with_execution_providers([CPUExecutionProvider::default().build()])
                .map_err(|e| load_error(e.to_string()))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| load_error(e.to_string()))?
                .with_intra_threads(intra_threads)
                .map_err(|e| load_error(e.to_string()))?
                .commit_from_file(model_path)
                .map_err(|e| load_error(e.to_string()))?;

            let input_name = session
                .inputs
                .first()
                .map(|input| input.name.clone())
                .unwrap_or_else(|| "input".to_string());

            info!("✅ Background removal model loaded ({}px)", input_size);

            Ok(Self {
                session: Mutex::new(session),
                input_name,
                input_size,
            })
        }
    }

    impl BackgroundRemover for OnnxBackgroundRemover {
        fn remove_background(
            &self,
            image: &DynamicImage,
        ) -> Result<RgbaImage, BackgroundRemovalError> {
            let (width, height) = image.dimensions();
            let input = Value::from_array(preprocess(image, self.input_size))
                .map_err(|e| BackgroundRemovalError::Segmentation(e.to_string()))?;

            let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
            let outputs = session
                .run(ort::inputs![&self.input_name => input])
                .map_err(|e| BackgroundRemovalError::Segmentation(e.to_string()))?;

            // ISNet exports several side outputs; the first is the fused map
            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| BackgroundRemovalError::Segmentation(e.to_string()))?;
            let shape: Vec<usize> = shape.iter().map(|&d| d as usize).collect();

            let mask = mask_from_output(&shape, data, width, height)?;
            Ok(apply_mask(image, &mask))
        }
    }
}
