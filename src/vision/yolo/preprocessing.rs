// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for Ultralytics YOLO models
//!
//! - Detection: letterbox to a square input with gray (114) padding
//! - Classification: resize the shortest side, then center crop
//!
//! Both produce an RGB `[1, 3, H, W]` tensor scaled to [0, 1].

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;

/// Padding color used by Ultralytics letterboxing
pub const LETTERBOX_FILL: u8 = 114;

/// Input edge used when neither config nor metadata provide one
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Scale and padding applied by [`letterbox`], for mapping boxes back
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub original_width: u32,
    pub original_height: u32,
}

impl Letterbox {
    pub fn new(original_width: u32, original_height: u32, target_size: u32) -> Self {
        if original_width == 0 || original_height == 0 {
            return Self {
                scale: 1.0,
                pad_x: 0.0,
                pad_y: 0.0,
                original_width,
                original_height,
            };
        }

        let scale = (target_size as f32 / original_width as f32)
            .min(target_size as f32 / original_height as f32);
        let new_w = ((original_width as f32 * scale).round() as u32).clamp(1, target_size);
        let new_h = ((original_height as f32 * scale).round() as u32).clamp(1, target_size);

        Self {
            scale,
            pad_x: ((target_size - new_w) / 2) as f32,
            pad_y: ((target_size - new_h) / 2) as f32,
            original_width,
            original_height,
        }
    }

    /// Identity mapping, for outputs already in original coordinates
    pub fn identity(original_width: u32, original_height: u32) -> Self {
        Self {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
            original_width,
            original_height,
        }
    }

    /// Map a point from model input space to original image space,
    /// clamped to the image bounds
    pub fn map_to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let ox = (x - self.pad_x) / self.scale;
        let oy = (y - self.pad_y) / self.scale;
        (
            ox.clamp(0.0, self.original_width as f32),
            oy.clamp(0.0, self.original_height as f32),
        )
    }
}

/// Convert to RGB, compositing any alpha channel over black
///
/// Background-removed images carry their cutout in the alpha channel; the
/// RGB values under transparent pixels are not meaningful.
pub fn to_rgb_on_black(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let p = rgba.get_pixel(x, y);
        let a = p[3] as u16;
        Rgb([
            ((p[0] as u16 * a) / 255) as u8,
            ((p[1] as u16 * a) / 255) as u8,
            ((p[2] as u16 * a) / 255) as u8,
        ])
    })
}

/// Letterbox an image into a `target_size` square tensor
pub fn letterbox(image: &DynamicImage, target_size: u32) -> (Array4<f32>, Letterbox) {
    let (orig_w, orig_h) = image.dimensions();
    let info = Letterbox::new(orig_w, orig_h, target_size);

    let mut canvas = RgbImage::from_pixel(
        target_size,
        target_size,
        Rgb([LETTERBOX_FILL, LETTERBOX_FILL, LETTERBOX_FILL]),
    );

    if orig_w > 0 && orig_h > 0 {
        let new_w = ((orig_w as f32 * info.scale).round() as u32).clamp(1, target_size);
        let new_h = ((orig_h as f32 * info.scale).round() as u32).clamp(1, target_size);
        let resized = image.resize_exact(new_w, new_h, FilterType::Triangle);
        let rgb = to_rgb_on_black(&resized);
        image::imageops::replace(&mut canvas, &rgb, info.pad_x as i64, info.pad_y as i64);
    }

    (to_nchw(&canvas), info)
}

/// Resize the shortest side to `target_size` and crop the center square
pub fn center_crop(image: &DynamicImage, target_size: u32) -> Array4<f32> {
    let (orig_w, orig_h) = image.dimensions();
    if orig_w == 0 || orig_h == 0 {
        return Array4::zeros((1, 3, target_size as usize, target_size as usize));
    }

    let scale = target_size as f32 / orig_w.min(orig_h) as f32;
    let new_w = ((orig_w as f32 * scale).round() as u32).max(target_size);
    let new_h = ((orig_h as f32 * scale).round() as u32).max(target_size);
    let resized = image.resize_exact(new_w, new_h, FilterType::Triangle);

    let left = (new_w - target_size) / 2;
    let top = (new_h - target_size) / 2;
    let cropped = resized.crop_imm(left, top, target_size, target_size);

    to_nchw(&to_rgb_on_black(&cropped))
}

/// RGB image to `[1, 3, H, W]` with values in [0, 1]
pub fn to_nchw(rgb: &RgbImage) -> Array4<f32> {
    let (w, h) = rgb.dimensions();
    let mut tensor = Array4::zeros((1, 3, h as usize, w as usize));

    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    tensor
}
