// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Decoding raw YOLO output tensors into [`ModelOutput`]

use std::cmp::Ordering;

use crate::vision::backend::{DetectionBox, ModelOutput};
use crate::vision::error::InferenceError;

use super::preprocessing::Letterbox;

/// Thresholds applied while decoding detection heads
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionParams {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
        }
    }
}

/// Turn an output tensor into a [`ModelOutput`] based on its rank
///
/// - `[1, C]` or `[C]`: class scores
/// - `[1, 4 + nc, N]` or `[1, N, 4 + nc]`: detection head
pub fn decode_output(
    shape: &[usize],
    data: &[f32],
    num_classes: Option<usize>,
    params: &DetectionParams,
    letterbox: &Letterbox,
) -> Result<ModelOutput, InferenceError> {
    let expected: usize = shape.iter().product();
    if expected != data.len() {
        return Err(InferenceError::UnsupportedModel(format!(
            "output shape {:?} does not match {} values",
            shape,
            data.len()
        )));
    }

    match shape {
        [_] | [1, _] => Ok(ModelOutput::Classification {
            probabilities: data.to_vec(),
        }),
        [1, a, b] => {
            let boxes = decode_detections(*a, *b, data, num_classes, params, letterbox)?;
            Ok(ModelOutput::Detection { boxes })
        }
        _ => Err(InferenceError::UnsupportedModel(format!(
            "unexpected output shape {:?}",
            shape
        ))),
    }
}

/// Softmax, stable against large logits
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return vec![0.0; scores.len()];
    }
    exps.into_iter().map(|e| e / sum).collect()
}

/// Apply softmax unless every score already lies in [0, 1]
pub fn to_probabilities(scores: &[f32]) -> Vec<f32> {
    if scores.iter().all(|s| (0.0..=1.0).contains(s)) {
        scores.to_vec()
    } else {
        softmax(scores)
    }
}

fn decode_detections(
    dim_a: usize,
    dim_b: usize,
    data: &[f32],
    num_classes: Option<usize>,
    params: &DetectionParams,
    letterbox: &Letterbox,
) -> Result<Vec<DetectionBox>, InferenceError> {
    // Channels-first is the Ultralytics export default: [1, 84, 8400]
    let channels_first = match num_classes {
        Some(nc) if dim_a == 4 + nc => true,
        Some(nc) if dim_b == 4 + nc => false,
        Some(nc) => {
            return Err(InferenceError::UnsupportedModel(format!(
                "detection head has shape [1, {}, {}] but the model has {} classes; \
                 segmentation and pose heads are not supported",
                dim_a, dim_b, nc
            )))
        }
        None => dim_a <= dim_b,
    };

    let (channels, anchors) = if channels_first {
        (dim_a, dim_b)
    } else {
        (dim_b, dim_a)
    };
    if channels <= 4 {
        return Err(InferenceError::UnsupportedModel(format!(
            "detection head has {} channels, expected 4 box coordinates plus class scores",
            channels
        )));
    }

    let value = |channel: usize, anchor: usize| -> f32 {
        if channels_first {
            data[channel * anchors + anchor]
        } else {
            data[anchor * channels + channel]
        }
    };

    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let (class_id, score) = (4..channels)
            .map(|c| (c - 4, value(c, anchor)))
            .fold((0usize, f32::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            });

        if score < params.confidence_threshold {
            continue;
        }

        let cx = value(0, anchor);
        let cy = value(1, anchor);
        let w = value(2, anchor);
        let h = value(3, anchor);

        candidates.push(DetectionBox {
            class_id: class_id as u32,
            confidence: score.clamp(0.0, 1.0),
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        });
    }

    let kept = non_max_suppression(candidates, params.iou_threshold, params.max_detections);

    Ok(kept
        .into_iter()
        .map(|b| {
            let (x1, y1) = letterbox.map_to_original(b.x1, b.y1);
            let (x2, y2) = letterbox.map_to_original(b.x2, b.y2);
            DetectionBox { x1, y1, x2, y2, ..b }
        })
        .collect())
}

/// Per-class greedy NMS; output is confidence descending
pub fn non_max_suppression(
    mut boxes: Vec<DetectionBox>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<DetectionBox> {
    boxes.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: Vec<DetectionBox> = Vec::new();
    for candidate in boxes {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && iou(k, &candidate) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

/// Intersection over union of two boxes
pub fn iou(a: &DetectionBox, b: &DetectionBox) -> f32 {
    let ix1 = a.x1.max(b.x1);
    let iy1 = a.y1.max(b.y1);
    let ix2 = a.x2.min(b.x2);
    let iy2 = a.y2.min(b.y2);

    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let union = a.area() + b.area() - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}
