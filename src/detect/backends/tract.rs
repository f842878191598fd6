#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};

/// Tract-based backend for ONNX object detection models.
///
/// Loads a local model file and performs inference on RGB frames. Expects a
/// YOLO-style output tensor of shape `[1, 4 + num_classes, num_anchors]`
/// (cx, cy, w, h rows followed by one score row per class). No network I/O,
/// no disk writes beyond model loading.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    width: u32,
    height: u32,
    num_classes: usize,
    score_floor: f32,
    iou_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        width: u32,
        height: u32,
        num_classes: usize,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            num_classes,
            score_floor: 0.05,
            iou_threshold: 0.45,
        })
    }

    /// Override the score floor below which candidate boxes are discarded.
    /// The pipeline applies its own confidence threshold on top of this.
    pub fn with_score_floor(mut self, floor: f32) -> Self {
        self.score_floor = floor;
        self
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        if width != self.width || height != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                width,
                height,
                self.width,
                self.height
            ));
        }

        let expected_len = crate::frame::rgb_len(width, height)?;
        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let width = width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, height as usize, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                pixels[idx] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape();
        if shape.len() != 3 || shape[1] != 4 + self.num_classes {
            return Err(anyhow!(
                "unexpected output shape {:?}, expected [1, {}, anchors]",
                shape,
                4 + self.num_classes
            ));
        }

        let anchors = shape[2];
        let flat = view
            .as_slice()
            .ok_or_else(|| anyhow!("model output tensor was not contiguous"))?;
        let candidates = decode_predictions(flat, anchors, self.num_classes, self.score_floor);
        let kept = suppress_overlaps(candidates, self.iou_threshold);
        Ok(kept
            .into_iter()
            .map(|d| Detection {
                bbox: d.bbox.clamp_to(width, height),
                ..d
            })
            .collect())
    }
}

/// Decode a `[4 + num_classes, anchors]` prediction block (row-major, anchor
/// as the fastest axis) into candidate detections above `score_floor`.
fn decode_predictions(
    flat: &[f32],
    anchors: usize,
    num_classes: usize,
    score_floor: f32,
) -> Vec<Detection> {
    let row = |r: usize, a: usize| flat[r * anchors + a];
    let mut candidates = Vec::new();

    for a in 0..anchors {
        let mut best_class = 0usize;
        let mut best_score = 0.0f32;
        for c in 0..num_classes {
            let score = row(4 + c, a);
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }
        if best_score < score_floor {
            continue;
        }

        let cx = row(0, a);
        let cy = row(1, a);
        let w = row(2, a);
        let h = row(3, a);
        candidates.push(Detection {
            class_id: best_class as u32,
            confidence: best_score,
            bbox: BoundingBox {
                x: cx - w / 2.0,
                y: cy - h / 2.0,
                w,
                h,
            },
        });
    }

    candidates
}

/// Greedy per-class non-maximum suppression.
fn suppress_overlaps(mut candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::new();
    for candidate in candidates {
        let overlaps = kept.iter().any(|k| {
            k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold
        });
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.w).min(b.x + b.w);
    let y2 = (a.y + a.h).min(b.y + b.h);
    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.w * a.h + b.w * b.h - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}
