//! SCRFD face detector via ONNX Runtime.
//!
//! Anchor-free decoding over three stride levels with NMS post-processing.
//! Landmark outputs are ignored; the embedder works from the box crop.

use crate::backend::BackendError;
use crate::types::FaceRegion;
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const SCRFD_INPUT_SIZE: u32 = 640;
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_CONFIDENCE_THRESHOLD: f32 = 0.5;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

/// A detected face before matching: region plus detector score.
#[derive(Debug, Clone)]
pub struct Detection {
    pub region: FaceRegion,
    pub score: f32,
}

/// Metadata for coordinate de-mapping after letterbox resize.
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// Box candidate in original-frame coordinates, pre-NMS.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
}

/// SCRFD-based face detector.
pub struct FaceDetector {
    session: Session,
}

impl FaceDetector {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, BackendError> {
        if !model_path.exists() {
            return Err(BackendError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        let session = Session::builder()?
            .with_intra_threads(2)
            .map_err(ort::Error::from)?
            .commit_from_file(model_path)?;

        let num_outputs = session.outputs().len();
        tracing::info!(
            path = %model_path.display(),
            outputs = num_outputs,
            "loaded SCRFD model"
        );

        // Standard SCRFD export ordering: [0-2] scores, [3-5] bboxes per
        // stride (landmark tensors, if exported, follow and are unused).
        if num_outputs < 6 {
            return Err(BackendError::Inference(format!(
                "SCRFD model requires at least 6 outputs (3 strides x score/bbox), got {num_outputs}"
            )));
        }

        Ok(Self { session })
    }

    /// Detect faces in a frame, sorted by descending detector score.
    pub fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, BackendError> {
        let gray = imageops::grayscale(frame);
        let (input, letterbox) = preprocess(&gray);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (stride_pos, &stride) in SCRFD_STRIDES.iter().enumerate() {
            let (_, scores) = outputs[stride_pos]
                .try_extract_tensor::<f32>()
                .map_err(|e| BackendError::Inference(format!("scores stride {stride}: {e}")))?;
            let (_, bboxes) = outputs[stride_pos + 3]
                .try_extract_tensor::<f32>()
                .map_err(|e| BackendError::Inference(format!("bboxes stride {stride}: {e}")))?;

            candidates.extend(decode_stride(scores, bboxes, stride, &letterbox));
        }

        let mut kept = nms(candidates, SCRFD_NMS_THRESHOLD);
        kept.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(kept
            .into_iter()
            .map(|c| to_detection(c, frame.width(), frame.height()))
            .collect())
    }
}

/// Resize into the 640x640 letterboxed input and build a normalized NCHW
/// tensor. Padding uses the model mean so it normalizes to zero.
fn preprocess(gray: &GrayImage) -> (Array4<f32>, Letterbox) {
    let (width, height) = gray.dimensions();
    let size = SCRFD_INPUT_SIZE;

    let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
    let new_w = ((width as f32 * scale).round() as u32).max(1);
    let new_h = ((height as f32 * scale).round() as u32).max(1);
    let resized = imageops::resize(gray, new_w, new_h, FilterType::Triangle);

    let pad_x = (size - new_w) / 2;
    let pad_y = (size - new_h) / 2;

    let mut tensor = Array4::<f32>::zeros((1, 3, size as usize, size as usize));
    for y in 0..size {
        for x in 0..size {
            let pixel = if x >= pad_x && x < pad_x + new_w && y >= pad_y && y < pad_y + new_h {
                resized.get_pixel(x - pad_x, y - pad_y)[0] as f32
            } else {
                SCRFD_MEAN
            };
            let normalized = (pixel - SCRFD_MEAN) / SCRFD_STD;
            // Grayscale replicated across the three input channels.
            tensor[[0, 0, y as usize, x as usize]] = normalized;
            tensor[[0, 1, y as usize, x as usize]] = normalized;
            tensor[[0, 2, y as usize, x as usize]] = normalized;
        }
    }

    let letterbox = Letterbox {
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
    };
    (tensor, letterbox)
}

/// Decode box candidates for one stride level back into frame coordinates.
fn decode_stride(scores: &[f32], bboxes: &[f32], stride: usize, letterbox: &Letterbox) -> Vec<Candidate> {
    let grid = SCRFD_INPUT_SIZE as usize / stride;
    let num_anchors = grid * grid * SCRFD_ANCHORS_PER_CELL;

    let mut candidates = Vec::new();
    for idx in 0..num_anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= SCRFD_CONFIDENCE_THRESHOLD {
            continue;
        }

        let bbox_off = idx * 4;
        if bbox_off + 3 >= bboxes.len() {
            continue;
        }

        let anchor_idx = idx / SCRFD_ANCHORS_PER_CELL;
        let anchor_cx = (anchor_idx % grid) as f32 * stride as f32;
        let anchor_cy = (anchor_idx / grid) as f32 * stride as f32;

        // Offsets are in stride units: [left, top, right, bottom].
        let x1 = anchor_cx - bboxes[bbox_off] * stride as f32;
        let y1 = anchor_cy - bboxes[bbox_off + 1] * stride as f32;
        let x2 = anchor_cx + bboxes[bbox_off + 2] * stride as f32;
        let y2 = anchor_cy + bboxes[bbox_off + 3] * stride as f32;

        candidates.push(Candidate {
            x1: (x1 - letterbox.pad_x) / letterbox.scale,
            y1: (y1 - letterbox.pad_y) / letterbox.scale,
            x2: (x2 - letterbox.pad_x) / letterbox.scale,
            y2: (y2 - letterbox.pad_y) / letterbox.scale,
            score,
        });
    }

    candidates
}

/// Non-Maximum Suppression: drop candidates overlapping a stronger one.
fn nms(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if keep.iter().all(|k| iou(k, &candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &Candidate, b: &Candidate) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = (a.x2 - a.x1).max(0.0) * (a.y2 - a.y1).max(0.0);
    let area_b = (b.x2 - b.x1).max(0.0) * (b.y2 - b.y1).max(0.0);
    let union = area_a + area_b - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

fn to_detection(c: Candidate, width: u32, height: u32) -> Detection {
    let clamp_x = |v: f32| v.max(0.0).min(width as f32) as u32;
    let clamp_y = |v: f32| v.max(0.0).min(height as f32) as u32;
    Detection {
        region: FaceRegion {
            top: clamp_y(c.y1),
            right: clamp_x(c.x2),
            bottom: clamp_y(c.y2),
            left: clamp_x(c.x1),
        },
        score: c.score,
    }
}
