//! ArcFace face embedder via ONNX Runtime.
//!
//! Crops the detected region, resizes it to the 112x112 model input, and
//! extracts an L2-normalized 512-dimensional embedding.

use crate::backend::BackendError;
use crate::types::{Embedding, FaceRegion};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const ARCFACE_INPUT_SIZE: u32 = 112;
const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5;
const ARCFACE_EMBEDDING_DIM: usize = 512;

/// ArcFace-based face embedder.
pub struct FaceEmbedder {
    session: Session,
}

impl FaceEmbedder {
    /// Load the ArcFace ONNX model from the given path.
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

        tracing::info!(path = %model_path.display(), "loaded ArcFace model");

        Ok(Self { session })
    }

    /// Extract an embedding for a detected face region of `frame`.
    pub fn extract(
        &mut self,
        frame: &RgbImage,
        region: &FaceRegion,
    ) -> Result<Embedding, BackendError> {
        let region = region.clamped(frame.width(), frame.height());
        if region.width() == 0 || region.height() == 0 {
            return Err(BackendError::Inference("empty face region".into()));
        }

        let crop = imageops::crop_imm(
            frame,
            region.left,
            region.top,
            region.width(),
            region.height(),
        )
        .to_image();
        let resized = imageops::resize(
            &crop,
            ARCFACE_INPUT_SIZE,
            ARCFACE_INPUT_SIZE,
            FilterType::Triangle,
        );

        let input = preprocess(&resized);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| BackendError::Inference(format!("embedding extraction: {e}")))?;

        if raw.len() != ARCFACE_EMBEDDING_DIM {
            return Err(BackendError::Inference(format!(
                "expected {ARCFACE_EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        // L2-normalize so Euclidean distances are comparable across frames.
        let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        let values = if norm > 0.0 {
            raw.iter().map(|x| x / norm).collect()
        } else {
            raw.to_vec()
        };

        Ok(Embedding { values })
    }
}

/// Build a normalized NCHW tensor from a 112x112 RGB crop.
fn preprocess(face: &RgbImage) -> Array4<f32> {
    let size = ARCFACE_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for (x, y, pixel) in face.enumerate_pixels() {
        for channel in 0..3 {
            tensor[[0, channel, y as usize, x as usize]] =
                (pixel[channel] as f32 - ARCFACE_MEAN) / ARCFACE_STD;
        }
    }

    tensor
}
