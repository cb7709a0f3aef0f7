//! Local descriptor backend: SCRFD detection + ArcFace embeddings.

use crate::backend::{BackendError, DescriptorBackend, ProbeImage};
use crate::detector::FaceDetector;
use crate::embedder::FaceEmbedder;
use crate::types::{Descriptor, ProbeFace, ProbeSignal};
use std::path::Path;

const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

/// ONNX-based backend running entirely on the local CPU.
pub struct LocalBackend {
    detector: FaceDetector,
    embedder: FaceEmbedder,
}

impl LocalBackend {
    /// Load both models from `model_dir`. Fails fast when either is missing.
    pub fn load(model_dir: &Path) -> Result<Self, BackendError> {
        let detector = FaceDetector::load(&model_dir.join(SCRFD_MODEL_FILE))?;
        let embedder = FaceEmbedder::load(&model_dir.join(ARCFACE_MODEL_FILE))?;
        Ok(Self { detector, embedder })
    }
}

impl DescriptorBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn enroll(&mut self, image_bytes: &[u8]) -> Result<Option<Descriptor>, BackendError> {
        let image = image::load_from_memory(image_bytes)?.to_rgb8();
        let detections = self.detector.detect(&image)?;

        // First (highest-scoring) face only; extra faces in a gallery
        // image are ignored.
        let Some(detection) = detections.first() else {
            return Ok(None);
        };

        let embedding = self.embedder.extract(&image, &detection.region)?;
        Ok(Some(Descriptor::Embedding(embedding)))
    }

    fn detect(&mut self, probe: &ProbeImage) -> Result<Vec<ProbeFace>, BackendError> {
        let detections = self.detector.detect(probe.image())?;

        let mut faces = Vec::with_capacity(detections.len());
        for detection in detections {
            let embedding = self.embedder.extract(probe.image(), &detection.region)?;
            faces.push(ProbeFace {
                region: detection.region,
                signal: ProbeSignal::Embedding(embedding),
            });
        }
        Ok(faces)
    }
}
