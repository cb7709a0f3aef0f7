//! Descriptor backend interface.
//!
//! A backend turns images into matchable face data. Two implementations
//! exist: [`LocalBackend`](crate::local::LocalBackend) runs SCRFD + ArcFace
//! via ONNX Runtime; [`RemoteBackend`](crate::remote::RemoteBackend) calls
//! an HTTP detection/comparison API. The pipeline only sees this trait.

use crate::types::{Descriptor, ProbeFace};
use image::{ImageFormat, RgbImage};
use std::cell::OnceCell;
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("model file not found: {0} — download from insightface and place in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Response(String),
    #[error("{0} not supported by this backend")]
    Unsupported(&'static str),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// A probe frame handed to a backend, with its JPEG encoding produced
/// lazily so the local strategy never pays for it.
pub struct ProbeImage {
    image: RgbImage,
    jpeg: OnceCell<Vec<u8>>,
}

impl ProbeImage {
    pub fn new(image: RgbImage) -> ProbeImage {
        ProbeImage {
            image,
            jpeg: OnceCell::new(),
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// JPEG-encoded pixels, encoded once on first use.
    pub fn jpeg(&self) -> Result<&[u8], BackendError> {
        if let Some(buf) = self.jpeg.get() {
            return Ok(buf);
        }
        let mut buf = Vec::new();
        self.image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)?;
        Ok(self.jpeg.get_or_init(|| buf))
    }
}

/// Strategy interface for face detection and description.
pub trait DescriptorBackend {
    /// Short name for logs ("local" / "remote").
    fn name(&self) -> &'static str;

    /// Extract a gallery descriptor from raw image file bytes.
    ///
    /// Returns `Ok(None)` when no face is present; the file is then skipped
    /// by the gallery with a warning rather than aborting the load.
    fn enroll(&mut self, image_bytes: &[u8]) -> Result<Option<Descriptor>, BackendError>;

    /// Detect faces in a probe frame. Regions are in the probe image's own
    /// pixel space.
    fn detect(&mut self, probe: &ProbeImage) -> Result<Vec<ProbeFace>, BackendError>;

    /// Pairwise similarity (0-100) between a gallery reference image and
    /// the probe frame. Only the remote strategy provides this.
    fn compare_one(&mut self, _reference: &[u8], _probe: &ProbeImage) -> Result<f32, BackendError> {
        Err(BackendError::Unsupported("pairwise comparison"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_jpeg_is_cached() {
        let probe = ProbeImage::new(RgbImage::from_pixel(8, 8, image::Rgb([120, 80, 40])));
        let first = probe.jpeg().unwrap().as_ptr();
        let second = probe.jpeg().unwrap().as_ptr();
        assert_eq!(first, second);
    }

    #[test]
    fn test_probe_jpeg_decodes_back() {
        let probe = ProbeImage::new(RgbImage::from_pixel(16, 9, image::Rgb([200, 10, 10])));
        let decoded = image::load_from_memory(probe.jpeg().unwrap()).unwrap();
        assert_eq!(decoded.width(), 16);
        assert_eq!(decoded.height(), 9);
    }
}
