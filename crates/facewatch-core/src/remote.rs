//! Remote descriptor backend over a detection/comparison HTTP API.
//!
//! The service exposes two JSON endpoints: `POST /detect` returns
//! relative bounding boxes with a 0-100 per-face confidence, and
//! `POST /compare` scores a source image against a target image. Images
//! travel as base64 payloads.

use crate::backend::{BackendError, DescriptorBackend, ProbeImage};
use crate::types::{Descriptor, FaceRegion, ProbeFace, ProbeSignal};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

const API_KEY_HEADER: &str = "x-api-key";

/// Connection settings for the remote face API.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL, e.g. `https://faces.example.com/v1`.
    pub endpoint: String,
    /// Deployment region selector forwarded with each request.
    pub region: Option<String>,
    /// Optional API key sent as a request header.
    pub api_key: Option<String>,
}

/// HTTP-backed descriptor backend.
pub struct RemoteBackend {
    client: reqwest::blocking::Client,
    config: RemoteConfig,
    similarity_threshold: f32,
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    image: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<&'a str>,
}

#[derive(Deserialize)]
struct DetectResponse {
    #[serde(default)]
    faces: Vec<RemoteFace>,
}

#[derive(Deserialize)]
struct RemoteFace {
    bounding_box: RemoteBoundingBox,
    confidence: f32,
}

/// Bounding box in relative coordinates (0.0-1.0 of image dimensions).
#[derive(Deserialize)]
struct RemoteBoundingBox {
    top: f32,
    left: f32,
    width: f32,
    height: f32,
}

#[derive(Serialize)]
struct CompareRequest<'a> {
    source_image: &'a str,
    target_image: &'a str,
    similarity_threshold: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<&'a str>,
}

#[derive(Deserialize)]
struct CompareResponse {
    #[serde(default)]
    matches: Vec<CompareMatch>,
}

#[derive(Deserialize)]
struct CompareMatch {
    similarity: f32,
}

impl RemoteBackend {
    pub fn new(config: RemoteConfig, similarity_threshold: f32) -> Result<Self, BackendError> {
        let client = reqwest::blocking::Client::builder().build()?;
        tracing::info!(
            endpoint = %config.endpoint,
            region = config.region.as_deref().unwrap_or("default"),
            "remote face API backend ready"
        );
        Ok(Self {
            client,
            config,
            similarity_threshold,
        })
    }

    fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        request: &Req,
    ) -> Result<Resp, BackendError> {
        let url = format!("{}/{path}", self.config.endpoint.trim_end_matches('/'));
        let mut builder = self.client.post(url).json(request);
        if let Some(key) = &self.config.api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        Ok(builder.send()?.error_for_status()?.json()?)
    }

    fn detect_bytes(&self, image_bytes: &[u8]) -> Result<Vec<RemoteFace>, BackendError> {
        let encoded = BASE64.encode(image_bytes);
        let response: DetectResponse = self.post(
            "detect",
            &DetectRequest {
                image: &encoded,
                region: self.config.region.as_deref(),
            },
        )?;
        Ok(response.faces)
    }
}

impl DescriptorBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn enroll(&mut self, image_bytes: &[u8]) -> Result<Option<Descriptor>, BackendError> {
        // The raw file bytes themselves are the gallery descriptor; the
        // service re-reads them on every pairwise comparison.
        if self.detect_bytes(image_bytes)?.is_empty() {
            return Ok(None);
        }
        Ok(Some(Descriptor::Reference(image_bytes.to_vec())))
    }

    fn detect(&mut self, probe: &ProbeImage) -> Result<Vec<ProbeFace>, BackendError> {
        let faces = self.detect_bytes(probe.jpeg()?)?;
        Ok(faces
            .into_iter()
            .map(|face| ProbeFace {
                region: to_region(&face.bounding_box, probe.width(), probe.height()),
                signal: ProbeSignal::DetectorConfidence(face.confidence),
            })
            .collect())
    }

    fn compare_one(&mut self, reference: &[u8], probe: &ProbeImage) -> Result<f32, BackendError> {
        let source = BASE64.encode(reference);
        let target = BASE64.encode(probe.jpeg()?);
        let response: CompareResponse = self.post(
            "compare",
            &CompareRequest {
                source_image: &source,
                target_image: &target,
                similarity_threshold: self.similarity_threshold,
                region: self.config.region.as_deref(),
            },
        )?;

        // The service already filters by the threshold; an empty list means
        // no match, reported as zero similarity.
        Ok(response
            .matches
            .iter()
            .map(|m| m.similarity)
            .fold(0.0, f32::max))
    }
}

/// Map a relative bounding box onto pixel coordinates of a `width` x
/// `height` image.
fn to_region(bb: &RemoteBoundingBox, width: u32, height: u32) -> FaceRegion {
    let clamp_x = |v: f32| v.max(0.0).min(width as f32) as u32;
    let clamp_y = |v: f32| v.max(0.0).min(height as f32) as u32;
    FaceRegion {
        top: clamp_y(bb.top * height as f32),
        right: clamp_x((bb.left + bb.width) * width as f32),
        bottom: clamp_y((bb.top + bb.height) * height as f32),
        left: clamp_x(bb.left * width as f32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_response_parsing() {
        let json = r#"{
            "faces": [
                {
                    "bounding_box": {"top": 0.1, "left": 0.2, "width": 0.25, "height": 0.5},
                    "confidence": 99.3
                }
            ]
        }"#;
        let response: DetectResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.faces.len(), 1);
        assert!((response.faces[0].confidence - 99.3).abs() < 1e-4);
    }

    #[test]
    fn test_detect_response_missing_faces_field() {
        let response: DetectResponse = serde_json::from_str("{}").unwrap();
        assert!(response.faces.is_empty());
    }

    #[test]
    fn test_compare_response_parsing() {
        let json = r#"{"matches": [{"similarity": 91.5}, {"similarity": 73.0}]}"#;
        let response: CompareResponse = serde_json::from_str(json).unwrap();
        let best = response
            .matches
            .iter()
            .map(|m| m.similarity)
            .fold(0.0, f32::max);
        assert!((best - 91.5).abs() < 1e-4);
    }

    #[test]
    fn test_to_region_maps_relative_box() {
        let bb = RemoteBoundingBox { top: 0.1, left: 0.2, width: 0.25, height: 0.5 };
        let region = to_region(&bb, 640, 480);
        assert_eq!(region, FaceRegion { top: 48, right: 288, bottom: 288, left: 128 });
    }

    #[test]
    fn test_to_region_clamps_out_of_range_box() {
        let bb = RemoteBoundingBox { top: -0.1, left: 0.9, width: 0.5, height: 1.5 };
        let region = to_region(&bb, 100, 100);
        assert_eq!(region.top, 0);
        assert_eq!(region.right, 100);
        assert_eq!(region.bottom, 100);
    }

    #[test]
    fn test_detect_request_omits_empty_region() {
        let request = DetectRequest { image: "abcd", region: None };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"image":"abcd"}"#);
    }
}
