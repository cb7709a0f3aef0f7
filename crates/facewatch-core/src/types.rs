use serde::{Deserialize, Serialize};

/// Pixel-space bounding box for a detected face.
///
/// Coordinates are relative to the image the detection ran on; if that was
/// a downsampled copy of the display frame, the region must be rescaled
/// with [`scaled`](Self::scaled) before drawing or cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl FaceRegion {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Scale every edge by `factor`, rounding to the nearest pixel.
    ///
    /// Detection on a frame downsampled by `f` is mapped back to the full
    /// frame by scaling with `1.0 / f`.
    pub fn scaled(&self, factor: f32) -> FaceRegion {
        let scale = |v: u32| (v as f32 * factor).round().max(0.0) as u32;
        FaceRegion {
            top: scale(self.top),
            right: scale(self.right),
            bottom: scale(self.bottom),
            left: scale(self.left),
        }
    }

    /// Clamp the region to `width` x `height` image bounds.
    pub fn clamped(&self, width: u32, height: u32) -> FaceRegion {
        FaceRegion {
            top: self.top.min(height),
            right: self.right.min(width),
            bottom: self.bottom.min(height),
            left: self.left.min(width),
        }
    }
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// Compute Euclidean distance to another embedding. Lower = more similar.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// Reference material held for one gallery identity.
///
/// The local backend stores an embedding; the remote backend keeps the raw
/// reference image bytes and compares pairwise over the wire.
#[derive(Debug, Clone)]
pub enum Descriptor {
    Embedding(Embedding),
    Reference(Vec<u8>),
}

/// One enrolled identity. The label is the source filename, verbatim;
/// duplicate labels simply produce duplicate entries.
#[derive(Debug, Clone)]
pub struct KnownFace {
    pub label: String,
    pub descriptor: Descriptor,
}

/// Per-face matching signal produced by a backend's `detect`.
#[derive(Debug, Clone)]
pub enum ProbeSignal {
    /// Embedding extracted locally; matched by distance against the gallery.
    Embedding(Embedding),
    /// The remote detector's own confidence (0-100) that this is a face.
    /// Identity still has to be established by pairwise comparison.
    DetectorConfidence(f32),
}

/// A face observed in a probe frame.
#[derive(Debug, Clone)]
pub struct ProbeFace {
    pub region: FaceRegion,
    pub signal: ProbeSignal,
}

/// Result of matching one probe face against the gallery.
///
/// `label`/`confidence` of `None` mean "unknown". Confidence is a derived
/// percentage, not a probability, and is computed differently per strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub region: FaceRegion,
    pub label: Option<String>,
    pub confidence: Option<f32>,
}

impl MatchResult {
    pub fn unknown(region: FaceRegion) -> MatchResult {
        MatchResult {
            region,
            label: None,
            confidence: None,
        }
    }

    pub fn is_match(&self) -> bool {
        self.label.is_some()
    }

    /// Overlay caption, e.g. `alice.jpg (97.89%)` or `Unknown (Unknown)`.
    pub fn caption(&self) -> String {
        let label = self.label.as_deref().unwrap_or("Unknown");
        match self.confidence {
            Some(pct) => format!("{label} ({pct:.2}%)"),
            None => format!("{label} (Unknown)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_distance_identical() {
        let a = Embedding { values: vec![1.0, 2.0, 3.0] };
        assert!(a.euclidean_distance(&a) < 1e-6);
    }

    #[test]
    fn test_euclidean_distance_known() {
        let a = Embedding { values: vec![0.0, 0.0] };
        let b = Embedding { values: vec![3.0, 4.0] };
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_region_scaled_inverts_downsample() {
        // Detected on a 25% copy, mapped back by 4x.
        let detected = FaceRegion { top: 10, right: 50, bottom: 40, left: 20 };
        let full = detected.scaled(4.0);
        assert_eq!(full, FaceRegion { top: 40, right: 200, bottom: 160, left: 80 });
    }

    #[test]
    fn test_region_clamped() {
        let r = FaceRegion { top: 10, right: 900, bottom: 700, left: 5 };
        let c = r.clamped(640, 480);
        assert_eq!(c, FaceRegion { top: 10, right: 640, bottom: 480, left: 5 });
    }

    #[test]
    fn test_region_dimensions() {
        let r = FaceRegion { top: 10, right: 110, bottom: 60, left: 30 };
        assert_eq!(r.width(), 80);
        assert_eq!(r.height(), 50);
    }

    #[test]
    fn test_caption_formats() {
        let region = FaceRegion { top: 0, right: 1, bottom: 1, left: 0 };
        let matched = MatchResult {
            region,
            label: Some("alice.jpg".into()),
            confidence: Some(97.887),
        };
        assert_eq!(matched.caption(), "alice.jpg (97.89%)");

        let unknown = MatchResult::unknown(region);
        assert_eq!(unknown.caption(), "Unknown (Unknown)");
        assert!(!unknown.is_match());
    }
}
