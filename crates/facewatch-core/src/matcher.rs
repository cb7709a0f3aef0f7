//! Gallery matching strategies.
//!
//! Two interchangeable algorithms: [`EmbeddingMatcher`] ranks gallery
//! entries by Euclidean distance and derives a confidence percentage from
//! the distance; [`RemoteMatcher`] asks the backend for a pairwise
//! similarity against each gallery reference image and accepts the first
//! one over threshold.

use crate::backend::{DescriptorBackend, ProbeImage};
use crate::types::{Descriptor, KnownFace, MatchResult, ProbeFace, ProbeSignal};

/// Map an embedding distance to a confidence percentage.
///
/// Linear rescaling against `match_threshold` above the threshold; at or
/// below it, a nonlinear boost that rises steeply towards zero distance.
/// The two pieces meet at 50% exactly at the threshold.
pub fn face_confidence(distance: f32, match_threshold: f32) -> f32 {
    let range = 1.0 - match_threshold;
    let linear = (1.0 - distance) / (range * 2.0);

    if distance > match_threshold {
        linear * 100.0
    } else {
        (linear + (1.0 - linear) * ((linear - 0.5) * 2.0).powf(0.2)) * 100.0
    }
}

/// A match decision plus whether the probe should be handed to the
/// new-face logger.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub result: MatchResult,
    pub log_candidate: bool,
}

impl MatchOutcome {
    fn unmatched(result: MatchResult, log_candidate: bool) -> MatchOutcome {
        MatchOutcome {
            result,
            log_candidate,
        }
    }
}

/// Strategy for resolving one probe face against the gallery.
pub trait Matcher {
    fn match_probe(
        &self,
        backend: &mut dyn DescriptorBackend,
        probe: &ProbeFace,
        probe_image: &ProbeImage,
        gallery: &[KnownFace],
    ) -> MatchOutcome;
}

/// Minimum-Euclidean-distance matching over locally extracted embeddings.
///
/// A probe is accepted when the backend's same-person decision agrees
/// (distance at or below `match_threshold`) or the distance is below the
/// stricter `distance_threshold`. Unmatched probes are always logging
/// candidates.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddingMatcher {
    pub distance_threshold: f32,
    pub match_threshold: f32,
}

impl Default for EmbeddingMatcher {
    fn default() -> Self {
        EmbeddingMatcher {
            distance_threshold: 0.5,
            match_threshold: 0.6,
        }
    }
}

impl Matcher for EmbeddingMatcher {
    fn match_probe(
        &self,
        _backend: &mut dyn DescriptorBackend,
        probe: &ProbeFace,
        _probe_image: &ProbeImage,
        gallery: &[KnownFace],
    ) -> MatchOutcome {
        let ProbeSignal::Embedding(probe_embedding) = &probe.signal else {
            tracing::warn!("probe carries no embedding; backend/matcher strategies are mismatched");
            return MatchOutcome::unmatched(MatchResult::unknown(probe.region), false);
        };

        // First minimum wins: strict comparison never replaces an earlier tie.
        let mut best: Option<(f32, &str)> = None;
        for face in gallery {
            let Descriptor::Embedding(reference) = &face.descriptor else {
                continue;
            };
            let distance = probe_embedding.euclidean_distance(reference);
            if best.map_or(true, |(d, _)| distance < d) {
                best = Some((distance, face.label.as_str()));
            }
        }

        match best {
            Some((distance, label))
                if distance <= self.match_threshold || distance < self.distance_threshold =>
            {
                MatchOutcome {
                    result: MatchResult {
                        region: probe.region,
                        label: Some(label.to_string()),
                        confidence: Some(face_confidence(distance, self.match_threshold)),
                    },
                    log_candidate: false,
                }
            }
            _ => MatchOutcome::unmatched(MatchResult::unknown(probe.region), true),
        }
    }
}

/// Pairwise-comparison matching through the backend's `compare_one`.
///
/// Gallery entries are tried in order; the first reference whose similarity
/// reaches `similarity_threshold` establishes identity. The detector's own
/// per-face confidence is reported either way but never establishes
/// identity by itself; it only gates whether an unmatched face is logged.
#[derive(Debug, Clone, Copy)]
pub struct RemoteMatcher {
    pub similarity_threshold: f32,
    pub min_confidence_to_log: f32,
}

impl Default for RemoteMatcher {
    fn default() -> Self {
        RemoteMatcher {
            similarity_threshold: 70.0,
            min_confidence_to_log: 80.0,
        }
    }
}

impl Matcher for RemoteMatcher {
    fn match_probe(
        &self,
        backend: &mut dyn DescriptorBackend,
        probe: &ProbeFace,
        probe_image: &ProbeImage,
        gallery: &[KnownFace],
    ) -> MatchOutcome {
        let ProbeSignal::DetectorConfidence(confidence) = probe.signal else {
            tracing::warn!(
                "probe carries no detector confidence; backend/matcher strategies are mismatched"
            );
            return MatchOutcome::unmatched(MatchResult::unknown(probe.region), false);
        };

        for face in gallery {
            let Descriptor::Reference(reference) = &face.descriptor else {
                continue;
            };
            match backend.compare_one(reference, probe_image) {
                Ok(similarity) if similarity >= self.similarity_threshold => {
                    return MatchOutcome {
                        result: MatchResult {
                            region: probe.region,
                            label: Some(face.label.clone()),
                            confidence: Some(confidence),
                        },
                        log_candidate: false,
                    };
                }
                Ok(_) => {}
                // A failed comparison against one reference is no match for
                // that entry, not a pipeline failure.
                Err(err) => {
                    tracing::warn!(
                        label = %face.label,
                        error = %err,
                        "pairwise comparison failed; skipping gallery entry"
                    );
                }
            }
        }

        MatchOutcome::unmatched(
            MatchResult {
                region: probe.region,
                label: None,
                confidence: Some(confidence),
            },
            confidence >= self.min_confidence_to_log,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::types::{Embedding, FaceRegion};
    use image::RgbImage;

    fn region() -> FaceRegion {
        FaceRegion { top: 0, right: 10, bottom: 10, left: 0 }
    }

    fn probe_image() -> ProbeImage {
        ProbeImage::new(RgbImage::new(4, 4))
    }

    fn known(label: &str, values: Vec<f32>) -> KnownFace {
        KnownFace {
            label: label.into(),
            descriptor: Descriptor::Embedding(Embedding { values }),
        }
    }

    /// Backend stub that answers `compare_one` from a scripted list.
    struct ScriptedBackend {
        similarities: Vec<Result<f32, ()>>,
        calls: usize,
    }

    impl ScriptedBackend {
        fn new(similarities: Vec<Result<f32, ()>>) -> Self {
            ScriptedBackend { similarities, calls: 0 }
        }
    }

    impl DescriptorBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn enroll(&mut self, _image_bytes: &[u8]) -> Result<Option<Descriptor>, BackendError> {
            Ok(None)
        }

        fn detect(&mut self, _probe: &ProbeImage) -> Result<Vec<ProbeFace>, BackendError> {
            Ok(Vec::new())
        }

        fn compare_one(
            &mut self,
            _reference: &[u8],
            _probe: &ProbeImage,
        ) -> Result<f32, BackendError> {
            let idx = self.calls;
            self.calls += 1;
            match self.similarities.get(idx) {
                Some(Ok(sim)) => Ok(*sim),
                Some(Err(())) => Err(BackendError::Response("scripted failure".into())),
                None => Ok(0.0),
            }
        }
    }

    fn reference_face(label: &str) -> KnownFace {
        KnownFace {
            label: label.into(),
            descriptor: Descriptor::Reference(vec![0u8; 4]),
        }
    }

    #[test]
    fn test_confidence_continuous_at_threshold() {
        let threshold = 0.6;
        // Both pieces meet at 50% exactly on the breakpoint.
        assert!((face_confidence(threshold, threshold) - 50.0).abs() < 1e-3);
        // The boost piece has a fifth-root shape, so the gap across the
        // breakpoint closes slowly but monotonically as epsilon shrinks.
        let gap = |eps: f32| {
            (face_confidence(threshold - eps, threshold)
                - face_confidence(threshold + eps, threshold))
            .abs()
        };
        assert!(gap(1e-6) < gap(1e-3));
        assert!(gap(1e-6) < 5.0, "gap at 1e-6: {}", gap(1e-6));
    }

    #[test]
    fn test_confidence_rises_towards_zero_distance() {
        let c_zero = face_confidence(0.0, 0.6);
        let c_mid = face_confidence(0.3, 0.6);
        let c_far = face_confidence(0.9, 0.6);
        assert!(c_zero > c_mid);
        assert!(c_mid > c_far);
        // Known curve value at zero distance.
        assert!((c_zero - 97.89).abs() < 0.1, "got {c_zero}");
    }

    #[test]
    fn test_embedding_matcher_accepts_close_probe() {
        let matcher = EmbeddingMatcher::default();
        let gallery = vec![
            known("alice.jpg", vec![1.0, 0.0, 0.0]),
            known("bob.png", vec![0.0, 1.0, 0.0]),
        ];
        let probe = ProbeFace {
            region: region(),
            signal: ProbeSignal::Embedding(Embedding { values: vec![0.9, 0.05, 0.0] }),
        };
        let mut backend = ScriptedBackend::new(vec![]);

        let outcome = matcher.match_probe(&mut backend, &probe, &probe_image(), &gallery);
        assert_eq!(outcome.result.label.as_deref(), Some("alice.jpg"));
        assert!(outcome.result.confidence.unwrap() > 50.0);
        assert!(!outcome.log_candidate);
    }

    #[test]
    fn test_embedding_matcher_rejects_distant_probe() {
        let matcher = EmbeddingMatcher::default();
        let gallery = vec![known("alice.jpg", vec![1.0, 0.0, 0.0])];
        let probe = ProbeFace {
            region: region(),
            signal: ProbeSignal::Embedding(Embedding { values: vec![-1.0, 0.0, 0.0] }),
        };
        let mut backend = ScriptedBackend::new(vec![]);

        let outcome = matcher.match_probe(&mut backend, &probe, &probe_image(), &gallery);
        assert!(outcome.result.label.is_none());
        assert!(outcome.result.confidence.is_none());
        assert!(outcome.log_candidate);
    }

    #[test]
    fn test_embedding_matcher_empty_gallery_is_unknown_and_logged() {
        let matcher = EmbeddingMatcher::default();
        let probe = ProbeFace {
            region: region(),
            signal: ProbeSignal::Embedding(Embedding { values: vec![1.0] }),
        };
        let mut backend = ScriptedBackend::new(vec![]);

        let outcome = matcher.match_probe(&mut backend, &probe, &probe_image(), &[]);
        assert!(outcome.result.label.is_none());
        assert!(outcome.log_candidate);
    }

    #[test]
    fn test_embedding_matcher_first_minimum_wins() {
        let matcher = EmbeddingMatcher::default();
        // Identical reference embeddings: the first entry must be reported.
        let gallery = vec![
            known("first.jpg", vec![1.0, 0.0]),
            known("second.jpg", vec![1.0, 0.0]),
        ];
        let probe = ProbeFace {
            region: region(),
            signal: ProbeSignal::Embedding(Embedding { values: vec![1.0, 0.0] }),
        };
        let mut backend = ScriptedBackend::new(vec![]);

        let outcome = matcher.match_probe(&mut backend, &probe, &probe_image(), &gallery);
        assert_eq!(outcome.result.label.as_deref(), Some("first.jpg"));
    }

    #[test]
    fn test_remote_matcher_first_over_threshold_wins() {
        let matcher = RemoteMatcher::default();
        let gallery = vec![
            reference_face("a.jpg"),
            reference_face("b.jpg"),
            reference_face("c.jpg"),
        ];
        let probe = ProbeFace {
            region: region(),
            signal: ProbeSignal::DetectorConfidence(99.0),
        };
        let mut backend = ScriptedBackend::new(vec![Ok(10.0), Ok(85.0), Ok(95.0)]);

        let outcome = matcher.match_probe(&mut backend, &probe, &probe_image(), &gallery);
        assert_eq!(outcome.result.label.as_deref(), Some("b.jpg"));
        assert_eq!(outcome.result.confidence, Some(99.0));
        // c.jpg must never have been compared.
        assert_eq!(backend.calls, 2);
    }

    #[test]
    fn test_remote_matcher_detector_confidence_does_not_establish_identity() {
        let matcher = RemoteMatcher::default();
        let gallery = vec![reference_face("a.jpg")];
        let probe = ProbeFace {
            region: region(),
            signal: ProbeSignal::DetectorConfidence(99.9),
        };
        let mut backend = ScriptedBackend::new(vec![Ok(20.0)]);

        let outcome = matcher.match_probe(&mut backend, &probe, &probe_image(), &gallery);
        assert!(outcome.result.label.is_none());
        assert_eq!(outcome.result.confidence, Some(99.9));
        assert!(outcome.log_candidate);
    }

    #[test]
    fn test_remote_matcher_log_gated_by_confidence() {
        let matcher = RemoteMatcher::default();
        let probe = ProbeFace {
            region: region(),
            signal: ProbeSignal::DetectorConfidence(50.0),
        };
        let mut backend = ScriptedBackend::new(vec![]);

        let outcome = matcher.match_probe(&mut backend, &probe, &probe_image(), &[]);
        assert!(outcome.result.label.is_none());
        assert!(!outcome.log_candidate, "below min_confidence_to_log");
    }

    #[test]
    fn test_remote_matcher_survives_comparison_failure() {
        let matcher = RemoteMatcher::default();
        let gallery = vec![reference_face("a.jpg"), reference_face("b.jpg")];
        let probe = ProbeFace {
            region: region(),
            signal: ProbeSignal::DetectorConfidence(90.0),
        };
        let mut backend = ScriptedBackend::new(vec![Err(()), Ok(80.0)]);

        let outcome = matcher.match_probe(&mut backend, &probe, &probe_image(), &gallery);
        assert_eq!(outcome.result.label.as_deref(), Some("b.jpg"));
    }
}
