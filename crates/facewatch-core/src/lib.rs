//! facewatch-core — Face recognition engine.
//!
//! Detection and description run behind the [`DescriptorBackend`] trait,
//! with a local ONNX strategy (SCRFD + ArcFace) and a remote HTTP API
//! strategy. Matching against the known-face gallery is a second strategy
//! seam, [`Matcher`], so each backend pairs with its natural algorithm.

pub mod backend;
pub mod detector;
pub mod embedder;
pub mod local;
pub mod matcher;
pub mod remote;
pub mod types;

pub use backend::{BackendError, DescriptorBackend, ProbeImage};
pub use local::LocalBackend;
pub use matcher::{EmbeddingMatcher, MatchOutcome, Matcher, RemoteMatcher};
pub use remote::{RemoteBackend, RemoteConfig};
pub use types::{Descriptor, Embedding, FaceRegion, KnownFace, MatchResult, ProbeFace, ProbeSignal};
