use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, loaded from `FACEWATCH_*` environment variables
/// and overridable per-flag on the command line.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Directory of labeled reference images.
    pub known_faces_dir: PathBuf,
    /// Directory unrecognized face crops are written to.
    pub new_faces_dir: PathBuf,
    /// Remote face API base URL; required for the remote backend.
    pub endpoint: Option<String>,
    /// API key sent with each remote request.
    pub api_key: Option<String>,
    /// Deployment region selector for the remote API.
    pub remote_region: Option<String>,
    /// Minimum seconds between two new-face writes.
    pub log_interval_secs: u64,
    /// Minimum seconds between two gallery reloads.
    pub refresh_interval_secs: u64,
    /// Run detection on every n-th frame.
    pub process_interval: u32,
    /// Linear downscale factor applied before detection.
    pub downscale_factor: f32,
    /// Strict embedding-distance acceptance threshold.
    pub distance_threshold: f32,
    /// Embedding same-person decision threshold.
    pub match_threshold: f32,
    /// Remote pairwise similarity (0-100) needed for a match.
    pub similarity_threshold: f32,
    /// Remote detector confidence (0-100) below which unknowns are not logged.
    pub min_confidence_to_log: f32,
    /// Number of warmup frames to discard at startup (camera AGC/AE stabilization).
    pub warmup_frames: usize,
}

impl Config {
    /// Load configuration from `FACEWATCH_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("facewatch");

        let model_dir = std::env::var("FACEWATCH_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("models"));

        Self {
            camera_device: std::env::var("FACEWATCH_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_dir,
            known_faces_dir: std::env::var("FACEWATCH_KNOWN_FACES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("known_faces")),
            new_faces_dir: std::env::var("FACEWATCH_NEW_FACES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("new_faces")),
            endpoint: std::env::var("FACEWATCH_ENDPOINT").ok(),
            api_key: std::env::var("FACEWATCH_API_KEY").ok(),
            remote_region: std::env::var("FACEWATCH_REGION").ok(),
            log_interval_secs: env_u64("FACEWATCH_LOG_INTERVAL_SECS", 10),
            refresh_interval_secs: env_u64("FACEWATCH_REFRESH_INTERVAL_SECS", 300),
            process_interval: env_u32("FACEWATCH_PROCESS_INTERVAL", 5),
            downscale_factor: env_f32("FACEWATCH_DOWNSCALE_FACTOR", 0.25),
            distance_threshold: env_f32("FACEWATCH_DISTANCE_THRESHOLD", 0.5),
            match_threshold: env_f32("FACEWATCH_MATCH_THRESHOLD", 0.6),
            similarity_threshold: env_f32("FACEWATCH_SIMILARITY_THRESHOLD", 70.0),
            min_confidence_to_log: env_f32("FACEWATCH_MIN_CONFIDENCE_TO_LOG", 80.0),
            warmup_frames: env_usize("FACEWATCH_WARMUP_FRAMES", 0),
        }
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_secs(self.log_interval_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parsers_fall_back_on_garbage() {
        // Unset or unparseable values take the default.
        assert_eq!(env_f32("FACEWATCH_TEST_UNSET_F32", 0.25), 0.25);
        std::env::set_var("FACEWATCH_TEST_GARBAGE_U32", "not-a-number");
        assert_eq!(env_u32("FACEWATCH_TEST_GARBAGE_U32", 5), 5);
        std::env::remove_var("FACEWATCH_TEST_GARBAGE_U32");
    }
}
