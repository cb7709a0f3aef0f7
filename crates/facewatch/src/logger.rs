//! Persistence of unrecognized faces, rate-limited.
//!
//! Writes a crop of each unknown face to the new-faces directory, at most
//! once per interval. A write failure is logged and swallowed; the
//! recognition loop never stops because the disk did.

use image::RgbImage;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// What happened to one logging attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum LogOutcome {
    /// The crop was written to this path.
    Logged(PathBuf),
    /// Inside the rate-limit window; nothing written.
    RateLimited,
    /// The write was attempted and failed.
    Failed,
}

/// Rate-limited writer for unknown-face crops.
pub struct NewFaceLogger {
    dir: PathBuf,
    interval: Duration,
    last_logged: Option<Instant>,
}

impl NewFaceLogger {
    pub fn new(dir: PathBuf, interval: Duration) -> Self {
        NewFaceLogger {
            dir,
            interval,
            last_logged: None,
        }
    }

    /// Write `face` as `new_face_{n}.jpg` unless the rate limit applies.
    ///
    /// The rate-limit clock only advances on a successful write, so a
    /// failed attempt is retried on the next unknown face.
    pub fn log(&mut self, face: &RgbImage) -> LogOutcome {
        if let Some(last) = self.last_logged {
            if last.elapsed() < self.interval {
                return LogOutcome::RateLimited;
            }
        }

        match self.write_crop(face) {
            Ok(path) => {
                self.last_logged = Some(Instant::now());
                tracing::info!(path = %path.display(), "logged new face");
                LogOutcome::Logged(path)
            }
            Err(err) => {
                tracing::warn!(dir = %self.dir.display(), error = %err, "failed to log new face");
                LogOutcome::Failed
            }
        }
    }

    fn write_crop(&self, face: &RgbImage) -> Result<PathBuf, image::ImageError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("new_face_{}.jpg", next_index(&self.dir)?));
        face.save(&path)?;
        Ok(path)
    }
}

/// One past the number of existing entries, mirroring a simple
/// count-based naming scheme. Collisions with manually deleted files are
/// acceptable; the directory is an audit trail, not a database.
fn next_index(dir: &Path) -> std::io::Result<usize> {
    Ok(std::fs::read_dir(dir)?.count() + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face() -> RgbImage {
        RgbImage::from_pixel(32, 32, image::Rgb([120, 90, 60]))
    }

    #[test]
    fn test_log_writes_sequentially_named_crops() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = NewFaceLogger::new(dir.path().to_path_buf(), Duration::ZERO);

        let first = logger.log(&face());
        let second = logger.log(&face());

        assert_eq!(first, LogOutcome::Logged(dir.path().join("new_face_1.jpg")));
        assert_eq!(second, LogOutcome::Logged(dir.path().join("new_face_2.jpg")));
        assert!(dir.path().join("new_face_1.jpg").exists());
        assert!(dir.path().join("new_face_2.jpg").exists());
    }

    #[test]
    fn test_log_creates_directory_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("captures").join("new");
        let mut logger = NewFaceLogger::new(nested.clone(), Duration::ZERO);

        assert!(matches!(logger.log(&face()), LogOutcome::Logged(_)));
        assert!(nested.join("new_face_1.jpg").exists());
    }

    #[test]
    fn test_log_rate_limits_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = NewFaceLogger::new(dir.path().to_path_buf(), Duration::from_secs(60));

        assert!(matches!(logger.log(&face()), LogOutcome::Logged(_)));
        assert_eq!(logger.log(&face()), LogOutcome::RateLimited);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_log_counts_existing_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("new_face_1.jpg"), b"existing").unwrap();

        let mut logger = NewFaceLogger::new(dir.path().to_path_buf(), Duration::ZERO);
        assert_eq!(
            logger.log(&face()),
            LogOutcome::Logged(dir.path().join("new_face_2.jpg"))
        );
    }

    #[test]
    fn test_failed_write_does_not_start_rate_limit() {
        let mut logger = NewFaceLogger::new(
            PathBuf::from("/proc/nonexistent/new_faces"),
            Duration::from_secs(60),
        );

        assert_eq!(logger.log(&face()), LogOutcome::Failed);
        // The next attempt is not rate-limited; it fails again instead.
        assert_eq!(logger.log(&face()), LogOutcome::Failed);
    }
}
