//! Known-face gallery, loaded from a directory of labeled images.
//!
//! The filename (including extension) is the identity label, verbatim.
//! A refresh rebuilds the whole gallery or leaves it untouched; there is
//! no incremental update.

use facewatch_core::{BackendError, DescriptorBackend, KnownFace};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("known-faces directory does not exist: {0}")]
    DirectoryMissing(PathBuf),
    #[error("failed to read known-faces directory {0}: {1}")]
    DirectoryUnreadable(PathBuf, std::io::Error),
}

/// Why one directory entry contributed nothing to the gallery.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("not an image file")]
    NotAnImage,
    #[error("no face found")]
    NoFaceFound,
    #[error("unreadable: {0}")]
    Unreadable(std::io::Error),
    #[error("backend failure: {0}")]
    Backend(BackendError),
}

/// Outcome summary of one gallery load.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub skipped: Vec<(String, SkipReason)>,
}

/// The in-memory set of enrolled identities, plus refresh gating state.
pub struct Gallery {
    dir: PathBuf,
    refresh_interval: Duration,
    last_refreshed: Option<Instant>,
    faces: Vec<KnownFace>,
}

impl Gallery {
    /// Scan `dir` and enroll every image in it. Fails only when the
    /// directory itself is missing or unreadable; an empty gallery is a
    /// reported condition, not an error.
    pub fn load(
        dir: PathBuf,
        refresh_interval: Duration,
        backend: &mut dyn DescriptorBackend,
    ) -> Result<(Gallery, LoadReport), GalleryError> {
        let (faces, report) = scan(&dir, backend)?;
        let gallery = Gallery {
            dir,
            refresh_interval,
            // The first refresh attempt is always eligible.
            last_refreshed: None,
            faces,
        };
        Ok((gallery, report))
    }

    pub fn faces(&self) -> &[KnownFace] {
        &self.faces
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Reload the gallery if the refresh interval has elapsed; otherwise a
    /// no-op. Returns whether a reload happened. On error the previous
    /// contents are left untouched.
    pub fn refresh(&mut self, backend: &mut dyn DescriptorBackend) -> Result<bool, GalleryError> {
        if let Some(last) = self.last_refreshed {
            if last.elapsed() < self.refresh_interval {
                return Ok(false);
            }
        }

        let (faces, report) = scan(&self.dir, backend)?;
        tracing::info!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            "gallery refreshed"
        );
        self.faces = faces;
        self.last_refreshed = Some(Instant::now());
        Ok(true)
    }
}

/// One pass over the directory. Per-file problems are folded into the
/// report, never propagated.
fn scan(
    dir: &Path,
    backend: &mut dyn DescriptorBackend,
) -> Result<(Vec<KnownFace>, LoadReport), GalleryError> {
    if !dir.exists() {
        return Err(GalleryError::DirectoryMissing(dir.to_path_buf()));
    }

    let entries = std::fs::read_dir(dir)
        .map_err(|e| GalleryError::DirectoryUnreadable(dir.to_path_buf(), e))?;

    let mut names: Vec<(String, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| (entry.file_name().to_string_lossy().into_owned(), entry.path()))
        .collect();
    // Deterministic label order regardless of readdir order.
    names.sort();

    let mut faces = Vec::new();
    let mut report = LoadReport::default();

    for (name, path) in names {
        match enroll_file(&path, backend) {
            Ok(descriptor) => {
                faces.push(KnownFace {
                    label: name.clone(),
                    descriptor,
                });
                report.loaded.push(name);
            }
            Err(reason) => {
                tracing::warn!(file = %name, reason = %reason, "skipping gallery file");
                report.skipped.push((name, reason));
            }
        }
    }

    if faces.is_empty() {
        tracing::warn!(dir = %dir.display(), "no known faces loaded");
    } else {
        tracing::info!(labels = ?report.loaded, "known faces loaded");
    }

    Ok((faces, report))
}

fn enroll_file(
    path: &Path,
    backend: &mut dyn DescriptorBackend,
) -> Result<facewatch_core::Descriptor, SkipReason> {
    let is_image = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    if !is_image {
        return Err(SkipReason::NotAnImage);
    }

    let bytes = std::fs::read(path).map_err(SkipReason::Unreadable)?;
    match backend.enroll(&bytes) {
        Ok(Some(descriptor)) => Ok(descriptor),
        Ok(None) => Err(SkipReason::NoFaceFound),
        Err(err) => Err(SkipReason::Backend(err)),
    }
}
