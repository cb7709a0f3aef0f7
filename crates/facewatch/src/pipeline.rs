//! The recognition loop: capture, detect, match, annotate, persist.
//!
//! Detection is expensive, so it runs on a cadence over a downsampled copy
//! of the frame; every frame in between is annotated from the cached
//! results. Faces nobody recognizes go to the new-face logger, and a
//! successful log triggers a (rate-limited) gallery refresh so a face
//! promoted to the gallery is picked up without a restart.

use crate::gallery::Gallery;
use crate::logger::{LogOutcome, NewFaceLogger};
use facewatch_core::{DescriptorBackend, MatchResult, Matcher, ProbeImage};
use facewatch_video::annotate::annotate;
use facewatch_video::display::{DisplayControl, DisplayError, DisplaySink};
use facewatch_video::frame::{self, Frame};
use facewatch_video::FrameSource;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Display(#[from] DisplayError),
}

/// Which frames get the full detect-and-match treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Process every n-th frame (the n-th, 2n-th, ...). Zero never
    /// processes.
    EveryNth(u32),
    /// Process every other frame, starting with the first.
    Alternating,
}

/// The capture/detect/match/annotate/persist loop.
pub struct Pipeline {
    backend: Box<dyn DescriptorBackend>,
    matcher: Box<dyn Matcher>,
    gallery: Gallery,
    logger: NewFaceLogger,
    cadence: Cadence,
    downscale_factor: f32,
    cached: Vec<MatchResult>,
    frame_count: u64,
    process_next: bool,
}

impl Pipeline {
    pub fn new(
        backend: Box<dyn DescriptorBackend>,
        matcher: Box<dyn Matcher>,
        gallery: Gallery,
        logger: NewFaceLogger,
        cadence: Cadence,
        downscale_factor: f32,
    ) -> Pipeline {
        Pipeline {
            backend,
            matcher,
            gallery,
            logger,
            cadence,
            downscale_factor,
            cached: Vec::new(),
            frame_count: 0,
            process_next: true,
        }
    }

    /// Drive the loop until the display asks to stop.
    ///
    /// A failed capture is logged and skipped; the loop only ends on the
    /// operator's stop signal or a display failure.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        display: &mut dyn DisplaySink,
    ) -> Result<(), PipelineError> {
        loop {
            let mut frame = match source.next_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::warn!(error = %err, "frame capture failed; skipping");
                    continue;
                }
            };

            self.step(&mut frame);

            if display.show(&frame)? == DisplayControl::Stop {
                tracing::info!("stop requested");
                return Ok(());
            }
        }
    }

    /// Process one frame in place: run detection if the cadence says so,
    /// then annotate from the cached results either way.
    pub fn step(&mut self, frame: &mut Frame) {
        if self.should_process() {
            self.process(&frame.image);
        }
        annotate(&mut frame.image, &self.cached);
    }

    fn should_process(&mut self) -> bool {
        match self.cadence {
            Cadence::EveryNth(n) => {
                self.frame_count += 1;
                n != 0 && self.frame_count % n as u64 == 0
            }
            Cadence::Alternating => {
                let process = self.process_next;
                self.process_next = !process;
                process
            }
        }
    }

    fn process(&mut self, image: &RgbImage) {
        let probe = ProbeImage::new(frame::downscale(image, self.downscale_factor));

        let faces = match self.backend.detect(&probe) {
            Ok(faces) => faces,
            Err(err) => {
                // Stale boxes are worse than none.
                tracing::warn!(error = %err, "detection failed; clearing overlay");
                self.cached.clear();
                return;
            }
        };

        let upscale = 1.0 / self.downscale_factor;
        let (width, height) = image.dimensions();
        let mut results = Vec::with_capacity(faces.len());

        for face in &faces {
            let outcome =
                self.matcher
                    .match_probe(self.backend.as_mut(), face, &probe, self.gallery.faces());

            let mut result = outcome.result;
            result.region = result.region.scaled(upscale).clamped(width, height);
            tracing::debug!(
                label = result.label.as_deref().unwrap_or("unknown"),
                confidence = result.confidence,
                "face matched"
            );

            if outcome.log_candidate {
                self.persist_new_face(image, &result);
            }
            results.push(result);
        }

        self.cached = results;
    }

    /// Hand an unrecognized face to the logger; a successful write makes
    /// the gallery eligible for a refresh so newly promoted faces are
    /// picked up.
    fn persist_new_face(&mut self, image: &RgbImage, result: &MatchResult) {
        let region = result.region;
        let crop = if region.width() > 0 && region.height() > 0 {
            image::imageops::crop_imm(image, region.left, region.top, region.width(), region.height())
                .to_image()
        } else {
            // Degenerate region after clamping: keep the whole frame rather
            // than lose the observation.
            image.clone()
        };

        if let LogOutcome::Logged(_) = self.logger.log(&crop) {
            match self.gallery.refresh(self.backend.as_mut()) {
                Ok(true) => {}
                Ok(false) => tracing::debug!("gallery refresh still inside interval"),
                Err(err) => tracing::warn!(error = %err, "gallery refresh failed; keeping current gallery"),
            }
        }
    }
}
