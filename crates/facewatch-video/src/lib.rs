//! facewatch-video — Video plumbing for the recognition loop.
//!
//! V4L2 camera capture, YUYV conversion and downscaling, match-result
//! annotation, and the preview window.

pub mod annotate;
pub mod camera;
pub mod display;
pub mod frame;

pub use camera::{Camera, CameraError, CameraStream, FrameSource};
pub use display::{DisplayControl, DisplayError, DisplaySink, VideoWindow};
pub use frame::Frame;
