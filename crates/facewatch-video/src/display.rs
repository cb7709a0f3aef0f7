//! Display sink — a minifb window showing annotated frames.

use crate::frame::Frame;
use minifb::{Key, Window, WindowOptions};
use thiserror::Error;

const TARGET_FPS: usize = 30;

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("window error: {0}")]
    Window(#[from] minifb::Error),
}

/// Whether the loop should keep running after a frame was shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayControl {
    Continue,
    Stop,
}

/// Receives annotated frames and surfaces the operator's stop signal.
pub trait DisplaySink {
    fn show(&mut self, frame: &Frame) -> Result<DisplayControl, DisplayError>;
}

/// On-screen preview window. Closing it or pressing `q`/`Escape` stops
/// the pipeline.
pub struct VideoWindow {
    window: Window,
    buffer: Vec<u32>,
}

impl VideoWindow {
    pub fn open(title: &str, width: u32, height: u32) -> Result<Self, DisplayError> {
        let mut window = Window::new(
            title,
            width as usize,
            height as usize,
            WindowOptions::default(),
        )?;
        window.set_target_fps(TARGET_FPS);
        Ok(Self {
            window,
            buffer: Vec::new(),
        })
    }
}

impl DisplaySink for VideoWindow {
    fn show(&mut self, frame: &Frame) -> Result<DisplayControl, DisplayError> {
        if !self.window.is_open()
            || self.window.is_key_down(Key::Q)
            || self.window.is_key_down(Key::Escape)
        {
            return Ok(DisplayControl::Stop);
        }

        let (width, height) = frame.image.dimensions();
        self.buffer.clear();
        self.buffer.extend(frame.image.pixels().map(|p| {
            let [r, g, b] = p.0;
            ((r as u32) << 16) | ((g as u32) << 8) | b as u32
        }));

        self.window
            .update_with_buffer(&self.buffer, width as usize, height as usize)?;

        Ok(DisplayControl::Continue)
    }
}
