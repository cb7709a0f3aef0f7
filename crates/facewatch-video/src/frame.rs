//! Frame type and pixel plumbing — YUYV conversion and downscaling.

use image::imageops::{self, FilterType};
use image::RgbImage;

/// A captured color camera frame.
#[derive(Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub sequence: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid YUYV length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Convert packed YUYV (4:2:2) to RGB.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share
/// the chroma pair. Uses BT.601 integer coefficients.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut image = RgbImage::new(width, height);
    for (pair_idx, chunk) in yuyv[..expected].chunks_exact(4).enumerate() {
        let [y0, u, y1, v] = [chunk[0], chunk[1], chunk[2], chunk[3]];
        let x = (pair_idx as u32 * 2) % width;
        let y = (pair_idx as u32 * 2) / width;
        image.put_pixel(x, y, image::Rgb(yuv_to_rgb(y0, u, v)));
        image.put_pixel(x + 1, y, image::Rgb(yuv_to_rgb(y1, u, v)));
    }
    Ok(image)
}

/// BT.601 YUV to RGB for one pixel.
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |value: i32| ((value + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e),
        clamp(298 * c - 100 * d - 208 * e),
        clamp(298 * c + 516 * d),
    ]
}

/// Produce a reduced-resolution copy by linear `factor` (0 < factor <= 1).
///
/// Detection runs on this copy for throughput; regions come back in the
/// copy's pixel space and are scaled up by `1 / factor` afterwards.
pub fn downscale(image: &RgbImage, factor: f32) -> RgbImage {
    let new_w = ((image.width() as f32 * factor).round() as u32).max(1);
    let new_h = ((image.height() as f32 * factor).round() as u32).max(1);
    imageops::resize(image, new_w, new_h, FilterType::Triangle)
}
