//! Frame annotation — boxes and captions for match results.
//!
//! Draws the classic overlay: a red box around each face, a filled strip
//! along its bottom edge, and the caption text inside the strip.

use embedded_graphics::{
    mono_font::{ascii::FONT_10X20, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use facewatch_core::MatchResult;
use image::RgbImage;
use std::convert::Infallible;

const BOX_COLOR: Rgb888 = Rgb888::new(255, 0, 0);
const TEXT_COLOR: Rgb888 = Rgb888::new(255, 255, 255);
const STROKE_WIDTH: u32 = 2;
const LABEL_STRIP_HEIGHT: u32 = 35;
const LABEL_INSET: i32 = 6;

/// Draw every match result onto `image`.
///
/// Regions must already be in the image's own pixel space; anything
/// hanging off the edge is clipped, never a panic.
pub fn annotate(image: &mut RgbImage, results: &[MatchResult]) {
    let mut canvas = Canvas(image);

    for result in results {
        let region = result.region;
        if region.width() == 0 || region.height() == 0 {
            continue;
        }

        let left = region.left as i32;
        let top = region.top as i32;
        let bottom = region.bottom as i32;

        draw(
            Rectangle::new(
                Point::new(left, top),
                Size::new(region.width(), region.height()),
            )
            .into_styled(PrimitiveStyle::with_stroke(BOX_COLOR, STROKE_WIDTH)),
            &mut canvas,
        );

        draw(
            Rectangle::new(
                Point::new(left, bottom - LABEL_STRIP_HEIGHT as i32),
                Size::new(region.width(), LABEL_STRIP_HEIGHT),
            )
            .into_styled(PrimitiveStyle::with_fill(BOX_COLOR)),
            &mut canvas,
        );

        let caption = result.caption();
        let character_style = MonoTextStyle::new(&FONT_10X20, TEXT_COLOR);
        let text_style = TextStyleBuilder::new()
            .alignment(Alignment::Left)
            .baseline(Baseline::Bottom)
            .build();
        draw(
            Text::with_text_style(
                &caption,
                Point::new(left + LABEL_INSET, bottom - LABEL_INSET),
                character_style,
                text_style,
            ),
            &mut canvas,
        );
    }
}

fn draw<D: Drawable<Color = Rgb888>>(drawable: D, canvas: &mut Canvas<'_>) {
    match drawable.draw(canvas) {
        Ok(_) => {}
        Err(infallible) => match infallible {},
    }
}

/// embedded-graphics draw target over an `RgbImage`, clipping to bounds.
struct Canvas<'a>(&'a mut RgbImage);

impl OriginDimensions for Canvas<'_> {
    fn size(&self) -> Size {
        Size::new(self.0.width(), self.0.height())
    }
}

impl DrawTarget for Canvas<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0
                && (point.x as u32) < self.0.width()
                && point.y >= 0
                && (point.y as u32) < self.0.height()
            {
                self.0.put_pixel(
                    point.x as u32,
                    point.y as u32,
                    image::Rgb([color.r(), color.g(), color.b()]),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facewatch_core::FaceRegion;

    fn result(region: FaceRegion) -> MatchResult {
        MatchResult {
            region,
            label: Some("alice.jpg".into()),
            confidence: Some(95.0),
        }
    }

    #[test]
    fn test_annotate_draws_box_edge() {
        let mut image = RgbImage::new(200, 200);
        let region = FaceRegion { top: 50, right: 150, bottom: 150, left: 50 };
        annotate(&mut image, &[result(region)]);

        assert_eq!(image.get_pixel(100, 50).0, [255, 0, 0], "top edge");
        assert_eq!(image.get_pixel(50, 100).0, [255, 0, 0], "left edge");
        assert_eq!(image.get_pixel(100, 100).0, [0, 0, 0], "interior untouched");
    }

    #[test]
    fn test_annotate_fills_label_strip() {
        let mut image = RgbImage::new(200, 200);
        let region = FaceRegion { top: 50, right: 150, bottom: 150, left: 50 };
        annotate(&mut image, &[result(region)]);

        // Inside the strip but away from any glyph row start.
        assert_eq!(image.get_pixel(149, 130).0, [255, 0, 0]);
    }

    #[test]
    fn test_annotate_clips_out_of_bounds_region() {
        let mut image = RgbImage::new(100, 100);
        let region = FaceRegion { top: 0, right: 400, bottom: 400, left: 0 };
        // Must not panic; drawing is clipped.
        annotate(&mut image, &[result(region)]);
        assert_eq!(image.get_pixel(50, 0).0, [255, 0, 0]);
    }

    #[test]
    fn test_annotate_skips_degenerate_region() {
        let mut image = RgbImage::new(100, 100);
        let region = FaceRegion { top: 10, right: 20, bottom: 10, left: 20 };
        annotate(&mut image, &[result(region)]);
        assert!(image.pixels().all(|p| p.0 == [0, 0, 0]));
    }
}
