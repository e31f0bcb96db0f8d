use super::tone::CapturedStill;
use crate::config::CaptureConfig;
use crate::detect::Rectangle;
use crate::error::CaptureError;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};

/// Cuts the detected check out of a frame and places it on a fixed canvas.
///
/// The crop is scaled uniformly to fit the canvas and centered; the rest of the
/// canvas is filled with the background color. A still that already fills the
/// canvas passes through unchanged.
#[derive(Debug, Clone)]
pub struct FrameCapturer {
    canvas_width: u32,
    canvas_height: u32,
    background: Rgb<u8>,
    grayscale: bool,
}

impl FrameCapturer {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            canvas_width: config.canvas_width,
            canvas_height: config.canvas_height,
            background: Rgb(config.background),
            grayscale: config.grayscale,
        }
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.canvas_width, self.canvas_height)
    }

    pub fn capture(
        &self,
        frame: &DynamicImage,
        rect: &Rectangle,
    ) -> Result<CapturedStill, CaptureError> {
        let _span = tracing::debug_span!("capture").entered();

        let normalized = self.normalize(&frame.to_rgb8(), rect)?;
        tracing::info!(
            x = rect.x,
            y = rect.y,
            width = rect.width,
            height = rect.height,
            canvas_width = self.canvas_width,
            canvas_height = self.canvas_height,
            "captured still"
        );
        Ok(CapturedStill::new(normalized, *rect))
    }

    pub fn normalize(&self, image: &RgbImage, rect: &Rectangle) -> Result<RgbImage, CaptureError> {
        let (width, height) = image.dimensions();
        let region = rect
            .within(width, height)
            .ok_or(CaptureError::RegionOutOfBounds {
                rect: *rect,
                width,
                height,
            })?;

        let mut crop = imageops::crop_imm(image, region.x, region.y, region.width, region.height)
            .to_image();
        if self.grayscale {
            average_to_gray(&mut crop);
        }

        let (scaled_width, scaled_height) = self.fit(region.width, region.height);
        let scaled = if (scaled_width, scaled_height) == crop.dimensions() {
            crop
        } else {
            imageops::resize(&crop, scaled_width, scaled_height, FilterType::Triangle)
        };

        let mut canvas = RgbImage::from_pixel(self.canvas_width, self.canvas_height, self.background);
        let offset_x = (self.canvas_width - scaled_width) / 2;
        let offset_y = (self.canvas_height - scaled_height) / 2;
        imageops::replace(&mut canvas, &scaled, offset_x as i64, offset_y as i64);
        Ok(canvas)
    }

    /// Size of a `width` x `height` region scaled by
    /// `min(canvas_w / width, canvas_h / height)`.
    fn fit(&self, width: u32, height: u32) -> (u32, u32) {
        let scale = f64::min(
            self.canvas_width as f64 / width as f64,
            self.canvas_height as f64 / height as f64,
        );
        let scaled_width = ((width as f64 * scale).round() as u32).clamp(1, self.canvas_width);
        let scaled_height = ((height as f64 * scale).round() as u32).clamp(1, self.canvas_height);
        (scaled_width, scaled_height)
    }
}

/// Replace each pixel by the mean of its channels.
fn average_to_gray(image: &mut RgbImage) {
    for pixel in image.pixels_mut() {
        let [r, g, b] = pixel.0;
        let sum = r as u16 + g as u16 + b as u16;
        let avg = ((sum + 1) / 3) as u8;
        *pixel = Rgb([avg, avg, avg]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capturer(width: u32, height: u32, grayscale: bool) -> FrameCapturer {
        FrameCapturer::new(&CaptureConfig {
            canvas_width: width,
            canvas_height: height,
            background: [255, 255, 255],
            grayscale,
        })
    }

    fn striped_frame() -> RgbImage {
        RgbImage::from_fn(640, 480, |x, y| {
            if (50..550).contains(&x) && (100..250).contains(&y) {
                Rgb([200, (x % 256) as u8, (y % 256) as u8])
            } else {
                Rgb([10, 10, 10])
            }
        })
    }

    #[test]
    fn wide_region_fills_canvas_width_and_is_centered() {
        let rect = Rectangle::new(50, 100, 500, 150).unwrap();
        let still = capturer(1000, 500, false).normalize(&striped_frame(), &rect).unwrap();
        assert_eq!(still.dimensions(), (1000, 500));
        // scale = min(2.0, 3.33) = 2 -> 1000x300 placed at y = 100.
        assert_eq!(still.get_pixel(500, 50), &Rgb([255, 255, 255]));
        assert_eq!(still.get_pixel(500, 450), &Rgb([255, 255, 255]));
        assert_eq!(still.get_pixel(500, 250)[0], 200);
        assert_eq!(still.get_pixel(0, 100)[0], 200);
        assert_eq!(still.get_pixel(999, 399)[0], 200);
    }

    #[test]
    fn tall_region_is_pillarboxed() {
        let frame = RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]));
        let rect = Rectangle::new(10, 10, 20, 40).unwrap();
        let still = capturer(200, 100, false).normalize(&frame, &rect).unwrap();
        // scale = min(10, 2.5) = 2.5 -> 50x100 centered at x = 75.
        assert_eq!(still.get_pixel(74, 50), &Rgb([255, 255, 255]));
        assert_eq!(still.get_pixel(75, 50), &Rgb([0, 0, 0]));
        assert_eq!(still.get_pixel(124, 50), &Rgb([0, 0, 0]));
        assert_eq!(still.get_pixel(125, 50), &Rgb([255, 255, 255]));
    }

    #[test]
    fn grayscale_averages_channels() {
        let frame = RgbImage::from_pixel(40, 20, Rgb([30, 60, 90]));
        let rect = Rectangle::full(40, 20).unwrap();
        let still = capturer(40, 20, true).normalize(&frame, &rect).unwrap();
        assert!(still.pixels().all(|p| *p == Rgb([60, 60, 60])));
    }

    #[test]
    fn normalizing_a_normalized_still_is_a_no_op() {
        let rect = Rectangle::new(50, 100, 500, 150).unwrap();
        for grayscale in [false, true] {
            let capturer = capturer(1200, 500, grayscale);
            let still = capturer.normalize(&striped_frame(), &rect).unwrap();
            let full = Rectangle::full(1200, 500).unwrap();
            let again = capturer.normalize(&still, &full).unwrap();
            assert_eq!(again, still);
        }
    }

    #[test]
    fn region_outside_the_frame_is_an_error() {
        let frame = RgbImage::new(100, 100);
        let rect = Rectangle::new(150, 10, 20, 20).unwrap();
        let err = capturer(100, 50, false).normalize(&frame, &rect).unwrap_err();
        assert!(matches!(err, CaptureError::RegionOutOfBounds { .. }));
    }

    #[test]
    fn capture_keeps_the_source_rectangle() {
        let rect = Rectangle::new(50, 100, 500, 150).unwrap();
        let frame = DynamicImage::ImageRgb8(striped_frame());
        let still = capturer(600, 250, true).capture(&frame, &rect).unwrap();
        assert_eq!(still.source_rect(), rect);
        assert_eq!(still.image().dimensions(), (600, 250));
        assert_eq!(still.image(), still.original());
    }
}
