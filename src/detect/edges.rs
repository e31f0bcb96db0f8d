use crate::config::{BlurKernel, EdgeConfig};
use image::{DynamicImage, GrayImage};
use imageproc::edges::canny;
use imageproc::filter::separable_filter_equal;
use std::borrow::Cow;

/// Binomial approximations of the Gaussian, applied separably.
const KERNEL_3X3: [f32; 3] = [0.25, 0.5, 0.25];
const KERNEL_5X5: [f32; 5] = [0.0625, 0.25, 0.375, 0.25, 0.0625];

impl BlurKernel {
    fn taps(self) -> &'static [f32] {
        match self {
            BlurKernel::Small => &KERNEL_3X3,
            BlurKernel::Large => &KERNEL_5X5,
        }
    }
}

/// Grayscale -> fixed blur -> Canny.
///
/// Thresholds are static; there is no per-frame adaptation.
#[derive(Debug, Clone)]
pub struct EdgeExtractor {
    low_threshold: f32,
    high_threshold: f32,
    blur: BlurKernel,
}

impl EdgeExtractor {
    pub fn new(config: &EdgeConfig) -> Self {
        Self {
            low_threshold: config.low_threshold,
            high_threshold: config.high_threshold,
            blur: config.blur,
        }
    }

    /// Variant used for uploaded stills, which are sharper than camera frames.
    pub fn for_stills(config: &EdgeConfig) -> Self {
        Self {
            blur: BlurKernel::Small,
            ..Self::new(config)
        }
    }

    pub fn blur(&self) -> BlurKernel {
        self.blur
    }

    /// Binary edge map (0 or 255) with the frame's dimensions.
    pub fn extract(&self, frame: &DynamicImage) -> GrayImage {
        let _span = tracing::debug_span!("edges").entered();

        let gray = to_grayscale(frame);
        let blurred: GrayImage = separable_filter_equal(gray.as_ref(), self.blur.taps());
        canny(&blurred, self.low_threshold, self.high_threshold)
    }
}

/// Single-channel view of a frame, borrowed when it already is one.
pub fn to_grayscale(frame: &DynamicImage) -> Cow<'_, GrayImage> {
    match frame {
        DynamicImage::ImageLuma8(gray) => Cow::Borrowed(gray),
        other => Cow::Owned(other.to_luma8()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage, Rgba, RgbaImage};

    fn white_box_on_black(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    #[test]
    fn uniform_frame_has_no_edges() {
        let frame = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 48, Rgb([120, 130, 140])));
        let edges = EdgeExtractor::new(&EdgeConfig::default()).extract(&frame);
        assert_eq!(edges.dimensions(), (64, 48));
        assert!(edges.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn box_outline_is_found_near_its_border() {
        let frame = DynamicImage::ImageRgb8(white_box_on_black(100, 70, 20, 20, 80, 50));
        let edges = EdgeExtractor::new(&EdgeConfig::default()).extract(&frame);

        assert!(edges.pixels().all(|p| p[0] == 0 || p[0] == 255));
        let left_edge_hit = (16..=23).any(|x| edges.get_pixel(x, 35)[0] == 255);
        let top_edge_hit = (16..=23).any(|y| edges.get_pixel(50, y)[0] == 255);
        assert!(left_edge_hit, "expected an edge on the left side");
        assert!(top_edge_hit, "expected an edge on the top side");
        // Deep inside and far outside the box stay dark.
        assert_eq!(edges.get_pixel(50, 35)[0], 0);
        assert_eq!(edges.get_pixel(5, 5)[0], 0);
    }

    #[test]
    fn rgba_and_gray_frames_are_accepted() {
        let rgba = RgbaImage::from_pixel(32, 32, Rgba([10, 20, 30, 255]));
        let gray = GrayImage::from_pixel(32, 32, Luma([77]));
        let extractor = EdgeExtractor::new(&EdgeConfig::default());
        assert_eq!(extractor.extract(&DynamicImage::ImageRgba8(rgba)).dimensions(), (32, 32));
        assert_eq!(extractor.extract(&DynamicImage::ImageLuma8(gray)).dimensions(), (32, 32));
    }

    #[test]
    fn grayscale_frames_are_borrowed() {
        let frame = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([9])));
        assert!(matches!(to_grayscale(&frame), Cow::Borrowed(_)));
        let frame = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        assert!(matches!(to_grayscale(&frame), Cow::Owned(_)));
    }

    #[test]
    fn still_variant_uses_the_small_kernel() {
        let config = EdgeConfig::default();
        assert_eq!(EdgeExtractor::new(&config).blur(), BlurKernel::Large);
        assert_eq!(EdgeExtractor::for_stills(&config).blur(), BlurKernel::Small);
    }
}
