use crate::detect::Rectangle;
use image::RgbImage;

/// Operator brightness/contrast setting, each in -100..=100.
///
/// Contrast 0 leaves the image unchanged; contrast 100 doubles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ToneParameters {
    brightness: i32,
    contrast: i32,
}

impl ToneParameters {
    pub const MIN: i32 = -100;
    pub const MAX: i32 = 100;

    pub fn new(brightness: i32, contrast: i32) -> Self {
        Self {
            brightness: brightness.clamp(Self::MIN, Self::MAX),
            contrast: contrast.clamp(Self::MIN, Self::MAX),
        }
    }

    pub fn brightness(&self) -> i32 {
        self.brightness
    }

    pub fn contrast(&self) -> i32 {
        self.contrast
    }

    pub fn is_identity(&self) -> bool {
        self.brightness == 0 && self.contrast == 0
    }
}

/// Linear `input * (1 + contrast/100) + brightness`, rounded and saturated
/// once at the end.
#[derive(Debug, Clone)]
pub struct ToneAdjuster {
    lut: [u8; 256],
}

impl ToneAdjuster {
    pub fn new(params: ToneParameters) -> Self {
        let gain = 1.0 + params.contrast as f32 / 100.0;
        let offset = params.brightness as f32;
        let mut lut = [0u8; 256];
        for (value, out) in lut.iter_mut().enumerate() {
            *out = (value as f32 * gain + offset).round().clamp(0.0, 255.0) as u8;
        }
        Self { lut }
    }

    pub fn adjust(&self, value: u8) -> u8 {
        self.lut[value as usize]
    }

    /// Write the adjusted `source` into `target`, which must be the same size.
    pub fn apply_into(&self, source: &RgbImage, target: &mut RgbImage) {
        debug_assert_eq!(source.dimensions(), target.dimensions());
        for (dst, src) in target.iter_mut().zip(source.iter()) {
            *dst = self.lut[*src as usize];
        }
    }
}

/// Normalized still held after a capture.
///
/// The original pixels never change; every tone adjustment is recomputed from
/// them into the working copy, so only the latest setting matters.
#[derive(Debug, Clone)]
pub struct CapturedStill {
    original: RgbImage,
    working: RgbImage,
    tone: ToneParameters,
    source: Rectangle,
}

impl CapturedStill {
    pub fn new(image: RgbImage, source: Rectangle) -> Self {
        Self {
            working: image.clone(),
            original: image,
            tone: ToneParameters::default(),
            source,
        }
    }

    /// Current (possibly adjusted) pixels.
    pub fn image(&self) -> &RgbImage {
        &self.working
    }

    pub fn original(&self) -> &RgbImage {
        &self.original
    }

    pub fn tone(&self) -> ToneParameters {
        self.tone
    }

    /// Rectangle of the source frame this still was cut from.
    pub fn source_rect(&self) -> Rectangle {
        self.source
    }

    pub fn apply_tone(&mut self, params: ToneParameters) -> &RgbImage {
        if params.is_identity() {
            self.working.copy_from_slice(&self.original);
        } else {
            ToneAdjuster::new(params).apply_into(&self.original, &mut self.working);
        }
        self.tone = params;
        tracing::debug!(
            brightness = params.brightness,
            contrast = params.contrast,
            "tone applied"
        );
        &self.working
    }

    pub fn restore_original(&mut self) -> &RgbImage {
        self.apply_tone(ToneParameters::default())
    }

    pub fn into_image(self) -> RgbImage {
        self.working
    }
}
