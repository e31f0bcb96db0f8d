use super::FrameSource;
use anyhow::{Context, Result};
use image::DynamicImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;

/// Camera feed via nokhwa, decoded to RGB.
pub struct WebcamSource {
    camera: Camera,
    width: u32,
    height: u32,
}

impl WebcamSource {
    pub fn new(device_index: u32, width: u32, height: u32) -> Result<Self> {
        tracing::info!(
            "Initializing webcam {} at {}x{}",
            device_index,
            width,
            height
        );

        let index = CameraIndex::Index(device_index);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::HighestResolution(
            Resolution::new(width, height),
        ));

        let mut camera = Camera::new(index, requested).context("Failed to open camera")?;

        camera
            .open_stream()
            .context("Failed to open camera stream")?;

        // The driver may not honour the request; frames come at whatever it picked.
        let resolution = camera.resolution();
        let (width, height) = (resolution.width(), resolution.height());
        if width == 0 || height == 0 {
            anyhow::bail!("camera reported an empty resolution");
        }

        tracing::info!("Webcam streaming at {}x{}", width, height);

        Ok(Self {
            camera,
            width,
            height,
        })
    }
}

impl FrameSource for WebcamSource {
    fn next_frame(&mut self) -> Result<Option<DynamicImage>> {
        let frame = self.camera.frame().context("Failed to capture frame")?;

        let decoded = frame
            .decode_image::<RgbFormat>()
            .context("Failed to decode frame")?;

        Ok(Some(DynamicImage::ImageRgb8(decoded)))
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
