use super::FrameSource;
use anyhow::{Context, Result};
use image::DynamicImage;
use std::path::Path;

/// Replays one still image as a video stream.
///
/// Useful for running the pipeline on a scanned or photographed check without
/// a camera attached.
pub struct ImageFileSource {
    frame: DynamicImage,
    remaining: Option<u32>,
}

impl ImageFileSource {
    /// `repeat` bounds the number of frames served; `None` repeats forever.
    pub fn open<P: AsRef<Path>>(path: P, repeat: Option<u32>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading still image from {}", path.display());

        let frame = image::open(path)
            .with_context(|| format!("Failed to open image {}", path.display()))?;
        Self::from_image(frame, repeat)
    }

    pub fn from_image(frame: DynamicImage, repeat: Option<u32>) -> Result<Self> {
        if frame.width() == 0 || frame.height() == 0 {
            anyhow::bail!("image is empty ({}x{})", frame.width(), frame.height());
        }
        Ok(Self {
            frame,
            remaining: repeat,
        })
    }
}

impl FrameSource for ImageFileSource {
    fn next_frame(&mut self) -> Result<Option<DynamicImage>> {
        match &mut self.remaining {
            Some(0) => Ok(None),
            Some(n) => {
                *n -= 1;
                Ok(Some(self.frame.clone()))
            }
            None => Ok(Some(self.frame.clone())),
        }
    }

    fn resolution(&self) -> (u32, u32) {
        (self.frame.width(), self.frame.height())
    }
}
