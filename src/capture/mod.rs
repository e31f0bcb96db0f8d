mod file;
mod webcam;

pub use file::ImageFileSource;
pub use webcam::WebcamSource;

use anyhow::Result;
use image::DynamicImage;

/// Trait for live frame sources
pub trait FrameSource {
    /// Capture the next frame, or `None` once the source is exhausted
    fn next_frame(&mut self) -> Result<Option<DynamicImage>>;

    /// Get the resolution of captured frames
    fn resolution(&self) -> (u32, u32);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<DynamicImage>> {
        (**self).next_frame()
    }

    fn resolution(&self) -> (u32, u32) {
        (**self).resolution()
    }
}
