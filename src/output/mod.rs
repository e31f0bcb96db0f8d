mod png;

pub use png::PngFileSink;

use anyhow::Result;
use image::RgbImage;

/// Trait for destinations of captured stills
pub trait StillSink {
    /// Write a still to the output
    fn write_still(&mut self, still: &RgbImage) -> Result<()>;
}
