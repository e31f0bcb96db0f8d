use super::StillSink;
use anyhow::{Context, Result};
use image::{ImageFormat, RgbImage};
use std::path::{Path, PathBuf};

/// Writes each still to the same PNG file, replacing the previous one.
pub struct PngFileSink {
    path: PathBuf,
}

impl PngFileSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StillSink for PngFileSink {
    fn write_still(&mut self, still: &RgbImage) -> Result<()> {
        still
            .save_with_format(&self.path, ImageFormat::Png)
            .with_context(|| format!("Failed to write still to {}", self.path.display()))?;

        tracing::info!(
            "Wrote {}x{} still to {}",
            still.width(),
            still.height(),
            self.path.display()
        );
        Ok(())
    }
}
