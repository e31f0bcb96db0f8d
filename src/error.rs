use crate::detect::Rectangle;

/// Failures that stop a capture session or a single capture attempt.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("frame is empty ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },

    #[error("frame size changed from {expected_width}x{expected_height} to {width}x{height}")]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    #[error("capture zone is empty for a {width}x{height} frame")]
    EmptyZone { width: u32, height: u32 },

    #[error("capture region {rect:?} lies outside the {width}x{height} frame")]
    RegionOutOfBounds {
        rect: Rectangle,
        width: u32,
        height: u32,
    },
}
