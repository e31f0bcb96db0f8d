mod capturer;
mod tone;

pub use capturer::FrameCapturer;
pub use tone::{CapturedStill, ToneAdjuster, ToneParameters};
