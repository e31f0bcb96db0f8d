//! Live check capture from a camera feed.
//!
//! Frames are searched for a wide rectangular document, a candidate must sit
//! inside the capture zone for several consecutive frames, and the stable
//! frame is then cropped into a fixed-size still that can be tone-adjusted and
//! handed to an OCR engine.

pub mod capture;
pub mod config;
pub mod detect;
pub mod error;
pub mod ocr;
pub mod output;
pub mod session;
pub mod stability;
pub mod still;

pub use config::PipelineConfig;
pub use error::CaptureError;
pub use session::{run, run_with, RunOutcome, Session, StepOutcome};
