use crate::capture::FrameSource;
use crate::config::PipelineConfig;
use crate::detect::{CandidateRectangle, Detector, Rectangle};
use crate::error::CaptureError;
use crate::stability::{CaptureZone, GateEvent, GateState, StabilityGate};
use crate::still::{CapturedStill, FrameCapturer, ToneParameters};
use anyhow::{Context, Result};
use image::{DynamicImage, RgbImage};
use std::time::{Duration, Instant};

/// Result of handing one frame (or one loop step) to the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// Streaming is switched off; nothing was processed.
    Stopped,
    /// A still is held; frames are ignored until reset.
    Paused,
    /// The source has no more frames.
    Exhausted,
    /// Still looking. `streak` is the current stability count.
    Searching {
        candidate: Option<CandidateRectangle>,
        streak: u32,
    },
    /// This frame completed a stable streak and was captured.
    Captured(Rectangle),
}

/// State of one video session: detection, stability gating and the held
/// still.
pub struct Session {
    detector: Detector,
    gate: StabilityGate,
    capturer: FrameCapturer,
    frame_size: (u32, u32),
    streaming: bool,
    held: Option<CapturedStill>,
}

impl Session {
    /// Session whose capture zone comes from the configured margins.
    pub fn new(config: &PipelineConfig, width: u32, height: u32) -> Result<Self, CaptureError> {
        if width == 0 || height == 0 {
            return Err(CaptureError::EmptyFrame { width, height });
        }
        let zone = CaptureZone::from_margins(width, height, &config.zone)
            .ok_or(CaptureError::EmptyZone { width, height })?;
        Ok(Self::with_zone(config, width, height, zone))
    }

    /// Session for a replayed still image rather than a camera feed.
    ///
    /// Identical to [`Session::new`] except for the lighter 3x3 blur ahead of
    /// edge detection.
    pub fn for_stills(
        config: &PipelineConfig,
        width: u32,
        height: u32,
    ) -> Result<Self, CaptureError> {
        let mut session = Self::new(config, width, height)?;
        session.detector = Detector::for_stills(config);
        Ok(session)
    }

    /// Session with an explicit capture zone.
    pub fn with_zone(config: &PipelineConfig, width: u32, height: u32, zone: CaptureZone) -> Self {
        let rect = zone.rect();
        tracing::info!(
            width,
            height,
            zone_x = rect.x,
            zone_y = rect.y,
            zone_width = rect.width,
            zone_height = rect.height,
            "session ready"
        );
        Self {
            detector: Detector::new(config),
            gate: StabilityGate::new(zone, config.stability.threshold),
            capturer: FrameCapturer::new(&config.capture),
            frame_size: (width, height),
            streaming: true,
            held: None,
        }
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    pub fn frame_size(&self) -> (u32, u32) {
        self.frame_size
    }

    pub fn zone(&self) -> &CaptureZone {
        self.gate.zone()
    }

    pub fn gate(&self) -> &StabilityGate {
        &self.gate
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Streaming and not holding a capture.
    pub fn is_active(&self) -> bool {
        self.streaming && self.gate.state() == GateState::Streaming
    }

    pub fn start(&mut self) {
        if !self.streaming {
            tracing::info!("streaming started");
        }
        self.streaming = true;
    }

    pub fn stop(&mut self) {
        if self.streaming {
            tracing::info!("streaming stopped");
        }
        self.streaming = false;
    }

    /// Drop the held still and resume searching from an empty streak.
    pub fn reset(&mut self) {
        tracing::info!("session reset");
        self.held = None;
        self.gate.reset();
    }

    pub fn held_still(&self) -> Option<&CapturedStill> {
        self.held.as_ref()
    }

    pub fn take_still(&mut self) -> Option<CapturedStill> {
        self.held.take()
    }

    /// Re-tone the held still from its original pixels.
    pub fn adjust_tone(&mut self, params: ToneParameters) -> Option<&RgbImage> {
        self.held.as_mut().map(|still| still.apply_tone(params))
    }

    /// Run detection and stability gating on one frame.
    pub fn process_frame(&mut self, frame: &DynamicImage) -> Result<StepOutcome, CaptureError> {
        if !self.streaming {
            return Ok(StepOutcome::Stopped);
        }
        if self.gate.state() == GateState::Paused {
            return Ok(StepOutcome::Paused);
        }

        let (expected_width, expected_height) = self.frame_size;
        if (frame.width(), frame.height()) != self.frame_size {
            return Err(CaptureError::DimensionMismatch {
                expected_width,
                expected_height,
                width: frame.width(),
                height: frame.height(),
            });
        }

        let candidate = self.detector.detect(frame);
        match self.gate.observe(candidate.as_ref()) {
            GateEvent::Triggered => {
                let Some(candidate) = candidate else {
                    // The gate only fires on a qualifying candidate.
                    self.gate.reset();
                    return Ok(StepOutcome::Searching {
                        candidate: None,
                        streak: 0,
                    });
                };
                match self.capturer.capture(frame, &candidate.rect) {
                    Ok(still) => {
                        self.held = Some(still);
                        Ok(StepOutcome::Captured(candidate.rect))
                    }
                    Err(err) => {
                        self.gate.reset();
                        Err(err)
                    }
                }
            }
            GateEvent::Ignored => Ok(StepOutcome::Paused),
            GateEvent::Reset | GateEvent::Counting(_) => Ok(StepOutcome::Searching {
                candidate,
                streak: self.gate.counter(),
            }),
        }
    }

    /// Pull one frame from `source` and process it.
    ///
    /// The streaming flag is checked before anything else; a stopped or
    /// paused session does not touch the source.
    pub fn step<S: FrameSource + ?Sized>(&mut self, source: &mut S) -> Result<StepOutcome> {
        if !self.streaming {
            return Ok(StepOutcome::Stopped);
        }
        if self.gate.state() == GateState::Paused {
            return Ok(StepOutcome::Paused);
        }
        let Some(frame) = source.next_frame().context("Failed to capture frame")? else {
            return Ok(StepOutcome::Exhausted);
        };
        let outcome = self
            .process_frame(&frame)
            .context("Failed to process frame")?;
        Ok(outcome)
    }
}

/// Holds the loop to a target frame rate.
#[derive(Debug, Clone, Copy)]
pub struct FramePacer {
    interval: Duration,
}

impl FramePacer {
    pub fn new(fps: u32) -> Self {
        Self {
            interval: Duration::from_nanos(1_000_000_000 / fps.max(1) as u64),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time left in this frame's slot; zero when the step ran long.
    pub fn delay_after(&self, elapsed: Duration) -> Duration {
        self.interval.saturating_sub(elapsed)
    }
}

/// How a call to [`run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Captured(Rectangle),
    /// The session already held a still when the loop was entered.
    Paused,
    Stopped,
    Exhausted,
}

/// Process frames until a capture, a stop, or the end of the source.
///
/// Steps run strictly one after another at most `fps` times a second. A failed
/// step is logged and the loop carries on with the next frame.
pub fn run<S: FrameSource + ?Sized>(
    source: &mut S,
    session: &mut Session,
    fps: u32,
) -> Result<RunOutcome> {
    run_with(source, session, fps, |_| {})
}

/// Like [`run`], calling `between` before every step.
///
/// Operator input (stop, reset, tone) goes through `between`; a `stop()`
/// there ends the loop at that step's streaming check.
pub fn run_with<S, F>(
    source: &mut S,
    session: &mut Session,
    fps: u32,
    mut between: F,
) -> Result<RunOutcome>
where
    S: FrameSource + ?Sized,
    F: FnMut(&mut Session),
{
    let pacer = FramePacer::new(fps);
    let mut frame_count = 0u64;
    let mut failures = 0u64;
    let mut total_step_time = Duration::ZERO;

    tracing::info!("Starting capture loop at {} fps", fps);

    loop {
        between(session);
        let step_start = Instant::now();

        let outcome = match session.step(source) {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                failures += 1;
                tracing::warn!(error = format!("{err:#}"), failures, "frame step failed");
                None
            }
        };

        match outcome {
            Some(StepOutcome::Captured(rect)) => return Ok(RunOutcome::Captured(rect)),
            Some(StepOutcome::Stopped) => return Ok(RunOutcome::Stopped),
            Some(StepOutcome::Exhausted) => {
                tracing::info!("Frame source exhausted after {} frames", frame_count);
                return Ok(RunOutcome::Exhausted);
            }
            Some(StepOutcome::Paused) => return Ok(RunOutcome::Paused),
            Some(StepOutcome::Searching { streak, .. }) => {
                tracing::debug!(frame = frame_count, streak, "searching");
            }
            None => {}
        }

        let step_time = step_start.elapsed();
        total_step_time += step_time;
        frame_count += 1;

        // Log stats every 30 frames
        if frame_count % 30 == 0 {
            let avg_step_ms = total_step_time.as_secs_f64() * 1000.0 / frame_count as f64;
            tracing::info!(
                "Frame {}: step={:.1}ms, max_fps={:.1}, failures={}",
                frame_count,
                avg_step_ms,
                1000.0 / avg_step_ms.max(f64::EPSILON),
                failures
            );
        }

        // Frame rate limiting
        let delay = pacer.delay_after(step_time);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}
