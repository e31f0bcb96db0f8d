use crate::config::ZoneConfig;
use crate::detect::{CandidateRectangle, Rectangle};

/// Target region a check must sit in before it is captured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureZone {
    rect: Rectangle,
    min_coverage: f64,
}

impl CaptureZone {
    pub fn new(rect: Rectangle, min_coverage: f64) -> Self {
        Self { rect, min_coverage }
    }

    /// Zone inset from the frame edges by the configured margins.
    ///
    /// `None` if the margins leave nothing of the frame.
    pub fn from_margins(frame_width: u32, frame_height: u32, config: &ZoneConfig) -> Option<Self> {
        let x = (frame_width as f64 * config.margin_x).round() as u32;
        let y = (frame_height as f64 * config.margin_y).round() as u32;
        let width = frame_width.checked_sub(2 * x)?;
        let height = frame_height.checked_sub(2 * y)?;
        let rect = Rectangle::new(x, y, width, height)?;
        Some(Self::new(rect, config.min_coverage))
    }

    pub fn rect(&self) -> Rectangle {
        self.rect
    }

    /// Fully contained and large enough relative to the zone.
    pub fn admits(&self, candidate: &Rectangle) -> bool {
        self.rect.contains(candidate)
            && candidate.area() as f64 >= self.min_coverage * self.rect.area() as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Streaming,
    Paused,
}

/// What one frame did to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEvent {
    /// Gate is paused; the frame was not looked at.
    Ignored,
    /// Frame did not qualify; the streak is back to zero.
    Reset,
    /// Frame qualified; current streak length.
    Counting(u32),
    /// Streak exceeded the threshold; capture now. Fires once per streak.
    Triggered,
}

/// Debounces detections: a capture fires only after the candidate has stayed
/// in the zone for more than `threshold` consecutive frames.
///
/// The counter saturates at `threshold`; the qualifying frame that would push
/// it past the threshold fires the trigger and pauses the gate.
#[derive(Debug, Clone)]
pub struct StabilityGate {
    zone: CaptureZone,
    threshold: u32,
    counter: u32,
    state: GateState,
}

impl StabilityGate {
    pub fn new(zone: CaptureZone, threshold: u32) -> Self {
        Self {
            zone,
            threshold,
            counter: 0,
            state: GateState::Streaming,
        }
    }

    pub fn observe(&mut self, candidate: Option<&CandidateRectangle>) -> GateEvent {
        if self.state == GateState::Paused {
            return GateEvent::Ignored;
        }

        let qualifies = candidate.is_some_and(|c| self.zone.admits(&c.rect));
        if !qualifies {
            if self.counter > 0 {
                tracing::debug!(streak = self.counter, "stability streak broken");
            }
            self.counter = 0;
            return GateEvent::Reset;
        }

        if self.counter >= self.threshold {
            self.state = GateState::Paused;
            tracing::info!(streak = self.counter + 1, "check stable, triggering capture");
            return GateEvent::Triggered;
        }

        self.counter += 1;
        GateEvent::Counting(self.counter)
    }

    /// Back to streaming with an empty streak.
    pub fn reset(&mut self) {
        self.counter = 0;
        self.state = GateState::Streaming;
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn zone(&self) -> &CaptureZone {
        &self.zone
    }
}
