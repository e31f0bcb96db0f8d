use serde::Deserialize;
use std::path::Path;

/// Tuning for the whole detection/capture pipeline.
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub edges: EdgeConfig,
    #[serde(default)]
    pub contours: ContourConfig,
    #[serde(default)]
    pub selector: SelectorConfig,
    #[serde(default)]
    pub stability: StabilityConfig,
    #[serde(default)]
    pub zone: ZoneConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_fps")]
    pub fps: u32,
}

/// Blur applied before edge detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum BlurKernel {
    /// 3x3 binomial kernel, used when preprocessing uploaded stills.
    #[serde(rename = "3x3")]
    Small,
    /// 5x5 binomial kernel, used for live frames.
    #[serde(rename = "5x5")]
    Large,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeConfig {
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f32,
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f32,
    #[serde(default = "default_blur")]
    pub blur: BlurKernel,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContourConfig {
    /// Douglas-Peucker tolerance as a fraction of the contour's arc length.
    #[serde(default = "default_epsilon_ratio")]
    pub epsilon_ratio: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    /// Minimum bounding-rectangle area as a fraction of the frame area.
    #[serde(default = "default_min_area_ratio")]
    pub min_area_ratio: f64,
    /// Minimum width / height.
    #[serde(default = "default_min_aspect_ratio")]
    pub min_aspect_ratio: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StabilityConfig {
    /// Consecutive qualifying frames required; capture fires on the next one.
    #[serde(default = "default_stability_threshold")]
    pub threshold: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoneConfig {
    /// Horizontal margin on each side, as a fraction of frame width.
    #[serde(default = "default_margin_x")]
    pub margin_x: f64,
    /// Vertical margin on each side, as a fraction of frame height.
    #[serde(default = "default_margin_y")]
    pub margin_y: f64,
    /// Minimum candidate area as a fraction of the zone area.
    #[serde(default = "default_min_coverage")]
    pub min_coverage: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_canvas_width")]
    pub canvas_width: u32,
    #[serde(default = "default_canvas_height")]
    pub canvas_height: u32,
    #[serde(default = "default_background")]
    pub background: [u8; 3],
    #[serde(default = "default_grayscale")]
    pub grayscale: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_backends")]
    pub backends: Vec<String>,
    #[serde(default = "default_request_id")]
    pub request_id: String,
    /// External program that reads a PNG on stdin and prints JSON results.
    #[serde(default)]
    pub command: Option<String>,
    /// How long one scan may take before the engine is killed.
    #[serde(default = "default_ocr_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { fps: default_fps() }
    }
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            low_threshold: default_low_threshold(),
            high_threshold: default_high_threshold(),
            blur: default_blur(),
        }
    }
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            epsilon_ratio: default_epsilon_ratio(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_area_ratio: default_min_area_ratio(),
            min_aspect_ratio: default_min_aspect_ratio(),
        }
    }
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            threshold: default_stability_threshold(),
        }
    }
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            margin_x: default_margin_x(),
            margin_y: default_margin_y(),
            min_coverage: default_min_coverage(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            canvas_width: default_canvas_width(),
            canvas_height: default_canvas_height(),
            background: default_background(),
            grayscale: default_grayscale(),
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backends: default_backends(),
            request_id: default_request_id(),
            command: None,
            timeout_ms: default_ocr_timeout_ms(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config = Self::from_toml(&content)?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.fps == 0 {
            return Err(ConfigError::Invalid("stream.fps must be positive".into()));
        }
        if self.edges.low_threshold < 0.0 || self.edges.low_threshold > self.edges.high_threshold
        {
            return Err(ConfigError::Invalid(format!(
                "edge thresholds must satisfy 0 <= low <= high, got {} / {}",
                self.edges.low_threshold, self.edges.high_threshold
            )));
        }
        if !(self.contours.epsilon_ratio > 0.0 && self.contours.epsilon_ratio < 1.0) {
            return Err(ConfigError::Invalid(
                "contours.epsilon_ratio must be in (0, 1)".into(),
            ));
        }
        check_fraction("selector.min_area_ratio", self.selector.min_area_ratio)?;
        check_fraction("zone.min_coverage", self.zone.min_coverage)?;
        if self.selector.min_aspect_ratio <= 0.0 {
            return Err(ConfigError::Invalid(
                "selector.min_aspect_ratio must be positive".into(),
            ));
        }
        if self.stability.threshold == 0 {
            return Err(ConfigError::Invalid(
                "stability.threshold must be at least 1".into(),
            ));
        }
        for (name, margin) in [
            ("zone.margin_x", self.zone.margin_x),
            ("zone.margin_y", self.zone.margin_y),
        ] {
            if !(0.0..0.5).contains(&margin) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be in [0, 0.5), got {margin}"
                )));
            }
        }
        if self.capture.canvas_width == 0 || self.capture.canvas_height == 0 {
            return Err(ConfigError::Invalid("capture canvas must be non-empty".into()));
        }
        if self.ocr.backends.is_empty() {
            return Err(ConfigError::Invalid(
                "ocr.backends must name at least one backend".into(),
            ));
        }
        if self.ocr.timeout_ms == 0 {
            return Err(ConfigError::Invalid("ocr.timeout_ms must be positive".into()));
        }
        Ok(())
    }
}

fn check_fraction(name: &str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{name} must be in (0, 1], got {value}"
        )))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_fps() -> u32 {
    15
}
fn default_low_threshold() -> f32 {
    50.0
}
fn default_high_threshold() -> f32 {
    150.0
}
fn default_blur() -> BlurKernel {
    BlurKernel::Large
}
fn default_epsilon_ratio() -> f64 {
    0.02
}
fn default_min_area_ratio() -> f64 {
    0.15
}
fn default_min_aspect_ratio() -> f64 {
    2.0
}
fn default_stability_threshold() -> u32 {
    5
}
fn default_margin_x() -> f64 {
    0.02
}
fn default_margin_y() -> f64 {
    0.2
}
fn default_min_coverage() -> f64 {
    0.8
}
fn default_canvas_width() -> u32 {
    1200
}
fn default_canvas_height() -> u32 {
    500
}
fn default_background() -> [u8; 3] {
    [255, 255, 255]
}
fn default_grayscale() -> bool {
    true
}
fn default_backends() -> Vec<String> {
    vec!["tesseract".into(), "opencv".into()]
}
fn default_request_id() -> String {
    "checkImage".into()
}
fn default_ocr_timeout_ms() -> u64 {
    20_000
}
