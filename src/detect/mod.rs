mod contours;
mod edges;
mod selector;
pub mod types;

pub use contours::ContourScanner;
pub use edges::{to_grayscale, EdgeExtractor};
pub use selector::RectangleSelector;
pub use types::{polygon_area, CandidateRectangle, Polygon, Rectangle};

use crate::config::{BlurKernel, PipelineConfig};
use image::DynamicImage;

/// Edge extraction, contour scanning and rectangle selection for one frame.
#[derive(Debug, Clone)]
pub struct Detector {
    edges: EdgeExtractor,
    contours: ContourScanner,
    selector: RectangleSelector,
}

impl Detector {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            edges: EdgeExtractor::new(&config.edges),
            contours: ContourScanner::new(&config.contours),
            selector: RectangleSelector::new(&config.selector),
        }
    }

    /// Detector tuned for uploaded stills instead of camera frames.
    pub fn for_stills(config: &PipelineConfig) -> Self {
        Self {
            edges: EdgeExtractor::for_stills(&config.edges),
            ..Self::new(config)
        }
    }

    /// Blur applied ahead of edge detection.
    pub fn blur(&self) -> BlurKernel {
        self.edges.blur()
    }

    pub fn detect(&self, frame: &DynamicImage) -> Option<CandidateRectangle> {
        let _span = tracing::debug_span!("detect").entered();

        let edges = self.edges.extract(frame);
        let polygons = self.contours.scan(&edges);
        self.selector
            .select(&polygons, frame.width(), frame.height())
    }
}
