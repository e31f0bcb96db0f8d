use super::types::{polygon_area, CandidateRectangle, Polygon, Rectangle};
use crate::config::SelectorConfig;

/// Picks the largest check-shaped quadrilateral in a frame.
///
/// Greedy and memoryless: every frame is judged on its own.
#[derive(Debug, Clone)]
pub struct RectangleSelector {
    min_area_ratio: f64,
    min_aspect_ratio: f64,
}

impl RectangleSelector {
    pub fn new(config: &SelectorConfig) -> Self {
        Self {
            min_area_ratio: config.min_area_ratio,
            min_aspect_ratio: config.min_aspect_ratio,
        }
    }

    pub fn select(
        &self,
        polygons: &[Polygon],
        frame_width: u32,
        frame_height: u32,
    ) -> Option<CandidateRectangle> {
        let min_area = frame_width as f64 * frame_height as f64 * self.min_area_ratio;
        let mut best: Option<CandidateRectangle> = None;

        for polygon in polygons {
            if polygon.len() != 4 {
                continue;
            }
            let Some(rect) = Rectangle::bounding(polygon, frame_width, frame_height) else {
                continue;
            };
            let area = rect.area();
            if (area as f64) < min_area {
                continue;
            }
            if (rect.width as f64) < self.min_aspect_ratio * rect.height as f64 {
                continue;
            }
            if best.map_or(true, |b| area > b.rect.area()) {
                best = Some(CandidateRectangle {
                    rect,
                    contour_area: polygon_area(polygon),
                });
            }
        }

        if let Some(candidate) = &best {
            tracing::debug!(
                x = candidate.rect.x,
                y = candidate.rect.y,
                width = candidate.rect.width,
                height = candidate.rect.height,
                "candidate rectangle"
            );
        }
        best
    }
}
