use super::types::Polygon;
use crate::config::ContourConfig;
use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;

/// Finds outer silhouettes in an edge map and simplifies them to polygons.
#[derive(Debug, Clone)]
pub struct ContourScanner {
    epsilon_ratio: f64,
}

impl ContourScanner {
    pub fn new(config: &ContourConfig) -> Self {
        Self {
            epsilon_ratio: config.epsilon_ratio,
        }
    }

    /// External contours only; holes and anything nested inside another
    /// border are skipped.
    pub fn scan(&self, edges: &GrayImage) -> Vec<Polygon> {
        let _span = tracing::debug_span!("contours").entered();

        let polygons: Vec<Polygon> = find_contours::<i32>(edges)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(|c| self.approximate(&c.points))
            .collect();

        tracing::debug!(count = polygons.len(), "external contours");
        polygons
    }

    /// Douglas-Peucker with a tolerance proportional to the perimeter.
    pub fn approximate(&self, points: &[Point<i32>]) -> Polygon {
        if points.len() < 3 {
            return points.to_vec();
        }
        let epsilon = self.epsilon_ratio * arc_length(points, true);
        if epsilon <= 0.0 {
            return points.to_vec();
        }
        approximate_closed(points, epsilon)
    }
}

/// Simplify a closed curve by splitting it at the point farthest from its
/// start and simplifying the two open halves.
fn approximate_closed(points: &[Point<i32>], epsilon: f64) -> Polygon {
    let start = points[0];
    let far = points
        .iter()
        .enumerate()
        .max_by_key(|(_, p)| {
            let dx = (p.x - start.x) as i64;
            let dy = (p.y - start.y) as i64;
            dx * dx + dy * dy
        })
        .map(|(i, _)| i)
        .unwrap_or(0);
    if far == 0 {
        return vec![start];
    }

    let mut polygon = approximate_polygon_dp(&points[..=far], epsilon, false);
    let mut closing: Vec<Point<i32>> = points[far..].to_vec();
    closing.push(start);
    let second = approximate_polygon_dp(&closing, epsilon, false);

    // `far` opens the second half and `start` closes it.
    polygon.pop();
    polygon.extend(second);
    polygon.dedup();
    if polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    polygon
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn outline(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let on_vertical = (x == x0 || x == x1) && (y0..=y1).contains(&y);
            let on_horizontal = (y == y0 || y == y1) && (x0..=x1).contains(&x);
            if on_vertical || on_horizontal {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    fn scanner() -> ContourScanner {
        ContourScanner::new(&ContourConfig::default())
    }

    #[test]
    fn rectangle_outline_reduces_to_four_vertices() {
        let edges = outline(120, 80, 10, 20, 109, 59);
        let polygons = scanner().scan(&edges);
        assert_eq!(polygons.len(), 1);
        let mut corners = polygons[0].clone();
        corners.sort_by_key(|p| (p.y, p.x));
        assert_eq!(
            corners,
            vec![
                Point::new(10, 20),
                Point::new(109, 20),
                Point::new(10, 59),
                Point::new(109, 59),
            ]
        );
    }

    #[test]
    fn nested_outlines_are_ignored() {
        let mut edges = outline(120, 80, 5, 5, 114, 74);
        for (x, y, p) in outline(120, 80, 30, 30, 60, 50).enumerate_pixels() {
            if p[0] == 255 {
                edges.put_pixel(x, y, *p);
            }
        }
        let polygons = scanner().scan(&edges);
        assert_eq!(polygons.len(), 1);
        assert!(polygons[0].iter().any(|p| p.x == 5 && p.y == 5));
    }

    #[test]
    fn separate_outlines_are_all_reported() {
        let mut edges = outline(200, 80, 5, 5, 90, 70);
        for (x, y, p) in outline(200, 80, 110, 5, 190, 70).enumerate_pixels() {
            if p[0] == 255 {
                edges.put_pixel(x, y, *p);
            }
        }
        assert_eq!(scanner().scan(&edges).len(), 2);
    }

    #[test]
    fn empty_edge_map_has_no_contours() {
        assert!(scanner().scan(&GrayImage::new(40, 40)).is_empty());
    }

    #[test]
    fn tiny_curves_are_left_alone() {
        let points = vec![Point::new(3, 3), Point::new(4, 3)];
        assert_eq!(scanner().approximate(&points), points);
    }

    #[test]
    fn jagged_edges_collapse_into_straight_sides() {
        // A 200x60 rectangle whose top side wobbles by one pixel.
        let mut points = Vec::new();
        for x in 0..200 {
            points.push(Point::new(x, (x % 2) as i32));
        }
        for y in 1..60 {
            points.push(Point::new(199, y));
        }
        for x in (0..199).rev() {
            points.push(Point::new(x, 59));
        }
        for y in (1..59).rev() {
            points.push(Point::new(0, y));
        }
        assert_eq!(scanner().approximate(&points).len(), 4);
    }
}
