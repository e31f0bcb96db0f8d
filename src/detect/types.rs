use imageproc::point::Point;

/// Closed polygon produced by contour approximation, without a repeated
/// closing vertex.
pub type Polygon = Vec<Point<i32>>;

/// Axis-aligned region in frame pixels.
///
/// Width and height are always positive and the far edges fit in `u32`; the
/// constructors refuse anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rectangle {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rectangle {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        x.checked_add(width)?;
        y.checked_add(height)?;
        Some(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Rectangle covering a whole `width` x `height` image.
    pub fn full(width: u32, height: u32) -> Option<Self> {
        Self::new(0, 0, width, height)
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn contains(&self, other: &Rectangle) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Clip to a `width` x `height` frame. `None` when nothing is left.
    pub fn within(&self, width: u32, height: u32) -> Option<Self> {
        let right = self.right().min(width);
        let bottom = self.bottom().min(height);
        if self.x >= right || self.y >= bottom {
            return None;
        }
        Self::new(self.x, self.y, right - self.x, bottom - self.y)
    }

    /// Bounding rectangle of a point set, clipped to the frame.
    ///
    /// Pixel-inclusive like a raster bounding box: a single point yields a
    /// 1x1 rectangle.
    pub fn bounding(points: &[Point<i32>], width: u32, height: u32) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        if max_x < 0 || max_y < 0 {
            return None;
        }
        let x = min_x.max(0) as u32;
        let y = min_y.max(0) as u32;
        let rect = Self::new(x, y, max_x as u32 - x + 1, max_y as u32 - y + 1)?;
        rect.within(width, height)
    }
}

/// Best rectangle found in a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateRectangle {
    pub rect: Rectangle,
    /// Shoelace area of the approximated contour.
    pub contour_area: f64,
}

/// Shoelace area of a closed polygon.
pub fn polygon_area(polygon: &[Point<i32>]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for (i, p) in polygon.iter().enumerate() {
        let q = &polygon[(i + 1) % polygon.len()];
        twice_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    twice_area.abs() as f64 / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_empty_rectangles() {
        assert!(Rectangle::new(3, 4, 0, 10).is_none());
        assert!(Rectangle::new(3, 4, 10, 0).is_none());
    }

    #[test]
    fn refuses_edges_past_u32_max() {
        assert!(Rectangle::new(u32::MAX - 5, 0, 10, 10).is_none());
        assert!(Rectangle::new(0, u32::MAX, 10, 1).is_none());

        let last = Rectangle::new(u32::MAX - 10, u32::MAX - 10, 10, 10).unwrap();
        assert_eq!(last.right(), u32::MAX);
        assert_eq!(last.bottom(), u32::MAX);
        assert!(last.contains(&last));
        assert_eq!(last.within(640, 480), None);
    }

    #[test]
    fn far_edges_saturate_for_literal_rectangles() {
        let rect = Rectangle {
            x: u32::MAX,
            y: u32::MAX,
            width: 4,
            height: 4,
        };
        assert_eq!(rect.right(), u32::MAX);
        assert_eq!(rect.bottom(), u32::MAX);
    }

    #[test]
    fn containment_is_inclusive_of_edges() {
        let zone = Rectangle::new(10, 96, 620, 288).unwrap();
        let inner = Rectangle::new(50, 100, 500, 150).unwrap();
        let touching = Rectangle::new(10, 96, 620, 288).unwrap();
        let spilling = Rectangle::new(5, 100, 500, 150).unwrap();
        assert!(zone.contains(&inner));
        assert!(zone.contains(&touching));
        assert!(!zone.contains(&spilling));
    }

    #[test]
    fn within_clips_to_frame() {
        let rect = Rectangle::new(600, 400, 100, 100).unwrap();
        assert_eq!(rect.within(640, 480), Rectangle::new(600, 400, 40, 80));
        assert_eq!(rect.within(600, 480), None);
    }

    #[test]
    fn bounding_is_pixel_inclusive() {
        let points = vec![
            Point::new(50, 100),
            Point::new(549, 100),
            Point::new(549, 249),
            Point::new(50, 249),
        ];
        let rect = Rectangle::bounding(&points, 640, 480).unwrap();
        assert_eq!(rect, Rectangle::new(50, 100, 500, 150).unwrap());
        assert_eq!(rect.area(), 75_000);
    }

    #[test]
    fn bounding_clips_negative_and_overflowing_points() {
        let points = vec![Point::new(-5, -5), Point::new(700, 10)];
        let rect = Rectangle::bounding(&points, 640, 480).unwrap();
        assert_eq!(rect, Rectangle::new(0, 0, 640, 11).unwrap());
    }

    #[test]
    fn shoelace_area_of_axis_aligned_quad() {
        let quad = vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 4),
            Point::new(0, 4),
        ];
        assert_eq!(polygon_area(&quad), 40.0);
        assert_eq!(polygon_area(&quad[..2]), 0.0);
    }
}
