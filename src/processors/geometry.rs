//! Geometric primitives for layout and text boxes.
//!
//! Layout regions use the axis-aligned [`Rect`]; text lines use the quadrilateral
//! [`BoundingBox`]. [`MinAreaRect`] carries the rotated rectangles produced by
//! text detection, including the unclip expansion.

use imageproc::contours::Contour;
use imageproc::point::Point as ImageProcPoint;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::f32::consts::PI;

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    /// X-coordinate of the point.
    pub x: f32,
    /// Y-coordinate of the point.
    pub y: f32,
}

impl Point {
    /// Creates a new point with the given coordinates.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Converts this point to an imageproc point, truncating to integers.
    pub fn to_imageproc_point(&self) -> ImageProcPoint<i32> {
        ImageProcPoint::new(self.x as i32, self.y as i32)
    }
}

/// An axis-aligned rectangle in pixel coordinates.
///
/// Serialized as `[x_min, y_min, x_max, y_max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct Rect {
    /// Left edge.
    pub x_min: f32,
    /// Top edge.
    pub y_min: f32,
    /// Right edge.
    pub x_max: f32,
    /// Bottom edge.
    pub y_max: f32,
}

impl From<[f32; 4]> for Rect {
    fn from(coords: [f32; 4]) -> Self {
        Rect::new(coords[0], coords[1], coords[2], coords[3])
    }
}

impl From<Rect> for [f32; 4] {
    fn from(rect: Rect) -> Self {
        [rect.x_min, rect.y_min, rect.x_max, rect.y_max]
    }
}

impl Rect {
    /// Creates a rectangle from two corners, normalizing their order.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x_min: x1.min(x2),
            y_min: y1.min(y2),
            x_max: x1.max(x2),
            y_max: y1.max(y2),
        }
    }

    /// Width of the rectangle.
    pub fn width(&self) -> f32 {
        (self.x_max - self.x_min).max(0.0)
    }

    /// Height of the rectangle.
    pub fn height(&self) -> f32 {
        (self.y_max - self.y_min).max(0.0)
    }

    /// Area of the rectangle.
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Returns true when the rectangle has no area or non-finite coordinates.
    pub fn is_degenerate(&self) -> bool {
        let finite = [self.x_min, self.y_min, self.x_max, self.y_max]
            .iter()
            .all(|v| v.is_finite());
        !finite || self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Area shared with `other`, zero when they do not intersect.
    pub fn intersection_area(&self, other: &Rect) -> f32 {
        let w = self.x_max.min(other.x_max) - self.x_min.max(other.x_min);
        let h = self.y_max.min(other.y_max) - self.y_min.max(other.y_min);
        if w <= 0.0 || h <= 0.0 { 0.0 } else { w * h }
    }

    /// Intersection area divided by the smaller of the two areas.
    ///
    /// Returns 0.0 when either rectangle has no area, so degenerate boxes never
    /// qualify for merging.
    pub fn overlap_ratio_min(&self, other: &Rect) -> f32 {
        let min_area = self.area().min(other.area());
        if min_area <= 0.0 {
            return 0.0;
        }
        self.intersection_area(other) / min_area
    }

    /// Intersection over union.
    pub fn iou(&self, other: &Rect) -> f32 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 { 0.0 } else { inter / union }
    }

    /// Smallest rectangle enclosing both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }

    /// Length of the shared horizontal extent.
    pub fn x_overlap(&self, other: &Rect) -> f32 {
        (self.x_max.min(other.x_max) - self.x_min.max(other.x_min)).max(0.0)
    }

    /// Length of the shared vertical extent.
    pub fn y_overlap(&self, other: &Rect) -> f32 {
        (self.y_max.min(other.y_max) - self.y_min.max(other.y_min)).max(0.0)
    }

    /// Clamps the rectangle into `[0, width] x [0, height]`.
    pub fn clip(&self, width: f32, height: f32) -> Rect {
        Rect {
            x_min: self.x_min.clamp(0.0, width),
            y_min: self.y_min.clamp(0.0, height),
            x_max: self.x_max.clamp(0.0, width),
            y_max: self.y_max.clamp(0.0, height),
        }
    }

    /// Moves the rectangle by `(dx, dy)`.
    pub fn translate(&self, dx: f32, dy: f32) -> Rect {
        Rect {
            x_min: self.x_min + dx,
            y_min: self.y_min + dy,
            x_max: self.x_max + dx,
            y_max: self.y_max + dy,
        }
    }

    /// Integer pixel window `(x, y, w, h)` covering the rectangle inside an image.
    ///
    /// Returns `None` when the clipped window is empty.
    pub fn pixel_window(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let clipped = self.clip(width as f32, height as f32);
        let x0 = clipped.x_min.floor() as u32;
        let y0 = clipped.y_min.floor() as u32;
        let x1 = (clipped.x_max.ceil() as u32).min(width);
        let y1 = (clipped.y_max.ceil() as u32).min(height);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0, y0, x1 - x0, y1 - y0))
    }

    /// The rectangle as a clockwise quadrilateral starting top-left.
    pub fn to_quad(&self) -> BoundingBox {
        BoundingBox::from_coords(self.x_min, self.y_min, self.x_max, self.y_max)
    }
}

/// A polygon, usually the 4-point quadrilateral of a text line.
///
/// Serialized as a list of `[x, y]` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<[f32; 2]>", into = "Vec<[f32; 2]>")]
pub struct BoundingBox {
    /// The points that define the polygon.
    pub points: Vec<Point>,
}

impl From<Vec<[f32; 2]>> for BoundingBox {
    fn from(points: Vec<[f32; 2]>) -> Self {
        Self::new(points.into_iter().map(|[x, y]| Point::new(x, y)).collect())
    }
}

impl From<BoundingBox> for Vec<[f32; 2]> {
    fn from(bbox: BoundingBox) -> Self {
        bbox.points.iter().map(|p| [p.x, p.y]).collect()
    }
}

impl BoundingBox {
    /// Creates a new bounding box from a vector of points.
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Creates an axis-aligned quadrilateral from two corners.
    ///
    /// # Arguments
    ///
    /// * `x1` - The x-coordinate of the top-left corner.
    /// * `y1` - The y-coordinate of the top-left corner.
    /// * `x2` - The x-coordinate of the bottom-right corner.
    /// * `y2` - The y-coordinate of the bottom-right corner.
    pub fn from_coords(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(vec![
            Point::new(x1, y1),
            Point::new(x2, y1),
            Point::new(x2, y2),
            Point::new(x1, y2),
        ])
    }

    /// Creates a polygon from the points of an imageproc contour.
    pub fn from_contour(contour: &Contour<u32>) -> Self {
        Self::new(
            contour
                .points
                .iter()
                .map(|p| Point::new(p.x as f32, p.y as f32))
                .collect(),
        )
    }

    /// Polygon area by the shoelace formula; 0.0 below three points.
    pub fn area(&self) -> f32 {
        if self.points.len() < 3 {
            return 0.0;
        }
        let twice: f32 = self
            .points
            .iter()
            .circular_tuple_windows()
            .map(|(a, b)| a.x * b.y - b.x * a.y)
            .sum();
        twice.abs() / 2.0
    }

    /// Length of the closed outline.
    pub fn perimeter(&self) -> f32 {
        if self.points.len() < 2 {
            return 0.0;
        }
        self.points
            .iter()
            .circular_tuple_windows()
            .map(|(a, b)| ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt())
            .sum()
    }

    /// Minimum x-coordinate, or 0.0 for an empty polygon.
    pub fn x_min(&self) -> f32 {
        self.fold_axis(|p| p.x, f32::INFINITY, f32::min)
    }

    /// Minimum y-coordinate, or 0.0 for an empty polygon.
    pub fn y_min(&self) -> f32 {
        self.fold_axis(|p| p.y, f32::INFINITY, f32::min)
    }

    /// Maximum x-coordinate, or 0.0 for an empty polygon.
    pub fn x_max(&self) -> f32 {
        self.fold_axis(|p| p.x, f32::NEG_INFINITY, f32::max)
    }

    /// Maximum y-coordinate, or 0.0 for an empty polygon.
    pub fn y_max(&self) -> f32 {
        self.fold_axis(|p| p.y, f32::NEG_INFINITY, f32::max)
    }

    fn fold_axis(&self, axis: impl Fn(&Point) -> f32, init: f32, f: fn(f32, f32) -> f32) -> f32 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.points.iter().map(axis).fold(init, f)
    }

    /// Axis-aligned rectangle enclosing the polygon.
    pub fn bounding_rect(&self) -> Rect {
        Rect::new(self.x_min(), self.y_min(), self.x_max(), self.y_max())
    }

    /// Clamps every point into `[0, width] x [0, height]`.
    pub fn clip(&self, width: f32, height: f32) -> BoundingBox {
        Self::new(
            self.points
                .iter()
                .map(|p| Point::new(p.x.clamp(0.0, width), p.y.clamp(0.0, height)))
                .collect(),
        )
    }

    /// Returns a new bounding box translated by `(dx, dy)`.
    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self::new(
            self.points
                .iter()
                .map(|p| Point::new(p.x + dx, p.y + dy))
                .collect(),
        )
    }

    /// Convex hull by Andrew's monotone chain, counter-clockwise in a y-up frame.
    fn convex_hull(&self) -> Vec<Point> {
        let mut pts = self.points.clone();
        pts.sort_by(|a, b| {
            a.x.partial_cmp(&b.x)
                .unwrap_or(Ordering::Equal)
                .then(a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal))
        });
        pts.dedup();
        if pts.len() < 3 {
            return pts;
        }

        let cross = |o: &Point, a: &Point, b: &Point| (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x);
        let mut hull: Vec<Point> = Vec::with_capacity(pts.len() * 2);
        for pass in [pts.clone(), pts.iter().rev().copied().collect()] {
            let start = hull.len();
            for p in pass {
                while hull.len() >= start + 2
                    && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], &p) <= 0.0
                {
                    hull.pop();
                }
                hull.push(p);
            }
            hull.pop();
        }
        hull
    }

    /// Minimum-area enclosing rectangle by rotating each hull edge onto the x axis.
    ///
    /// Polygons with fewer than three distinct points yield their axis-aligned
    /// extent, which may have zero width or height.
    pub fn get_min_area_rect(&self) -> MinAreaRect {
        let hull = self.convex_hull();
        if hull.len() < 3 {
            let rect = self.bounding_rect();
            return MinAreaRect {
                center: Point::new(
                    (rect.x_min + rect.x_max) / 2.0,
                    (rect.y_min + rect.y_max) / 2.0,
                ),
                width: rect.width(),
                height: rect.height(),
                angle: 0.0,
            };
        }

        let mut best: Option<(f32, MinAreaRect)> = None;
        for (a, b) in hull.iter().circular_tuple_windows() {
            let len = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
            if len < f32::EPSILON {
                continue;
            }
            let (ux, uy) = ((b.x - a.x) / len, (b.y - a.y) / len);
            let (vx, vy) = (-uy, ux);

            let (u_min, u_max) = hull
                .iter()
                .map(|p| (p.x - a.x) * ux + (p.y - a.y) * uy)
                .minmax()
                .into_option()
                .unwrap_or((0.0, 0.0));
            let (v_min, v_max) = hull
                .iter()
                .map(|p| (p.x - a.x) * vx + (p.y - a.y) * vy)
                .minmax()
                .into_option()
                .unwrap_or((0.0, 0.0));

            let (width, height) = (u_max - u_min, v_max - v_min);
            let area = width * height;
            if best.as_ref().is_some_and(|(best_area, _)| area >= *best_area) {
                continue;
            }
            let (cu, cv) = ((u_min + u_max) / 2.0, (v_min + v_max) / 2.0);
            best = Some((
                area,
                MinAreaRect {
                    center: Point::new(a.x + cu * ux + cv * vx, a.y + cu * uy + cv * vy),
                    width,
                    height,
                    angle: uy.atan2(ux) * 180.0 / PI,
                },
            ));
        }

        best.map(|(_, rect)| rect).unwrap_or(MinAreaRect {
            center: Point::new(0.0, 0.0),
            width: 0.0,
            height: 0.0,
            angle: 0.0,
        })
    }

    /// Maps a box found on an orientation-corrected image back onto the original.
    ///
    /// # Arguments
    ///
    /// * `rotation_angle` - Angle reported by the orientation classifier (0, 90, 180, 270).
    /// * `rotated_width` - Width of the corrected image.
    /// * `rotated_height` - Height of the corrected image.
    ///
    /// # Returns
    ///
    /// The polygon in the original image's coordinate system.
    pub fn rotate_back_to_original(
        &self,
        rotation_angle: u32,
        rotated_width: u32,
        rotated_height: u32,
    ) -> BoundingBox {
        let (w, h) = (rotated_width as f32, rotated_height as f32);
        let points = self
            .points
            .iter()
            .map(|p| match rotation_angle {
                // Corrected by a counter-clockwise quarter turn.
                90 => Point::new(h - p.y, p.x),
                180 => Point::new(w - p.x, h - p.y),
                // Corrected by a clockwise quarter turn.
                270 => Point::new(p.y, w - p.x),
                _ => *p,
            })
            .collect();
        BoundingBox::new(points)
    }
}

/// A rotated rectangle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MinAreaRect {
    /// The center point of the rectangle.
    pub center: Point,
    /// The width of the rectangle.
    pub width: f32,
    /// The height of the rectangle.
    pub height: f32,
    /// The rotation angle of the rectangle in degrees.
    pub angle: f32,
}

impl MinAreaRect {
    /// Expands the rectangle outward along its normals.
    ///
    /// Every side moves out by `area * ratio / perimeter`, the offset distance
    /// used by DB text detectors. For `ratio >= 1.0` the result is never smaller
    /// than the input and grows monotonically with `ratio`.
    pub fn unclip(&self, ratio: f32) -> MinAreaRect {
        let perimeter = 2.0 * (self.width + self.height);
        if perimeter <= 0.0 || !ratio.is_finite() {
            return self.clone();
        }
        let distance = (self.width * self.height * ratio / perimeter).max(0.0);
        MinAreaRect {
            center: self.center,
            width: self.width + 2.0 * distance,
            height: self.height + 2.0 * distance,
            angle: self.angle,
        }
    }

    /// Corner points ordered top-left, top-right, bottom-right, bottom-left.
    pub fn get_box_points(&self) -> Vec<Point> {
        let (sin_a, cos_a) = (self.angle * PI / 180.0).sin_cos();
        let (hw, hh) = (self.width / 2.0, self.height / 2.0);
        let mut points: Vec<Point> = [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)]
            .iter()
            .map(|(x, y)| {
                Point::new(
                    x * cos_a - y * sin_a + self.center.x,
                    x * sin_a + y * cos_a + self.center.y,
                )
            })
            .collect();
        Self::sort_box_points(&mut points);
        points
    }

    /// Orders four corners the way text crops expect them.
    ///
    /// The two left-most points form the left edge; of those the upper one is
    /// top-left. Same for the right edge.
    fn sort_box_points(points: &mut [Point]) {
        if points.len() != 4 {
            return;
        }
        points.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
        let (mut tl, mut bl) = (points[0], points[1]);
        if bl.y < tl.y {
            std::mem::swap(&mut tl, &mut bl);
        }
        let (mut tr, mut br) = (points[2], points[3]);
        if br.y < tr.y {
            std::mem::swap(&mut tr, &mut br);
        }
        points.copy_from_slice(&[tl, tr, br, bl]);
    }

    /// Gets the length of the shorter side of the rectangle.
    pub fn min_side(&self) -> f32 {
        self.width.min(self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_overlap_ratio_min() {
        let big = Rect::new(0.0, 0.0, 100.0, 100.0);
        let inner = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert!((big.overlap_ratio_min(&inner) - 1.0).abs() < 1e-6);

        let apart = Rect::new(200.0, 200.0, 210.0, 210.0);
        assert_eq!(big.overlap_ratio_min(&apart), 0.0);

        let flat = Rect::new(5.0, 5.0, 5.0, 50.0);
        assert_eq!(big.overlap_ratio_min(&flat), 0.0);
    }

    #[test]
    fn test_rect_clip_and_window() {
        let rect = Rect::new(-5.0, 10.0, 120.0, 30.5);
        let clipped = rect.clip(100.0, 50.0);
        assert_eq!(clipped, Rect::new(0.0, 10.0, 100.0, 30.5));
        assert_eq!(rect.pixel_window(100, 50), Some((0, 10, 100, 21)));
        assert_eq!(Rect::new(200.0, 0.0, 300.0, 10.0).pixel_window(100, 50), None);
    }

    #[test]
    fn test_rect_serde_as_array() {
        let rect = Rect::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(serde_json::to_string(&rect).unwrap(), "[1.0,2.0,3.0,4.0]");
        let back: Rect = serde_json::from_str("[3.0,4.0,1.0,2.0]").unwrap();
        assert_eq!(back, rect);
    }

    #[test]
    fn test_bounding_box_area_and_extent() {
        let bbox = BoundingBox::from_coords(0.0, 0.0, 10.0, 5.0);
        assert_eq!(bbox.area(), 50.0);
        assert_eq!(bbox.perimeter(), 30.0);
        assert_eq!(bbox.bounding_rect(), Rect::new(0.0, 0.0, 10.0, 5.0));
        assert_eq!(BoundingBox::new(vec![]).x_max(), 0.0);
    }

    #[test]
    fn test_min_area_rect_of_rotated_square() {
        let diamond = BoundingBox::new(vec![
            Point::new(10.0, 0.0),
            Point::new(20.0, 10.0),
            Point::new(10.0, 20.0),
            Point::new(0.0, 10.0),
        ]);
        let rect = diamond.get_min_area_rect();
        assert!((rect.width * rect.height - 200.0).abs() < 1e-3);
        assert!((rect.center.x - 10.0).abs() < 1e-4);
        assert!((rect.center.y - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_min_area_rect_box_points_order() {
        let bbox = BoundingBox::from_coords(2.0, 3.0, 12.0, 7.0);
        let points = bbox.get_min_area_rect().get_box_points();
        assert!((points[0].x - 2.0).abs() < 1e-4 && (points[0].y - 3.0).abs() < 1e-4);
        assert!((points[2].x - 12.0).abs() < 1e-4 && (points[2].y - 7.0).abs() < 1e-4);
    }

    #[test]
    fn test_unclip_grows_monotonically() {
        let rect = MinAreaRect {
            center: Point::new(50.0, 20.0),
            width: 80.0,
            height: 16.0,
            angle: 0.0,
        };
        let small = rect.unclip(1.1);
        let large = rect.unclip(2.0);
        assert!(small.width > rect.width && small.height > rect.height);
        assert!(large.width > small.width && large.height > small.height);
        // 80*16*1.1 / 192
        assert!((small.height - (16.0 + 2.0 * 7.3333)).abs() < 1e-2);
    }

    #[test]
    fn test_unclip_degenerate_is_identity() {
        let rect = MinAreaRect {
            center: Point::new(0.0, 0.0),
            width: 0.0,
            height: 0.0,
            angle: 0.0,
        };
        assert_eq!(rect.unclip(1.5), rect);
    }

    #[test]
    fn test_rotate_back_to_original() {
        // Original 100x50; corrected image is 50x100 after a 90 degree correction.
        let bbox = BoundingBox::from_coords(0.0, 0.0, 10.0, 20.0);
        let back = bbox.rotate_back_to_original(90, 50, 100);
        assert_eq!(back.bounding_rect(), Rect::new(80.0, 0.0, 100.0, 10.0));

        let back = bbox.rotate_back_to_original(180, 100, 50);
        assert_eq!(back.bounding_rect(), Rect::new(90.0, 30.0, 100.0, 50.0));

        let back = bbox.rotate_back_to_original(270, 50, 100);
        assert_eq!(back.bounding_rect(), Rect::new(0.0, 40.0, 20.0, 50.0));

        assert_eq!(bbox.rotate_back_to_original(0, 10, 10), bbox);
    }
}
