//! Crop transforms for regions and text lines.
//!
//! Layout regions are cut out as axis-aligned windows. Text lines are
//! quadrilaterals that may be rotated, so they are rectified with a
//! perspective warp before recognition.

use crate::core::{OCRError, OcrResult};
use crate::processors::{BoundingBox, Point, Rect};
use image::{Rgb, RgbImage, imageops};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use std::cmp::Ordering;
use tracing::debug;

/// Aspect ratio (height over width) above which a rectified line is treated as vertical.
const VERTICAL_RATIO: f32 = 1.5;

/// Crops the pixels covered by `rect`, clipped to the image.
///
/// Returns `None` when nothing of the rectangle lies inside the image.
pub fn crop_rect(image: &RgbImage, rect: &Rect) -> Option<RgbImage> {
    let (x, y, w, h) = rect.pixel_window(image.width(), image.height())?;
    Some(imageops::crop_imm(image, x, y, w, h).to_image())
}

/// Orders four points as top-left, top-right, bottom-right, bottom-left.
fn order_quad(points: &[Point]) -> [Point; 4] {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
    let (left_top, left_bottom) = if sorted[1].y < sorted[0].y {
        (sorted[1], sorted[0])
    } else {
        (sorted[0], sorted[1])
    };
    let (right_top, right_bottom) = if sorted[3].y < sorted[2].y {
        (sorted[3], sorted[2])
    } else {
        (sorted[2], sorted[3])
    };
    [left_top, right_top, right_bottom, left_bottom]
}

fn distance(a: &Point, b: &Point) -> f32 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Rectifies the quadrilateral `quad` into an upright crop.
///
/// The output size is the longer of each pair of opposite edges. Crops much
/// taller than wide are rotated a quarter turn so vertical lines read left to
/// right.
///
/// # Errors
///
/// Returns `InvalidInput` when `quad` does not have four points, has zero
/// extent, or its corners are collinear.
pub fn get_rotate_crop_image(image: &RgbImage, quad: &BoundingBox) -> OcrResult<RgbImage> {
    if quad.points.len() != 4 {
        return Err(OCRError::InvalidInput {
            message: format!("text box must have 4 points, got {}", quad.points.len()),
        });
    }
    let [tl, tr, br, bl] = order_quad(&quad.points);

    let width = distance(&tl, &tr).max(distance(&bl, &br)).round() as u32;
    let height = distance(&tl, &bl).max(distance(&tr, &br)).round() as u32;
    if width == 0 || height == 0 {
        return Err(OCRError::InvalidInput {
            message: "text box has zero extent".to_string(),
        });
    }

    let (w, h) = (width as f32, height as f32);
    let projection = Projection::from_control_points(
        [(tl.x, tl.y), (tr.x, tr.y), (br.x, br.y), (bl.x, bl.y)],
        [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)],
    )
    .ok_or_else(|| OCRError::InvalidInput {
        message: "text box corners are degenerate".to_string(),
    })?;

    let mut crop = RgbImage::new(width, height);
    warp_into(
        image,
        &projection,
        Interpolation::Bicubic,
        Rgb([255, 255, 255]),
        &mut crop,
    );

    if crop.height() as f32 >= crop.width() as f32 * VERTICAL_RATIO {
        debug!(width, height, "rotating vertical text crop");
        return Ok(imageops::rotate270(&crop));
    }
    Ok(crop)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 0]))
    }

    #[test]
    fn test_crop_rect_clips_to_image() {
        let image = gradient(50, 40);
        let crop = crop_rect(&image, &Rect::new(40.0, 30.0, 80.0, 90.0)).unwrap();
        assert_eq!(crop.dimensions(), (10, 10));
        assert_eq!(crop.get_pixel(0, 0).0, [40, 30, 0]);
        assert!(crop_rect(&image, &Rect::new(60.0, 0.0, 70.0, 10.0)).is_none());
    }

    #[test]
    fn test_axis_aligned_quad_matches_plain_crop() {
        let image = gradient(100, 60);
        let quad = BoundingBox::from_coords(10.0, 20.0, 50.0, 30.0);
        let crop = get_rotate_crop_image(&image, &quad).unwrap();
        assert_eq!(crop.dimensions(), (40, 10));
        assert_eq!(crop.get_pixel(5, 5).0, [15, 25, 0]);
    }

    #[test]
    fn test_point_order_does_not_matter() {
        let image = gradient(100, 60);
        let shuffled = BoundingBox::new(vec![
            Point::new(50.0, 30.0),
            Point::new(10.0, 20.0),
            Point::new(10.0, 30.0),
            Point::new(50.0, 20.0),
        ]);
        let crop = get_rotate_crop_image(&image, &shuffled).unwrap();
        assert_eq!(crop.dimensions(), (40, 10));
    }

    #[test]
    fn test_vertical_crop_is_rotated() {
        let image = gradient(100, 100);
        let quad = BoundingBox::from_coords(10.0, 10.0, 20.0, 60.0);
        let crop = get_rotate_crop_image(&image, &quad).unwrap();
        assert_eq!(crop.dimensions(), (50, 10));
    }

    #[test]
    fn test_invalid_quads_are_rejected() {
        let image = gradient(10, 10);
        let triangle = BoundingBox::new(vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(5.0, 5.0),
        ]);
        assert!(get_rotate_crop_image(&image, &triangle).is_err());
        let flat = BoundingBox::from_coords(2.0, 2.0, 2.0, 8.0);
        assert!(get_rotate_crop_image(&image, &flat).is_err());
    }
}
