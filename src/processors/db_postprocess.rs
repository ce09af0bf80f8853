//! Post-processing for DB (Differentiable Binarization) text detection models.
//!
//! [`DBPostProcess`] turns one probability map into quadrilateral text boxes:
//! threshold, contour extraction, minimum-area rectangle, mean-probability score,
//! unclip, and rescale to the source image.

use crate::processors::geometry::{BoundingBox, Point};
use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use ndarray::ArrayView2;
use std::cmp::Ordering;

/// Post-processor for DB text detection output.
#[derive(Debug, Clone)]
pub struct DBPostProcess {
    /// Threshold for binarizing the prediction map.
    pub thresh: f32,
    /// Minimum mean probability inside a candidate box.
    pub box_thresh: f32,
    /// Ratio used to expand boxes after scoring.
    pub unclip_ratio: f32,
    /// Maximum number of contours considered per map.
    pub max_candidates: usize,
    /// Minimum side length of a kept box, in map pixels.
    pub min_size: f32,
    /// Whether to dilate the binary mask before contour extraction.
    pub use_dilation: bool,
}

impl Default for DBPostProcess {
    fn default() -> Self {
        Self::new(0.3, 0.6, 1.5)
    }
}

impl DBPostProcess {
    /// Creates a post-processor with the given thresholds.
    pub fn new(thresh: f32, box_thresh: f32, unclip_ratio: f32) -> Self {
        Self {
            thresh,
            box_thresh,
            unclip_ratio,
            max_candidates: 1000,
            min_size: 3.0,
            use_dilation: false,
        }
    }

    /// Enables or disables mask dilation.
    pub fn with_dilation(mut self, use_dilation: bool) -> Self {
        self.use_dilation = use_dilation;
        self
    }

    /// Extracts text boxes from a probability map.
    ///
    /// # Arguments
    ///
    /// * `pred` - Probability map, `height x width`.
    /// * `src_w` - Width of the image the boxes should be mapped onto.
    /// * `src_h` - Height of the image the boxes should be mapped onto.
    ///
    /// # Returns
    ///
    /// Boxes in source-image pixels with their scores. An empty or all-background
    /// map yields an empty list.
    pub fn apply(&self, pred: &ArrayView2<f32>, src_w: u32, src_h: u32) -> Vec<(BoundingBox, f32)> {
        let (height, width) = pred.dim();
        if height == 0 || width == 0 {
            return Vec::new();
        }

        let mut mask = GrayImage::new(width as u32, height as u32);
        for ((y, x), &value) in pred.indexed_iter() {
            if value > self.thresh {
                mask.put_pixel(x as u32, y as u32, Luma([255]));
            }
        }
        if self.use_dilation {
            mask = morphology::dilate(&mask, Norm::LInf, 1);
        }

        let scale_x = src_w as f32 / width as f32;
        let scale_y = src_h as f32 / height as f32;
        let mut results = Vec::new();

        let contours = find_contours::<u32>(&mask);
        for contour in contours
            .iter()
            .filter(|c| c.border_type == BorderType::Outer)
            .take(self.max_candidates)
        {
            let rect = BoundingBox::from_contour(contour).get_min_area_rect();
            if rect.min_side() < self.min_size {
                continue;
            }

            let quad = BoundingBox::new(rect.get_box_points());
            let score = box_score_fast(pred, &quad);
            if score < self.box_thresh {
                continue;
            }

            let expanded = rect.unclip(self.unclip_ratio);
            if expanded.min_side() < self.min_size + 2.0 {
                continue;
            }

            let points = expanded
                .get_box_points()
                .into_iter()
                .map(|p| {
                    Point::new(
                        (p.x * scale_x).round().clamp(0.0, src_w as f32),
                        (p.y * scale_y).round().clamp(0.0, src_h as f32),
                    )
                })
                .collect();
            results.push((BoundingBox::new(points), score));
        }

        tracing::debug!(
            contours = contours.len(),
            kept = results.len(),
            map_w = width,
            map_h = height,
            "db post-process"
        );
        results
    }
}

/// Mean probability of the map pixels whose centers fall inside `quad`.
fn box_score_fast(pred: &ArrayView2<f32>, quad: &BoundingBox) -> f32 {
    let (height, width) = pred.dim();
    let y_start = quad.y_min().floor().max(0.0) as usize;
    let y_end = (quad.y_max().ceil().max(0.0) as usize).min(height);
    let x_start = quad.x_min().floor().max(0.0) as usize;
    let x_end = (quad.x_max().ceil().max(0.0) as usize).min(width);

    let mut crossings: Vec<f32> = Vec::with_capacity(quad.points.len());
    let mut sum = 0.0f32;
    let mut count = 0usize;

    for y in y_start..y_end {
        let yc = y as f32 + 0.5;
        crossings.clear();
        let n = quad.points.len();
        for i in 0..n {
            let (a, b) = (quad.points[i], quad.points[(i + 1) % n]);
            if (a.y <= yc && yc < b.y) || (b.y <= yc && yc < a.y) {
                crossings.push(a.x + (yc - a.y) * (b.x - a.x) / (b.y - a.y));
            }
        }
        crossings.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        for span in crossings.chunks_exact(2) {
            for x in x_start..x_end {
                let xc = x as f32 + 0.5;
                if xc >= span[0] && xc < span[1] {
                    sum += pred[[y, x]];
                    count += 1;
                }
            }
        }
    }

    if count == 0 { 0.0 } else { sum / count as f32 }
}
