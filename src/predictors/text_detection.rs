//! Text Detection Predictor
//!
//! Runs a DB text detection model and turns its probability map into
//! quadrilateral text boxes with [`DBPostProcess`].

use crate::core::config::{OcrParams, OrtSessionConfig};
use crate::core::traits::TextDetector;
use crate::core::{OcrResult, OrtInfer};
use crate::processors::{BoundingBox, DBPostProcess, LimitType, NormalizeImage};
use image::RgbImage;
use image::imageops::{self, FilterType};
use ndarray::{Axis, Ix2};
use std::path::Path;
use tracing::debug;

/// Model input dimensions for a `width x height` image.
///
/// The limited side is scaled to `limit_side_len` (down for [`LimitType::Max`],
/// up for [`LimitType::Min`]) and both sides are rounded to a multiple of 32,
/// never below 32.
pub fn det_resize_dims(
    width: u32,
    height: u32,
    limit_side_len: u32,
    limit_type: LimitType,
) -> (u32, u32) {
    let (w, h) = (width.max(1) as f32, height.max(1) as f32);
    let limit = limit_side_len as f32;
    let ratio = match limit_type {
        LimitType::Max if w.max(h) > limit => limit / w.max(h),
        LimitType::Min if w.min(h) < limit => limit / w.min(h),
        _ => 1.0,
    };
    let round32 = |side: f32| (((side * ratio) / 32.0).round() as u32 * 32).max(32);
    (round32(w), round32(h))
}

/// Text detection predictor
#[derive(Debug)]
pub struct TextDetectionPredictor {
    inference: OrtInfer,
    normalizer: NormalizeImage,
    limit_side_len: u32,
    limit_type: LimitType,
    max_candidates: usize,
}

impl TextDetectionPredictor {
    pub fn builder() -> TextDetectionPredictorBuilder {
        TextDetectionPredictorBuilder::new()
    }
}

impl TextDetector for TextDetectionPredictor {
    fn detect(&self, image: &RgbImage, params: &OcrParams) -> OcrResult<Vec<(BoundingBox, f32)>> {
        let (src_w, src_h) = image.dimensions();
        if src_w == 0 || src_h == 0 {
            return Ok(Vec::new());
        }
        let (w, h) = det_resize_dims(src_w, src_h, self.limit_side_len, self.limit_type);
        let resized = imageops::resize(image, w, h, FilterType::Triangle);
        let tensor = self.normalizer.apply(&resized).insert_axis(Axis(0));

        let output = self.inference.run(tensor.into_dyn())?;
        // [1, 1, H, W] -> [H, W]
        let mut map = output.view();
        while map.ndim() > 2 {
            map = map.index_axis_move(Axis(0), 0);
        }
        let map = map.into_dimensionality::<Ix2>()?;

        let mut post = DBPostProcess::new(params.det_thresh, params.box_thresh, params.unclip_ratio);
        post.max_candidates = self.max_candidates;
        let boxes = post.apply(&map, src_w, src_h);
        debug!(boxes = boxes.len(), input_w = w, input_h = h, "text detection done");
        Ok(boxes)
    }
}

/// Builder for text detection predictor
#[derive(Debug)]
pub struct TextDetectionPredictorBuilder {
    limit_side_len: u32,
    limit_type: LimitType,
    max_candidates: usize,
    ort_config: Option<OrtSessionConfig>,
}

impl TextDetectionPredictorBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            limit_side_len: 960,
            limit_type: LimitType::Max,
            max_candidates: 1000,
            ort_config: None,
        }
    }

    /// Set the side length limit
    pub fn limit_side_len(mut self, len: u32) -> Self {
        self.limit_side_len = len;
        self
    }

    /// Set which side the limit applies to
    pub fn limit_type(mut self, limit_type: LimitType) -> Self {
        self.limit_type = limit_type;
        self
    }

    /// Set the maximum candidates
    pub fn max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = max;
        self
    }

    pub fn ort_config(mut self, config: OrtSessionConfig) -> Self {
        self.ort_config = Some(config);
        self
    }

    /// Build the text detection predictor
    pub fn build<P: AsRef<Path>>(self, model_path: P) -> OcrResult<TextDetectionPredictor> {
        let inference = OrtInfer::from_file(model_path, "text_detection", self.ort_config.as_ref())?;
        Ok(TextDetectionPredictor {
            inference,
            normalizer: NormalizeImage::imagenet_bgr(),
            limit_side_len: self.limit_side_len,
            limit_type: self.limit_type,
            max_candidates: self.max_candidates,
        })
    }
}

impl Default for TextDetectionPredictorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_dims_limit_max() {
        assert_eq!(det_resize_dims(1920, 1080, 960, LimitType::Max), (960, 544));
        // Small images keep their size, rounded to 32.
        assert_eq!(det_resize_dims(100, 50, 960, LimitType::Max), (96, 64));
    }

    #[test]
    fn test_resize_dims_limit_min() {
        assert_eq!(det_resize_dims(100, 50, 736, LimitType::Min), (1472, 736));
    }

    #[test]
    fn test_resize_dims_never_below_32() {
        assert_eq!(det_resize_dims(4, 4, 960, LimitType::Max), (32, 32));
        assert_eq!(det_resize_dims(0, 0, 960, LimitType::Max), (32, 32));
    }
}
