//! Text Line Orientation Predictor
//!
//! PP-LCNet text-line classifier deciding whether a cropped line is upside down.

use crate::core::config::OrtSessionConfig;
use crate::core::traits::OrientationClassifier;
use crate::core::{OcrResult, OrtInfer};
use crate::predictors::{classify_rows, stack_batch};
use crate::processors::NormalizeImage;
use image::RgbImage;
use image::imageops::{self, FilterType};
use std::path::Path;

/// Angles reported by the classifier, in class order.
pub const TEXT_LINE_ANGLES: [u32; 2] = [0, 180];

/// Input size (height, width).
const INPUT_SHAPE: (u32, u32) = (80, 160);

/// Text line orientation predictor
#[derive(Debug)]
pub struct TextLineOrientationPredictor {
    inference: OrtInfer,
    normalizer: NormalizeImage,
    batch_size: usize,
}

impl TextLineOrientationPredictor {
    /// Loads the classifier from `model_path`.
    pub fn new(model_path: impl AsRef<Path>, ort_config: Option<&OrtSessionConfig>) -> OcrResult<Self> {
        Ok(Self {
            inference: OrtInfer::from_file(model_path, "text_line_orientation", ort_config)?,
            normalizer: NormalizeImage::imagenet_bgr(),
            batch_size: 6,
        })
    }
}

impl OrientationClassifier for TextLineOrientationPredictor {
    fn classify(&self, images: &[RgbImage]) -> OcrResult<Vec<(u32, f32)>> {
        let (h, w) = INPUT_SHAPE;
        let mut results = Vec::with_capacity(images.len());
        for chunk in images.chunks(self.batch_size) {
            let tensors = chunk
                .iter()
                .map(|img| {
                    self.normalizer
                        .apply(&imageops::resize(img, w, h, FilterType::Triangle))
                })
                .collect::<Vec<_>>();
            let output = self.inference.run(stack_batch(&tensors)?.into_dyn())?;
            results.extend(classify_rows(output.view(), &TEXT_LINE_ANGLES)?);
        }
        Ok(results)
    }
}
