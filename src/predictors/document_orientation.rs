//! Document Orientation Predictor
//!
//! PP-LCNet document orientation classifier. Pages are resized so the short
//! side is 256, center-cropped to 224 and classified into 0/90/180/270.

use crate::core::config::OrtSessionConfig;
use crate::core::traits::OrientationClassifier;
use crate::core::{OcrResult, OrtInfer};
use crate::predictors::{classify_rows, stack_batch};
use crate::processors::NormalizeImage;
use image::RgbImage;
use image::imageops::{self, FilterType};
use std::path::Path;

/// Angles reported by the classifier, in class order.
pub const DOCUMENT_ORIENTATION_ANGLES: [u32; 4] = [0, 90, 180, 270];

const RESIZE_SHORT: u32 = 256;
const CROP_SIZE: u32 = 224;

/// Resizes so the short side is `short`, keeping the aspect ratio.
pub(crate) fn resize_short(image: &RgbImage, short: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    let scale = short as f32 / w.min(h).max(1) as f32;
    let new_w = ((w as f32 * scale).round() as u32).max(1);
    let new_h = ((h as f32 * scale).round() as u32).max(1);
    imageops::resize(image, new_w, new_h, FilterType::Triangle)
}

/// Crops a centered `size x size` window, or the whole image when smaller.
pub(crate) fn center_crop(image: &RgbImage, size: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    let (crop_w, crop_h) = (size.min(w), size.min(h));
    let x = (w - crop_w) / 2;
    let y = (h - crop_h) / 2;
    imageops::crop_imm(image, x, y, crop_w, crop_h).to_image()
}

/// Document orientation predictor
#[derive(Debug)]
pub struct DocumentOrientationPredictor {
    inference: OrtInfer,
    normalizer: NormalizeImage,
}

impl DocumentOrientationPredictor {
    /// Loads the classifier from `model_path`.
    pub fn new(model_path: impl AsRef<Path>, ort_config: Option<&OrtSessionConfig>) -> OcrResult<Self> {
        Ok(Self {
            inference: OrtInfer::from_file(model_path, "document_orientation", ort_config)?,
            normalizer: NormalizeImage::imagenet_bgr(),
        })
    }
}

impl OrientationClassifier for DocumentOrientationPredictor {
    fn classify(&self, images: &[RgbImage]) -> OcrResult<Vec<(u32, f32)>> {
        if images.is_empty() {
            return Ok(Vec::new());
        }
        let tensors = images
            .iter()
            .map(|img| {
                let cropped = center_crop(&resize_short(img, RESIZE_SHORT), CROP_SIZE);
                // Pages smaller than the crop are stretched to the input size.
                let input = if cropped.dimensions() == (CROP_SIZE, CROP_SIZE) {
                    cropped
                } else {
                    imageops::resize(&cropped, CROP_SIZE, CROP_SIZE, FilterType::Triangle)
                };
                self.normalizer.apply(&input)
            })
            .collect::<Vec<_>>();
        let output = self.inference.run(stack_batch(&tensors)?.into_dyn())?;
        classify_rows(output.view(), &DOCUMENT_ORIENTATION_ANGLES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_short_then_center_crop() {
        let page = RgbImage::new(1000, 500);
        let resized = resize_short(&page, RESIZE_SHORT);
        assert_eq!(resized.dimensions(), (512, 256));
        let cropped = center_crop(&resized, CROP_SIZE);
        assert_eq!(cropped.dimensions(), (224, 224));
    }

    #[test]
    fn test_center_crop_smaller_image() {
        let tiny = RgbImage::new(100, 50);
        assert_eq!(center_crop(&tiny, CROP_SIZE).dimensions(), (100, 50));
    }
}
