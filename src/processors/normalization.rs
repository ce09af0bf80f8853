//! Image normalization into CHW float tensors.
//!
//! Every model in the pipeline consumes `(pixel * scale - mean) / std` in CHW
//! layout; only the constants and channel order differ.

use crate::core::OCRError;
use crate::processors::types::ColorOrder;
use image::RgbImage;
use ndarray::{Array3, ArrayViewMut3};

/// Per-channel affine normalization, precomputed as `alpha * x + beta`.
#[derive(Debug, Clone)]
pub struct NormalizeImage {
    /// Scaling factors for each output channel (alpha = scale / std)
    pub alpha: [f32; 3],
    /// Offset values for each output channel (beta = -mean / std)
    pub beta: [f32; 3],
    /// Channel order written into the tensor
    pub color_order: ColorOrder,
}

impl NormalizeImage {
    /// Creates a normalizer.
    ///
    /// `mean` and `std` are given in the **output channel order**: for BGR
    /// output pass `[B, G, R]` statistics.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `scale` or any `std` entry is not positive.
    pub fn new(
        scale: f32,
        mean: [f32; 3],
        std: [f32; 3],
        color_order: ColorOrder,
    ) -> Result<Self, OCRError> {
        if !(scale > 0.0) {
            return Err(OCRError::ConfigError {
                message: "Scale must be greater than 0".to_string(),
            });
        }
        if let Some((i, s)) = std.iter().enumerate().find(|(_, s)| !(**s > 0.0)) {
            return Err(OCRError::ConfigError {
                message: format!("Standard deviation at index {i} must be greater than 0, got {s}"),
            });
        }
        Ok(Self {
            alpha: [scale / std[0], scale / std[1], scale / std[2]],
            beta: [-mean[0] / std[0], -mean[1] / std[1], -mean[2] / std[2]],
            color_order,
        })
    }

    /// ImageNet statistics on BGR input, as used by text detection and PP-LCNet.
    pub fn imagenet_bgr() -> Self {
        Self::from_constants([0.485, 0.456, 0.406], [0.229, 0.224, 0.225])
    }

    /// `(x / 255 - 0.5) / 0.5` on BGR input, as used by text recognition.
    pub fn for_ocr_recognition() -> Self {
        Self::from_constants([0.5, 0.5, 0.5], [0.5, 0.5, 0.5])
    }

    /// `x / 255` on BGR input, as used by PP-DocLayout.
    pub fn unit_scale_bgr() -> Self {
        Self::from_constants([0.0, 0.0, 0.0], [1.0, 1.0, 1.0])
    }

    fn from_constants(mean: [f32; 3], std: [f32; 3]) -> Self {
        let scale = 1.0 / 255.0;
        Self {
            alpha: [scale / std[0], scale / std[1], scale / std[2]],
            beta: [-mean[0] / std[0], -mean[1] / std[1], -mean[2] / std[2]],
            color_order: ColorOrder::BGR,
        }
    }

    /// Normalizes an image into a new `3 x H x W` tensor.
    pub fn apply(&self, img: &RgbImage) -> Array3<f32> {
        let (w, h) = img.dimensions();
        let mut out = Array3::<f32>::zeros((3, h as usize, w as usize));
        self.apply_into(img, out.view_mut());
        out
    }

    /// Writes the normalized image into the top-left corner of `out`.
    ///
    /// `out` must be `3 x H' x W'` with `H' >= H` and `W' >= W`; the rest of the
    /// tensor is left untouched, which gives right/bottom zero padding.
    pub fn apply_into(&self, img: &RgbImage, mut out: ArrayViewMut3<f32>) {
        let channel_map = match self.color_order {
            ColorOrder::RGB => [0usize, 1, 2],
            ColorOrder::BGR => [2usize, 1, 0],
        };
        let (_, out_h, out_w) = out.dim();
        for (x, y, pixel) in img.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            if x >= out_w || y >= out_h {
                continue;
            }
            for (c, &src) in channel_map.iter().enumerate() {
                out[[c, y, x]] = pixel[src] as f32 * self.alpha[c] + self.beta[c];
            }
        }
    }
}
