//! Model roles used by the pipeline.
//!
//! Each role is a trait so the pipeline can run against the ONNX predictors in
//! production and against lightweight fakes in tests. Every role must be safe
//! to share between concurrent requests.

use crate::core::config::OcrParams;
use crate::core::errors::OcrResult;
use crate::domain::{FormulaResult, LayoutRegion, TableStructure};
use crate::processors::BoundingBox;
use image::RgbImage;

/// Detects layout regions on a page.
pub trait LayoutDetector: Send + Sync {
    /// Returns regions with `confidence >= conf_threshold`, in original image
    /// coordinates and with no content.
    fn detect(&self, image: &RgbImage, conf_threshold: f32) -> OcrResult<Vec<LayoutRegion>>;
}

/// Detects text lines as quadrilaterals.
pub trait TextDetector: Send + Sync {
    /// Returns expanded text boxes in `image` coordinates with their box scores.
    fn detect(&self, image: &RgbImage, params: &OcrParams) -> OcrResult<Vec<(BoundingBox, f32)>>;
}

/// Recognizes the text of cropped lines.
pub trait TextRecognizer: Send + Sync {
    /// Returns one `(text, confidence)` per crop, in input order.
    fn recognize(&self, crops: &[RgbImage]) -> OcrResult<Vec<(String, f32)>>;
}

/// Classifies image orientation.
pub trait OrientationClassifier: Send + Sync {
    /// Returns one `(angle in degrees, confidence)` per image, in input order.
    fn classify(&self, images: &[RgbImage]) -> OcrResult<Vec<(u32, f32)>>;
}

/// Recognizes table structure.
pub trait TableRecognizer: Send + Sync {
    fn recognize(&self, crop: &RgbImage) -> OcrResult<TableStructure>;
}

/// Recognizes formulas as LaTeX.
pub trait FormulaRecognizer: Send + Sync {
    fn recognize(&self, crop: &RgbImage) -> OcrResult<FormulaResult>;
}

/// Converts a chart into a textual data table.
pub trait ChartRecognizer: Send + Sync {
    fn recognize(&self, crop: &RgbImage) -> OcrResult<String>;
}
