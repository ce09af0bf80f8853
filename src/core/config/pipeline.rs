//! Per-call pipeline parameters.
//!
//! Every numeric default here is a tunable constant, not an invariant; callers
//! override any field per request.

use serde::{Deserialize, Serialize};

/// Default cap on pages rendered by the draw and markdown outputs.
pub const DEFAULT_VISUAL_MAX_PAGES: usize = 2;
/// Default rasterization resolution for PDF pages.
pub const DEFAULT_PDF_DPI: f32 = 300.0;

/// Parameters of the OCR subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrParams {
    /// Binarization threshold of the text detection probability map.
    pub det_thresh: f32,
    /// Minimum mean probability inside a candidate box.
    pub box_thresh: f32,
    /// Expansion ratio applied to detected boxes, at least 1.0.
    pub unclip_ratio: f32,
    /// Whether orientation classification runs.
    pub use_cls: bool,
    /// Classifier confidence required before a rotation is applied.
    pub cls_thresh: f32,
    /// Recognized lines scoring below this are dropped.
    pub rec_score_thresh: f32,
    /// Whether overlapping OCR boxes are merged.
    pub merge_overlaps: bool,
    /// Overlap ratio (intersection over smaller area) at which OCR boxes merge.
    pub overlap_threshold: f32,
}

impl Default for OcrParams {
    fn default() -> Self {
        Self {
            det_thresh: 0.3,
            box_thresh: 0.6,
            unclip_ratio: 1.5,
            use_cls: true,
            cls_thresh: 0.9,
            rec_score_thresh: 0.0,
            merge_overlaps: false,
            overlap_threshold: 0.9,
        }
    }
}

impl OcrParams {
    /// Validates ranges, returning a configuration error for the first bad field.
    pub fn validate(&self) -> Result<(), crate::core::OCRError> {
        check_unit("det_thresh", self.det_thresh)?;
        check_unit("box_thresh", self.box_thresh)?;
        check_unit("cls_thresh", self.cls_thresh)?;
        check_unit("rec_score_thresh", self.rec_score_thresh)?;
        check_unit("overlap_threshold", self.overlap_threshold)?;
        if !self.unclip_ratio.is_finite() || self.unclip_ratio < 1.0 {
            return Err(crate::core::OCRError::invalid_field(
                "unclip_ratio",
                "a finite value >= 1.0",
                self.unclip_ratio.to_string(),
            ));
        }
        Ok(())
    }
}

/// Parameters of the structure pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureParams {
    /// Layout regions below this confidence are dropped.
    pub layout_conf_threshold: f32,
    /// Whether overlapping same-type layout regions are merged.
    pub merge_layout: bool,
    /// Overlap ratio at which layout regions merge.
    pub layout_overlap_threshold: f32,
    /// Whether tables go to the table recognizer instead of OCR.
    pub use_table_recognition: bool,
    /// OCR lines inside a region below this confidence are discarded.
    pub region_text_min_confidence: f32,
    /// Parameters forwarded to the OCR subsystem.
    pub ocr: OcrParams,
}

impl Default for StructureParams {
    fn default() -> Self {
        Self {
            layout_conf_threshold: 0.5,
            merge_layout: false,
            layout_overlap_threshold: 0.9,
            use_table_recognition: false,
            region_text_min_confidence: 0.5,
            ocr: OcrParams::default(),
        }
    }
}

impl StructureParams {
    /// Validates ranges of this struct and the nested OCR parameters.
    pub fn validate(&self) -> Result<(), crate::core::OCRError> {
        check_unit("layout_conf_threshold", self.layout_conf_threshold)?;
        check_unit("layout_overlap_threshold", self.layout_overlap_threshold)?;
        check_unit("region_text_min_confidence", self.region_text_min_confidence)?;
        self.ocr.validate()
    }
}

/// PDF rasterization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Rendering resolution.
    pub dpi: f32,
    /// Longest allowed side of a rendered page in pixels.
    pub max_dimension: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_PDF_DPI,
            max_dimension: 8000,
        }
    }
}

fn check_unit(field: &str, value: f32) -> Result<(), crate::core::OCRError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(crate::core::OCRError::invalid_field(
            field,
            "a value in [0, 1]",
            value.to_string(),
        ))
    }
}
