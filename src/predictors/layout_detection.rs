//! Layout Detection Predictor
//!
//! PP-DocLayout models take a stretch-resized page and report boxes already
//! mapped back to original pixels through the `scale_factor` input.

use crate::core::config::{LayoutVariant, OrtSessionConfig};
use crate::core::traits::LayoutDetector;
use crate::core::{OcrResult, OrtInfer};
use crate::domain::{LayoutRegion, RegionType};
use crate::processors::{NormalizeImage, Rect};
use image::RgbImage;
use image::imageops::{self, FilterType};
use ndarray::{Array2, ArrayD, Axis};
use std::path::Path;
use tracing::debug;

const PP_DOCLAYOUT_LABELS: [&str; 23] = [
    "paragraph_title",
    "image",
    "text",
    "number",
    "abstract",
    "content",
    "figure_title",
    "formula",
    "table",
    "table_title",
    "reference",
    "doc_title",
    "footnote",
    "header",
    "algorithm",
    "footer",
    "seal",
    "chart_title",
    "chart",
    "formula_number",
    "header_image",
    "footer_image",
    "aside_text",
];

const PP_DOCLAYOUT_PLUS_LABELS: [&str; 20] = [
    "paragraph_title",
    "image",
    "text",
    "number",
    "abstract",
    "content",
    "figure_title",
    "formula",
    "table",
    "reference",
    "doc_title",
    "footnote",
    "header",
    "algorithm",
    "footer",
    "seal",
    "chart",
    "formula_number",
    "aside_text",
    "reference_content",
];

/// Label table and input size of a layout model variant.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutModelConfig {
    /// Model name used in logs.
    pub model_name: &'static str,
    /// Class id to label.
    pub class_labels: &'static [&'static str],
    /// Fixed input size (height, width).
    pub input_size: (u32, u32),
}

impl LayoutModelConfig {
    /// Configuration of a PP-DocLayout variant.
    pub fn for_variant(variant: LayoutVariant) -> Self {
        match variant {
            LayoutVariant::S => Self {
                model_name: "PP-DocLayout-S",
                class_labels: &PP_DOCLAYOUT_LABELS,
                input_size: (480, 480),
            },
            LayoutVariant::M => Self {
                model_name: "PP-DocLayout-M",
                class_labels: &PP_DOCLAYOUT_LABELS,
                input_size: (640, 640),
            },
            LayoutVariant::L => Self {
                model_name: "PP-DocLayout-L",
                class_labels: &PP_DOCLAYOUT_LABELS,
                input_size: (640, 640),
            },
            LayoutVariant::PlusL => Self {
                model_name: "PP-DocLayout_plus-L",
                class_labels: &PP_DOCLAYOUT_PLUS_LABELS,
                input_size: (800, 800),
            },
        }
    }

    /// Label of a class id, `None` for ids outside the table.
    pub fn label(&self, class_id: f32) -> Option<&'static str> {
        if !(class_id >= 0.0) {
            return None;
        }
        self.class_labels.get(class_id.round() as usize).copied()
    }
}

/// Converts raw detection rows `[class_id, score, x1, y1, x2, y2]` into regions.
///
/// Rows below `threshold`, with unknown class ids, or that are empty once
/// clipped to the image are dropped. A score equal to the threshold is kept.
pub fn decode_layout_output(
    output: &ArrayD<f32>,
    config: &LayoutModelConfig,
    image_width: u32,
    image_height: u32,
    threshold: f32,
) -> Vec<LayoutRegion> {
    let Some(&row_len) = output.shape().last() else {
        return Vec::new();
    };
    if row_len < 6 {
        return Vec::new();
    }
    let data: Vec<f32> = output.iter().copied().collect();
    data.chunks_exact(row_len)
        .filter_map(|row| {
            let score = row[1];
            if !(score >= threshold) {
                return None;
            }
            let label = config.label(row[0])?;
            let bbox = Rect::new(row[2], row[3], row[4], row[5])
                .clip(image_width as f32, image_height as f32);
            if bbox.is_degenerate() {
                return None;
            }
            Some(LayoutRegion::new(bbox, RegionType::from_label(label), score).with_label(label))
        })
        .collect()
}

/// Layout detection predictor
#[derive(Debug)]
pub struct LayoutDetectionPredictor {
    inference: OrtInfer,
    config: LayoutModelConfig,
    normalizer: NormalizeImage,
}

impl LayoutDetectionPredictor {
    pub fn builder() -> LayoutDetectionPredictorBuilder {
        LayoutDetectionPredictorBuilder::new()
    }

    /// Label table and input size in use.
    pub fn config(&self) -> &LayoutModelConfig {
        &self.config
    }

    /// Resizes and normalizes a page into a `1 x 3 x H x W` tensor.
    ///
    /// Returns the tensor and the `[h_scale, w_scale]` factors.
    fn preprocess(&self, image: &RgbImage) -> OcrResult<(ArrayD<f32>, [f32; 2])> {
        let (target_h, target_w) = self.config.input_size;
        let resized = imageops::resize(image, target_w, target_h, FilterType::Triangle);
        let scale = [
            target_h as f32 / image.height().max(1) as f32,
            target_w as f32 / image.width().max(1) as f32,
        ];
        let tensor = self.normalizer.apply(&resized).insert_axis(Axis(0));
        Ok((tensor.into_dyn(), scale))
    }
}

impl LayoutDetector for LayoutDetectionPredictor {
    fn detect(&self, image: &RgbImage, conf_threshold: f32) -> OcrResult<Vec<LayoutRegion>> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }
        let (tensor, scale) = self.preprocess(image)?;
        let (target_h, target_w) = self.config.input_size;
        let im_shape = Array2::from_shape_vec((1, 2), vec![target_h as f32, target_w as f32])?;
        let scale_factor = Array2::from_shape_vec((1, 2), scale.to_vec())?;

        let output = self.inference.run_named(vec![
            ("im_shape".to_string(), im_shape.into_dyn()),
            ("image".to_string(), tensor),
            ("scale_factor".to_string(), scale_factor.into_dyn()),
        ])?;
        let regions = decode_layout_output(
            &output,
            &self.config,
            image.width(),
            image.height(),
            conf_threshold,
        );
        debug!(
            model = self.config.model_name,
            regions = regions.len(),
            "layout detection done"
        );
        Ok(regions)
    }
}

/// Builder for [`LayoutDetectionPredictor`].
#[derive(Debug, Default)]
pub struct LayoutDetectionPredictorBuilder {
    variant: LayoutVariant,
    ort_config: Option<OrtSessionConfig>,
}

impl LayoutDetectionPredictorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the model variant, which fixes labels and input size.
    pub fn variant(mut self, variant: LayoutVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn ort_config(mut self, config: OrtSessionConfig) -> Self {
        self.ort_config = Some(config);
        self
    }

    pub fn build<P: AsRef<Path>>(self, model_path: P) -> OcrResult<LayoutDetectionPredictor> {
        let config = LayoutModelConfig::for_variant(self.variant);
        let inference =
            OrtInfer::from_file(model_path, config.model_name, self.ort_config.as_ref())?;
        Ok(LayoutDetectionPredictor {
            inference,
            config,
            normalizer: NormalizeImage::unit_scale_bgr(),
        })
    }
}
