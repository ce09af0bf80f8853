//! Text Recognition Predictor
//!
//! CTC recognition over cropped text lines. Crops are resized to a fixed
//! height, batched by aspect ratio and padded on the right.

use crate::core::config::OrtSessionConfig;
use crate::core::traits::TextRecognizer;
use crate::core::{OCRError, OcrResult, OrtInfer};
use crate::predictors::{argmax, stack_batch};
use crate::processors::NormalizeImage;
use image::RgbImage;
use image::imageops::{self, FilterType};
use ndarray::{Array3, ArrayView2, Axis, Ix3, s};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Input height of the recognition model.
pub const REC_IMAGE_HEIGHT: u32 = 48;
/// Narrowest batch width.
pub const REC_MIN_WIDTH: u32 = 320;

/// Greedy CTC decoder over a character dictionary.
///
/// Index 0 is the blank; dictionary characters follow in file order and a
/// space is appended as the last class.
#[derive(Debug, Clone)]
pub struct CtcDecoder {
    characters: Vec<String>,
}

impl CtcDecoder {
    /// Builds a decoder from dictionary lines.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut characters = vec![String::new()];
        characters.extend(lines.into_iter().map(Into::into));
        characters.push(" ".to_string());
        Self { characters }
    }

    /// Reads a dictionary file with one character per line.
    pub fn from_dict_file(path: impl AsRef<Path>) -> OcrResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let lines = content
            .lines()
            .map(|line| line.trim_end_matches('\r').to_string());
        Ok(Self::from_lines(lines))
    }

    /// Number of classes including blank and space.
    pub fn num_classes(&self) -> usize {
        self.characters.len()
    }

    /// Decodes a `[time, classes]` probability matrix.
    ///
    /// Blanks and repeated indices are collapsed; the score is the mean
    /// probability of the kept steps, or 0 when nothing was kept.
    pub fn decode(&self, probs: ArrayView2<'_, f32>) -> (String, f32) {
        let mut text = String::new();
        let mut kept = Vec::new();
        let mut previous = None;
        for step in probs.outer_iter() {
            let (index, prob) = argmax(step);
            if index != 0
                && previous != Some(index)
                && let Some(ch) = self.characters.get(index)
            {
                text.push_str(ch);
                kept.push(prob);
            }
            previous = Some(index);
        }
        if kept.is_empty() {
            return (String::new(), 0.0);
        }
        let score = kept.iter().sum::<f32>() / kept.len() as f32;
        (text, score)
    }
}

/// Width a crop is resized to at the model height, capped by the batch width.
fn resized_width(image: &RgbImage, batch_width: u32) -> u32 {
    let ratio = image.width() as f32 / image.height().max(1) as f32;
    ((REC_IMAGE_HEIGHT as f32 * ratio).ceil() as u32).clamp(1, batch_width)
}

/// Batch width for a set of crops: the widest aspect ratio, at least [`REC_MIN_WIDTH`].
pub fn batch_width(images: &[&RgbImage]) -> u32 {
    let max_ratio = images
        .iter()
        .map(|img| img.width() as f32 / img.height().max(1) as f32)
        .fold(0.0, f32::max);
    ((REC_IMAGE_HEIGHT as f32 * max_ratio).ceil() as u32).max(REC_MIN_WIDTH)
}

/// Text recognition predictor
#[derive(Debug)]
pub struct TextRecognitionPredictor {
    inference: OrtInfer,
    decoder: CtcDecoder,
    normalizer: NormalizeImage,
    batch_size: usize,
}

impl TextRecognitionPredictor {
    /// Create a new builder for the text recognition predictor
    pub fn builder() -> TextRecognitionPredictorBuilder {
        TextRecognitionPredictorBuilder::new()
    }

    fn preprocess(&self, images: &[&RgbImage]) -> OcrResult<ndarray::Array4<f32>> {
        let width = batch_width(images);
        let tensors = images
            .iter()
            .map(|img| {
                let target_w = resized_width(img, width);
                let resized = imageops::resize(*img, target_w, REC_IMAGE_HEIGHT, FilterType::Triangle);
                let mut tensor = Array3::<f32>::zeros((3, REC_IMAGE_HEIGHT as usize, width as usize));
                self.normalizer.apply_into(&resized, tensor.view_mut());
                tensor
            })
            .collect::<Vec<_>>();
        stack_batch(&tensors)
    }
}

impl TextRecognizer for TextRecognitionPredictor {
    fn recognize(&self, crops: &[RgbImage]) -> OcrResult<Vec<(String, f32)>> {
        let mut results = vec![(String::new(), 0.0f32); crops.len()];

        // Similar widths share a batch, which keeps padding small.
        let mut order: Vec<usize> = (0..crops.len())
            .filter(|&i| crops[i].width() > 0 && crops[i].height() > 0)
            .collect();
        let ratio = |i: usize| crops[i].width() as f32 / crops[i].height() as f32;
        order.sort_by(|&a, &b| ratio(a).total_cmp(&ratio(b)));

        for chunk in order.chunks(self.batch_size.max(1)) {
            let images: Vec<&RgbImage> = chunk.iter().map(|&i| &crops[i]).collect();
            let batch = self.preprocess(&images)?;
            let output = self.inference.run(batch.into_dyn())?;
            let output = output.into_dimensionality::<Ix3>()?;
            if output.len_of(Axis(0)) != chunk.len() {
                return Err(OCRError::inference_error(
                    "text_recognition",
                    "batch size mismatch",
                    format!("expected {} rows, got {}", chunk.len(), output.len_of(Axis(0))),
                ));
            }
            for (row, &index) in chunk.iter().enumerate() {
                results[index] = self.decoder.decode(output.slice(s![row, .., ..]));
            }
        }
        debug!(lines = crops.len(), "text recognition done");
        Ok(results)
    }
}

/// Builder for text recognition predictor
#[derive(Debug)]
pub struct TextRecognitionPredictorBuilder {
    dict_path: Option<PathBuf>,
    batch_size: usize,
    ort_config: Option<OrtSessionConfig>,
}

impl TextRecognitionPredictorBuilder {
    pub fn new() -> Self {
        Self {
            dict_path: None,
            batch_size: 6,
            ort_config: None,
        }
    }

    pub fn dict_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.dict_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn ort_config(mut self, config: OrtSessionConfig) -> Self {
        self.ort_config = Some(config);
        self
    }

    pub fn build<P: AsRef<Path>>(self, model_path: P) -> OcrResult<TextRecognitionPredictor> {
        let dict_path = self.dict_path.ok_or_else(|| OCRError::ConfigError {
            message: "Dictionary path is required for text recognition".to_string(),
        })?;
        let decoder = CtcDecoder::from_dict_file(&dict_path)?;
        let inference =
            OrtInfer::from_file(model_path, "text_recognition", self.ort_config.as_ref())?;
        Ok(TextRecognitionPredictor {
            inference,
            decoder,
            normalizer: NormalizeImage::for_ocr_recognition(),
            batch_size: self.batch_size,
        })
    }
}

impl Default for TextRecognitionPredictorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
