//! ONNX predictors for each model role.
//!
//! Each predictor owns one [`OrtInfer`](crate::core::OrtInfer) session and
//! implements the matching trait from [`crate::core::traits`]. Pre- and
//! post-processing are plain functions so they can be tested without weights.

pub mod document_orientation;
pub mod layout_detection;
pub mod text_detection;
pub mod text_line_orientation;
pub mod text_recognition;

pub use document_orientation::DocumentOrientationPredictor;
pub use layout_detection::{LayoutDetectionPredictor, LayoutModelConfig};
pub use text_detection::TextDetectionPredictor;
pub use text_line_orientation::TextLineOrientationPredictor;
pub use text_recognition::{CtcDecoder, TextRecognitionPredictor};

use crate::core::OcrResult;
use ndarray::{Array3, Array4, ArrayView1, ArrayViewD, Axis, Ix2};

/// Stacks equally sized `3 x H x W` tensors into a batch.
pub(crate) fn stack_batch(tensors: &[Array3<f32>]) -> OcrResult<Array4<f32>> {
    let views: Vec<_> = tensors.iter().map(|t| t.view()).collect();
    Ok(ndarray::stack(Axis(0), &views)?)
}

/// Index and value of the largest entry.
pub(crate) fn argmax(row: ArrayView1<'_, f32>) -> (usize, f32) {
    row.iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, v)| {
            if v > best.1 { (i, v) } else { best }
        })
}

/// Top class of every row of a `[batch, classes]` output, mapped through `labels`.
pub(crate) fn classify_rows(output: ArrayViewD<'_, f32>, labels: &[u32]) -> OcrResult<Vec<(u32, f32)>> {
    let scores = output.into_dimensionality::<Ix2>()?;
    Ok(scores
        .outer_iter()
        .map(|row| {
            let (class_id, score) = argmax(row);
            (labels.get(class_id).copied().unwrap_or(0), score)
        })
        .collect())
}
