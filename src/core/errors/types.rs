//! Core error types for the structure analysis pipeline.
//!
//! This module defines the `OCRError` enum shared by every stage of the pipeline,
//! together with the `ProcessingStage` tag used to give post-processing failures
//! some context when they surface in logs.

use std::path::PathBuf;
use thiserror::Error;

/// Enum representing different stages of processing in the pipeline.
///
/// Used to identify where a processing error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Error occurred while building or reading tensors.
    TensorOperation,
    /// Error occurred during image normalization.
    Normalization,
    /// Error occurred during image resizing or cropping.
    ImageProcessing,
    /// Error occurred during post-processing of model output.
    PostProcessing,
    /// Error occurred while encoding an output payload.
    Encoding,
    /// Generic processing error.
    Generic,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::TensorOperation => write!(f, "tensor operation"),
            ProcessingStage::Normalization => write!(f, "normalization"),
            ProcessingStage::ImageProcessing => write!(f, "image processing"),
            ProcessingStage::PostProcessing => write!(f, "post-processing"),
            ProcessingStage::Encoding => write!(f, "encoding"),
            ProcessingStage::Generic => write!(f, "processing"),
        }
    }
}

/// Enum representing the errors that can occur in the analysis pipeline.
///
/// Model and file errors always carry enough detail for a caller to act on
/// (for example the list of missing model files). Geometric post-processing
/// never produces errors; degenerate input yields empty output instead.
#[derive(Error, Debug)]
pub enum OCRError {
    /// One or more required model files are absent.
    #[error("model files incomplete, missing: {}", format_paths(missing))]
    ModelFilesIncomplete {
        /// Every missing file or folder, in manifest order.
        missing: Vec<PathBuf>,
    },

    /// Models of a group are not loaded and auto-load is disabled.
    #[error("models for '{group}' are not loaded; call load first")]
    ModelNotLoaded {
        /// The model group that was requested.
        group: String,
    },

    /// The input is neither a decodable image nor a PDF.
    #[error("unsupported input: {message}")]
    UnsupportedInput {
        /// A message describing why the input was rejected.
        message: String,
    },

    /// A single PDF page could not be rasterized.
    #[error("failed to render page {page}: {message}")]
    PageRenderFailure {
        /// 1-based page number.
        page: usize,
        /// Renderer message.
        message: String,
    },

    /// An inference call failed.
    #[error("inference failed in model '{model_name}': {context}")]
    InferenceFailure {
        /// The name of the model where inference failed.
        model_name: String,
        /// Additional context about the inference error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error occurred during processing.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage of processing where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error occurred while decoding or encoding an image.
    #[error("image load")]
    ImageLoad(#[source] image::ImageError),

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// Error from the ONNX Runtime session.
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// Error from basic tensor operations.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<image::ImageError> for OCRError {
    fn from(error: image::ImageError) -> Self {
        Self::ImageLoad(error)
    }
}

/// Convenient result alias used across the crate.
pub type OcrResult<T> = Result<T, OCRError>;

impl OCRError {
    /// Wraps an error raised by an inference call.
    pub fn inference_error(
        model_name: impl Into<String>,
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::InferenceFailure {
            model_name: model_name.into(),
            context: context.into(),
            source: source.into(),
        }
    }

    /// Creates a configuration error with context and details.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use oar_structure::core::OCRError;
    /// let err = OCRError::config_error_detailed("layout model", "unknown variant 'XL'");
    /// assert!(matches!(err, OCRError::ConfigError { .. }));
    /// ```
    pub fn config_error_detailed(context: impl Into<String>, details: impl Into<String>) -> Self {
        Self::ConfigError {
            message: format!("{}: {}", context.into(), details.into()),
        }
    }

    /// Creates a configuration error for invalid field values.
    pub fn invalid_field(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ConfigError {
            message: format!(
                "invalid value for field '{}': expected {}, got {}",
                field.into(),
                expected.into(),
                actual.into()
            ),
        }
    }

    /// Wraps an error raised while post-processing or encoding data.
    pub fn processing(
        kind: ProcessingStage,
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.into(),
            source: source.into(),
        }
    }

    /// Returns true for errors caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            OCRError::ModelFilesIncomplete { .. }
                | OCRError::ModelNotLoaded { .. }
                | OCRError::UnsupportedInput { .. }
                | OCRError::InvalidInput { .. }
                | OCRError::ConfigError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_files_incomplete_lists_every_path() {
        let err = OCRError::ModelFilesIncomplete {
            missing: vec![
                PathBuf::from("models/det/inference.onnx"),
                PathBuf::from("models/rec/ppocrv5_dict.txt"),
            ],
        };
        let message = err.to_string();
        assert!(message.contains("models/det/inference.onnx"));
        assert!(message.contains("models/rec/ppocrv5_dict.txt"));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_inference_error_keeps_model_name() {
        let err = OCRError::inference_error("layout", "session run", "boom");
        assert_eq!(
            err.to_string(),
            "inference failed in model 'layout': session run"
        );
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_processing_stage_display() {
        assert_eq!(ProcessingStage::PostProcessing.to_string(), "post-processing");
        assert_eq!(ProcessingStage::Encoding.to_string(), "encoding");
    }
}
