//! Error handling for the pipeline.

mod types;

pub use types::{OCRError, OcrResult, ProcessingStage};
