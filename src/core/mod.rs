//! The core module of the structure analysis pipeline.
//!
//! This module contains the fundamental components shared by every stage:
//! - Configuration (session settings, model locations, per-call parameters)
//! - Error handling
//! - ONNX Runtime inference
//! - The model lifecycle registry
//! - Traits describing each model role

pub mod config;
pub mod errors;
pub mod inference;
pub mod registry;
pub mod traits;

pub use config::{
    LayoutVariant, ModelManifest, OcrParams, OrtSessionConfig, RenderSettings, StructureParams,
};
pub use errors::{OCRError, OcrResult, ProcessingStage};
pub use inference::OrtInfer;
pub use registry::{ModelInfo, ModelLoader, ModelRegistry, ModelState, ModelStatus};
pub use traits::{
    ChartRecognizer, FormulaRecognizer, LayoutDetector, OrientationClassifier, TableRecognizer,
    TextDetector, TextRecognizer,
};
