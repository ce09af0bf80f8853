//! Configuration for the pipeline.
//!
//! This module provides ONNX Runtime session settings, model file locations and
//! the per-call parameter structs with their documented defaults.

pub mod models;
pub mod onnx;
pub mod pipeline;

pub use models::{LayoutVariant, ModelManifest};
pub use onnx::*;
pub use pipeline::{
    DEFAULT_PDF_DPI, DEFAULT_VISUAL_MAX_PAGES, OcrParams, RenderSettings, StructureParams,
};
