//! # OAR Structure
//!
//! Document structure analysis on ONNX Runtime: layout detection, per-region
//! OCR, table/formula/chart routing, reading order and Markdown export, for
//! single images and multi-page PDFs.
//!
//! ## Modules
//!
//! * [`core`] - Errors, configuration, ONNX sessions, model-role traits and the model registry
//! * [`domain`] - Result data model and region routing
//! * [`predictors`] - ONNX implementations of the model roles
//! * [`processors`] - Geometry, DB post-processing, box merging and reading order
//! * [`oarocr`] - OCR engine, structure analyzer, page orchestration and output assembly
//! * [`utils`] - Logging setup and image helpers
//!
//! ## Example
//!
//! ```rust,no_run
//! use oar_structure::core::{ModelManifest, ModelRegistry, StructureParams};
//! use oar_structure::oarocr::{
//!     PageOrchestrator, StructureModelLoader, analyze_document, document_markdown,
//!     with_page_source,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ModelRegistry::new(StructureModelLoader::new(ModelManifest::from_env(), None), true);
//! let analyzer = registry.acquire()?;
//! let bytes = std::fs::read("paper.pdf")?;
//! let markdown = with_page_source(&bytes, &Default::default(), |source| {
//!     let run = analyze_document(&analyzer, source, PageOrchestrator::unlimited(), &StructureParams::default())?;
//!     document_markdown(&run)
//! })?;
//! println!("{}", markdown.markdown);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod domain;
pub mod oarocr;
pub mod predictors;
pub mod processors;
pub mod utils;
