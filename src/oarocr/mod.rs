//! The document pipeline.
//!
//! This module composes the model roles into the two model groups and their
//! document-level stages:
//!
//! - [`OcrEngine`] - page orientation, text detection and recognition
//! - [`StructureAnalyzer`] - layout detection, region routing and reading order
//! - [`PageOrchestrator`] - multi-page runs over images and PDFs
//! - [`assembler`] - JSON and Markdown output
//! - [`draw`] - visualization

pub mod assembler;
pub mod document;
pub mod draw;
pub mod groups;
pub mod ocr;
pub mod orchestrator;
pub mod pdf;
pub mod structure;

pub use assembler::{MarkdownArtifact, MarkdownAsset, document_markdown, ocr_json, ocr_text, structure_json};
pub use document::{analyze_document, draw_ocr_document, draw_structure_document, ocr_document};
pub use draw::{DEFAULT_DROP_SCORE, draw_document_json, draw_layout, draw_ocr};
pub use groups::{OcrModelLoader, StructureModelLoader, build_ocr_engine};
pub use ocr::{OcrEngine, OcrEngineBuilder, OcrLine, OcrPageResult, ocr2text};
pub use orchestrator::{DocumentRun, ImageSource, PageOrchestrator, PageOutcome, PageSource, SourceKind};
pub use pdf::{PdfRasterizer, with_page_source};
pub use structure::{AnalyzedPage, StructureAnalyzer, StructureAnalyzerBuilder};
