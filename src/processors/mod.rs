//! Image and geometry processors shared by the pipeline stages.
//!
//! This module holds the model-independent pieces of the pipeline: box and
//! polygon geometry, DB text-detection postprocessing, tensor normalization,
//! overlap merging and reading-order resolution.

pub mod db_postprocess;
pub mod geometry;
pub mod merge;
pub mod normalization;
pub mod reading_order;
pub mod types;

pub use db_postprocess::DBPostProcess;
pub use geometry::{BoundingBox, MinAreaRect, Point, Rect};
pub use merge::{BoxMerger, Mergeable};
pub use normalization::NormalizeImage;
pub use reading_order::{order_regions, reading_order};
pub use types::{ColorOrder, LimitType};
