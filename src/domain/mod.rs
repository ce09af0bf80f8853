//! Result data model and region routing.

pub mod router;
pub mod structure;

pub use router::{Handler, RegionRouter, preferred_handler};
pub use structure::{
    FormulaResult, LayoutRegion, OcrItem, PageAnalysis, RegionContent, RegionType, TableCell,
    TableStructure,
};
