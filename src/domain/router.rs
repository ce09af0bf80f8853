//! Region type to handler routing.

use super::structure::RegionType;
use serde::Serialize;

/// What to do with a layout region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Handler {
    /// Run the OCR subsystem on the region crop.
    Ocr,
    /// Run the table recognizer.
    Table,
    /// Run the formula recognizer.
    Formula,
    /// Run the chart recognizer.
    Chart,
    /// Keep the crop as an image asset without text extraction.
    OpaqueAsset,
}

/// Preferred handler of each region type, before availability fallbacks.
///
/// The match is exhaustive so a new [`RegionType`] variant fails to compile
/// until it is routed.
pub fn preferred_handler(region_type: RegionType) -> Handler {
    match region_type {
        RegionType::DocTitle
        | RegionType::ParagraphTitle
        | RegionType::Text
        | RegionType::Content
        | RegionType::Abstract
        | RegionType::FigureTitle
        | RegionType::TableTitle
        | RegionType::ChartTitle
        | RegionType::FigureTableChartTitle
        | RegionType::Header
        | RegionType::Footer
        | RegionType::Footnote
        | RegionType::Number
        | RegionType::Reference
        | RegionType::ReferenceContent
        | RegionType::Algorithm
        | RegionType::FormulaNumber
        | RegionType::AsideText
        | RegionType::List => Handler::Ocr,
        RegionType::Table => Handler::Table,
        RegionType::Formula => Handler::Formula,
        RegionType::Chart => Handler::Chart,
        RegionType::Image
        | RegionType::HeaderImage
        | RegionType::FooterImage
        | RegionType::Seal
        | RegionType::Other => Handler::OpaqueAsset,
    }
}

/// Routes region types to handlers given which recognizers can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegionRouter {
    /// Table recognition requested and a table recognizer is available.
    pub table_enabled: bool,
    /// A formula recognizer is available.
    pub formula_available: bool,
    /// A chart recognizer is available.
    pub chart_available: bool,
}

impl RegionRouter {
    /// Creates a router.
    pub fn new(table_enabled: bool, formula_available: bool, chart_available: bool) -> Self {
        Self {
            table_enabled,
            formula_available,
            chart_available,
        }
    }

    /// Handler for `region_type`.
    ///
    /// Tables fall back to OCR when table recognition is off, formulas fall
    /// back to OCR without a formula recognizer, and charts without a chart
    /// recognizer are kept as assets.
    pub fn route(&self, region_type: RegionType) -> Handler {
        match preferred_handler(region_type) {
            Handler::Table if !self.table_enabled => Handler::Ocr,
            Handler::Formula if !self.formula_available => Handler::Ocr,
            Handler::Chart if !self.chart_available => Handler::OpaqueAsset,
            handler => handler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_falls_back_to_ocr_when_disabled() {
        let router = RegionRouter::new(false, false, false);
        assert_eq!(router.route(RegionType::Table), Handler::Ocr);
        let router = RegionRouter::new(true, false, false);
        assert_eq!(router.route(RegionType::Table), Handler::Table);
    }

    #[test]
    fn test_unknown_and_images_are_opaque() {
        let router = RegionRouter::default();
        assert_eq!(router.route(RegionType::Other), Handler::OpaqueAsset);
        assert_eq!(router.route(RegionType::Image), Handler::OpaqueAsset);
        assert_eq!(router.route(RegionType::Seal), Handler::OpaqueAsset);
    }

    #[test]
    fn test_formula_and_chart_fallbacks() {
        let bare = RegionRouter::default();
        assert_eq!(bare.route(RegionType::Formula), Handler::Ocr);
        assert_eq!(bare.route(RegionType::Chart), Handler::OpaqueAsset);

        let full = RegionRouter::new(true, true, true);
        assert_eq!(full.route(RegionType::Formula), Handler::Formula);
        assert_eq!(full.route(RegionType::Chart), Handler::Chart);
    }

    #[test]
    fn test_every_type_routes() {
        let router = RegionRouter::new(true, true, true);
        for region_type in RegionType::ALL {
            let handler = router.route(region_type);
            assert_eq!(handler, preferred_handler(region_type));
        }
        assert_eq!(router.route(RegionType::ParagraphTitle), Handler::Ocr);
    }
}
