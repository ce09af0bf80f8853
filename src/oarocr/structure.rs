//! Per-page document structure analysis.
//!
//! [`StructureAnalyzer`] runs layout detection on an (orientation-corrected)
//! page, optionally merges duplicate regions, routes each region to its handler
//! and orders the finished regions for reading. All handlers of a page finish
//! before reading order runs. Reported boxes are mapped back onto the image the
//! caller passed in.

use crate::core::config::StructureParams;
use crate::core::traits::{ChartRecognizer, FormulaRecognizer, LayoutDetector, TableRecognizer};
use crate::core::OcrResult;
use crate::domain::{Handler, LayoutRegion, PageAnalysis, RegionContent, RegionRouter};
use crate::oarocr::ocr::{OcrEngine, OcrLine, OrientationCorrection, sort_text_boxes};
use crate::processors::{BoxMerger, Rect, order_regions};
use crate::utils::crop_rect;
use image::RgbImage;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

/// A page analysis together with the page image it refers to.
#[derive(Debug, Clone)]
pub struct AnalyzedPage {
    /// Regions in reading order.
    pub analysis: PageAnalysis,
    /// Page image as given to [`StructureAnalyzer::analyze`]; region boxes
    /// index into it.
    pub image: RgbImage,
}

/// Layout-driven document analysis.
#[derive(Clone)]
pub struct StructureAnalyzer {
    layout: Arc<dyn LayoutDetector>,
    ocr: OcrEngine,
    table: Option<Arc<dyn TableRecognizer>>,
    formula: Option<Arc<dyn FormulaRecognizer>>,
    chart: Option<Arc<dyn ChartRecognizer>>,
}

impl std::fmt::Debug for StructureAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructureAnalyzer")
            .field("ocr", &self.ocr)
            .field("table", &self.table.is_some())
            .field("formula", &self.formula.is_some())
            .field("chart", &self.chart.is_some())
            .finish_non_exhaustive()
    }
}

impl StructureAnalyzer {
    pub fn builder(layout: Arc<dyn LayoutDetector>, ocr: OcrEngine) -> StructureAnalyzerBuilder {
        StructureAnalyzerBuilder::new(layout, ocr)
    }

    /// The OCR engine used for text regions.
    pub fn ocr(&self) -> &OcrEngine {
        &self.ocr
    }

    /// Router for a call, given which recognizers are present.
    pub fn router(&self, params: &StructureParams) -> RegionRouter {
        RegionRouter::new(
            params.use_table_recognition && self.table.is_some(),
            self.formula.is_some(),
            self.chart.is_some(),
        )
    }

    /// Analyzes one page.
    ///
    /// # Errors
    ///
    /// Invalid parameters and any failing inference call abort the page.
    pub fn analyze(
        &self,
        image: RgbImage,
        page_number: usize,
        params: &StructureParams,
    ) -> OcrResult<AnalyzedPage> {
        params.validate()?;

        let (upright, correction) = self.ocr.correct_orientation(&image, &params.ocr)?;

        let mut regions = self.layout.detect(&upright, params.layout_conf_threshold)?;
        regions.retain(|r| r.confidence >= params.layout_conf_threshold);
        let detected = regions.len();
        let merger = BoxMerger::new(params.layout_overlap_threshold, params.merge_layout);
        let mut regions = merger.merge_layout(&regions);

        let router = self.router(params);
        regions
            .par_iter_mut()
            .try_for_each(|region| self.fill_region(&upright, region, router.route(region.region_type), params))?;
        drop(upright);

        // Reading order is decided on the upright page.
        let mut regions = order_regions(regions);
        if let Some(correction) = &correction {
            regions
                .iter_mut()
                .for_each(|region| map_region_back(region, correction));
        }
        info!(
            page = page_number,
            detected,
            regions = regions.len(),
            "page analyzed"
        );

        let (width, height) = image.dimensions();
        let analysis = PageAnalysis {
            page_number,
            width,
            height,
            rotation: correction.map(|c| c.angle).unwrap_or(0),
            regions,
        };
        Ok(AnalyzedPage { analysis, image })
    }

    fn fill_region(
        &self,
        page: &RgbImage,
        region: &mut LayoutRegion,
        handler: Handler,
        params: &StructureParams,
    ) -> OcrResult<()> {
        if handler == Handler::OpaqueAsset {
            region.content = Some(RegionContent::Asset);
            return Ok(());
        }
        let Some((x, y, _, _)) = region.bbox.pixel_window(page.width(), page.height()) else {
            debug!(region = %region.region_type, "region lies outside the page");
            return Ok(());
        };
        let Some(crop) = crop_rect(page, &region.bbox) else {
            return Ok(());
        };

        region.content = Some(match handler {
            Handler::Ocr => {
                let lines = self.region_lines(&crop, (x as f32, y as f32), params)?;
                let text = lines
                    .iter()
                    .map(|line| line.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                region.ocr_items = lines.iter().map(OcrLine::to_item).collect();
                RegionContent::Text { text }
            }
            Handler::Table => match &self.table {
                Some(table) => {
                    let mut structure = table.recognize(&crop)?;
                    for cell in &mut structure.cells {
                        if let Some(bbox) = cell.bbox.as_mut() {
                            *bbox = bbox.translate(x as f32, y as f32);
                        }
                    }
                    RegionContent::Table(structure)
                }
                None => RegionContent::Asset,
            },
            Handler::Formula => match &self.formula {
                Some(formula) => RegionContent::Formula(formula.recognize(&crop)?),
                None => RegionContent::Asset,
            },
            Handler::Chart => match &self.chart {
                Some(chart) => RegionContent::Text {
                    text: chart.recognize(&crop)?,
                },
                None => RegionContent::Asset,
            },
            Handler::OpaqueAsset => RegionContent::Asset,
        });
        Ok(())
    }

    /// OCR lines of a region crop, in page coordinates and reading order.
    fn region_lines(
        &self,
        crop: &RgbImage,
        (dx, dy): (f32, f32),
        params: &StructureParams,
    ) -> OcrResult<Vec<OcrLine>> {
        let mut lines: Vec<OcrLine> = self
            .ocr
            .recognize_lines(crop, &params.ocr)?
            .into_iter()
            .filter(|line| line.text_confidence >= params.region_text_min_confidence)
            .map(|mut line| {
                line.bbox = line.bbox.translate(dx, dy);
                line
            })
            .collect();
        sort_text_boxes(&mut lines, |line| &line.bbox);
        Ok(lines)
    }
}

fn rect_back(rect: &Rect, correction: &OrientationCorrection) -> Rect {
    correction.map_back(&rect.to_quad()).bounding_rect()
}

/// Moves every box of a region from the corrected page onto the original one.
fn map_region_back(region: &mut LayoutRegion, correction: &OrientationCorrection) {
    region.bbox = rect_back(&region.bbox, correction);
    for item in &mut region.ocr_items {
        item.bbox = correction.map_back(&item.bbox);
    }
    if let Some(RegionContent::Table(structure)) = region.content.as_mut() {
        for cell in &mut structure.cells {
            if let Some(bbox) = cell.bbox.as_mut() {
                *bbox = rect_back(bbox, correction);
            }
        }
    }
}

/// Builder for [`StructureAnalyzer`].
pub struct StructureAnalyzerBuilder {
    layout: Arc<dyn LayoutDetector>,
    ocr: OcrEngine,
    table: Option<Arc<dyn TableRecognizer>>,
    formula: Option<Arc<dyn FormulaRecognizer>>,
    chart: Option<Arc<dyn ChartRecognizer>>,
}

impl StructureAnalyzerBuilder {
    pub fn new(layout: Arc<dyn LayoutDetector>, ocr: OcrEngine) -> Self {
        Self {
            layout,
            ocr,
            table: None,
            formula: None,
            chart: None,
        }
    }

    /// Adds a table recognizer; used only when a call enables table recognition.
    pub fn with_table_recognizer(mut self, recognizer: Arc<dyn TableRecognizer>) -> Self {
        self.table = Some(recognizer);
        self
    }

    /// Adds a formula recognizer.
    pub fn with_formula_recognizer(mut self, recognizer: Arc<dyn FormulaRecognizer>) -> Self {
        self.formula = Some(recognizer);
        self
    }

    /// Adds a chart recognizer.
    pub fn with_chart_recognizer(mut self, recognizer: Arc<dyn ChartRecognizer>) -> Self {
        self.chart = Some(recognizer);
        self
    }

    pub fn build(self) -> StructureAnalyzer {
        StructureAnalyzer {
            layout: self.layout,
            ocr: self.ocr,
            table: self.table,
            formula: self.formula,
            chart: self.chart,
        }
    }
}
