//! Whole-document runs of the OCR and structure stages.
//!
//! These tie a [`PageSource`] and a [`PageOrchestrator`] to one of the page
//! stages. JSON extraction normally runs unlimited; drawing and Markdown take a
//! capped orchestrator.

use crate::core::config::{OcrParams, StructureParams};
use crate::core::OcrResult;
use crate::oarocr::draw::{draw_layout, draw_ocr};
use crate::oarocr::ocr::{OcrEngine, OcrPageResult};
use crate::oarocr::orchestrator::{DocumentRun, PageOrchestrator, PageSource, SourceKind};
use crate::oarocr::structure::{AnalyzedPage, StructureAnalyzer};
use image::RgbImage;

/// Analyzes every page of `source`.
///
/// Regions of a PDF carry their page number.
pub fn analyze_document(
    analyzer: &StructureAnalyzer,
    source: &dyn PageSource,
    orchestrator: PageOrchestrator,
    params: &StructureParams,
) -> OcrResult<DocumentRun<AnalyzedPage>> {
    let stamp = source.kind() == SourceKind::Pdf;
    orchestrator.run(source, |page_number, image| {
        let mut page = analyzer.analyze(image, page_number, params)?;
        if stamp {
            page.analysis.stamp_page_numbers();
        }
        Ok(page)
    })
}

/// Runs plain OCR on every page of `source`.
pub fn ocr_document(
    engine: &OcrEngine,
    source: &dyn PageSource,
    orchestrator: PageOrchestrator,
    params: &OcrParams,
) -> OcrResult<DocumentRun<OcrPageResult>> {
    params.validate()?;
    orchestrator.run(source, |page_number, image| {
        let mut page = engine.predict(&image, params)?;
        page.page_number = page_number;
        Ok(page)
    })
}

/// Analyzes and draws the layout of each page.
pub fn draw_structure_document(
    analyzer: &StructureAnalyzer,
    source: &dyn PageSource,
    orchestrator: PageOrchestrator,
    params: &StructureParams,
) -> OcrResult<DocumentRun<(usize, RgbImage)>> {
    let run = analyze_document(analyzer, source, orchestrator, params)?;
    Ok(run.map(|page| {
        let drawn = draw_layout(&page.image, &page.analysis);
        (page.analysis.page_number, drawn)
    }))
}

/// Runs OCR and draws the confident lines of each page.
pub fn draw_ocr_document(
    engine: &OcrEngine,
    source: &dyn PageSource,
    orchestrator: PageOrchestrator,
    params: &OcrParams,
    drop_score: f32,
) -> OcrResult<DocumentRun<(usize, RgbImage)>> {
    params.validate()?;
    orchestrator.run(source, |page_number, image| {
        let page = engine.predict(&image, params)?;
        Ok((page_number, draw_ocr(&image, &page.results, drop_score)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RegionType;
    use crate::oarocr::assembler::{document_markdown, structure_json};
    use crate::oarocr::draw::draw_document_json;
    use crate::oarocr::draw::region_color;
    use crate::oarocr::ocr::tests::{FixedClassifier, FixedDetector, SizeRecognizer};
    use crate::oarocr::orchestrator::ImageSource;
    use crate::oarocr::orchestrator::tests::FakePdf;
    use crate::oarocr::structure::tests::{FixedLayout, analyzer, region};
    use crate::processors::BoundingBox;
    use std::sync::Arc;

    fn sample_analyzer() -> StructureAnalyzer {
        analyzer(vec![
            region(0.0, 0.0, 8.0, 4.0, RegionType::Text, 0.9),
            region(0.0, 5.0, 8.0, 9.0, RegionType::Image, 0.9),
        ])
        .build()
    }

    #[test]
    fn test_pdf_regions_carry_page_numbers() {
        let source = FakePdf {
            pages: 3,
            broken: vec![],
        };
        let run = analyze_document(
            &sample_analyzer(),
            &source,
            PageOrchestrator::unlimited(),
            &StructureParams::default(),
        )
        .unwrap();
        let numbers: Vec<Option<usize>> = run
            .pages()
            .map(|page| page.analysis.regions[0].page_number)
            .collect();
        assert_eq!(numbers, vec![Some(1), Some(2), Some(3)]);
        let value = structure_json(&run);
        assert_eq!(value["file_type"], "pdf");
        assert_eq!(value["pages"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_draw_five_page_pdf_capped_at_two() {
        let source = FakePdf {
            pages: 5,
            broken: vec![],
        };
        let run = draw_structure_document(
            &sample_analyzer(),
            &source,
            PageOrchestrator::with_max_pages(2),
            &StructureParams::default(),
        )
        .unwrap();
        let value = draw_document_json(&run).unwrap();
        assert_eq!(value["total_pages"], 5);
        assert_eq!(value["processed_pages"], 2);
        assert_eq!(value["max_pages_limit"], 2);
        assert_eq!(value["images"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_draw_rotated_scan_on_original_page() {
        let ocr = OcrEngine::builder(Arc::new(FixedDetector(vec![])), Arc::new(SizeRecognizer))
            .with_document_orientation(Arc::new(FixedClassifier::new(90, 0.99)))
            .build();
        // Top strip of the 20x40 upright page, i.e. the right edge of the scan.
        let layout = FixedLayout(vec![region(0.0, 0.0, 20.0, 10.0, RegionType::Image, 0.9)]);
        let analyzer = StructureAnalyzer::builder(Arc::new(layout), ocr).build();
        let source = ImageSource::new(RgbImage::from_pixel(40, 20, image::Rgb([255, 255, 255])));

        let run = draw_structure_document(
            &analyzer,
            &source,
            PageOrchestrator::unlimited(),
            &StructureParams::default(),
        )
        .unwrap();
        let (_, drawn) = run.pages().next().unwrap();
        assert_eq!(drawn.dimensions(), (40, 20));
        assert_eq!(*drawn.get_pixel(35, 5), region_color(RegionType::Image));
        assert_eq!(*drawn.get_pixel(5, 5), image::Rgb([255, 255, 255]));
    }

    #[test]
    fn test_markdown_skips_broken_page() {
        let source = FakePdf {
            pages: 3,
            broken: vec![0],
        };
        let run = analyze_document(
            &sample_analyzer(),
            &source,
            PageOrchestrator::with_max_pages(2),
            &StructureParams::default(),
        )
        .unwrap();
        assert_eq!(run.skipped().len(), 1);
        let artifact = document_markdown(&run).unwrap();
        assert_eq!(artifact.images.len(), 1);
        assert!(artifact.markdown.contains(&artifact.images[0].filename));
    }

    #[test]
    fn test_ocr_document_numbers_pages() {
        let engine = OcrEngine::builder(
            Arc::new(FixedDetector(vec![BoundingBox::from_coords(1.0, 1.0, 9.0, 5.0)])),
            Arc::new(SizeRecognizer),
        )
        .build();
        let source = FakePdf {
            pages: 2,
            broken: vec![],
        };
        let run = ocr_document(
            &engine,
            &source,
            PageOrchestrator::unlimited(),
            &OcrParams::default(),
        )
        .unwrap();
        let pages: Vec<usize> = run.pages().map(|p| p.page_number).collect();
        assert_eq!(pages, vec![1, 2]);
        assert_eq!(run.pages().next().unwrap().results.len(), 1);
    }
}
