//! Result visualization.
//!
//! Layout pages get one hollow rectangle per region plus a filled tab in the
//! region type's color at its top-left corner; OCR pages get the outline of
//! every confident text line. A page with nothing to draw comes back as the
//! plain page image.

use crate::core::OcrResult;
use crate::domain::{PageAnalysis, RegionType};
use crate::oarocr::assembler::document_json;
use crate::oarocr::ocr::OcrLine;
use crate::oarocr::orchestrator::DocumentRun;
use crate::utils::png_base64;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_polygon_mut, draw_hollow_rect_mut};
use imageproc::point::Point as DrawPoint;
use imageproc::rect::Rect as DrawRect;
use serde_json::{Value, json};

/// OCR lines below this confidence are not drawn by default.
pub const DEFAULT_DROP_SCORE: f32 = 0.5;

const TAB_SIZE: u32 = 12;
const OCR_COLOR: Rgb<u8> = Rgb([0, 160, 0]);

/// Outline color of a region type.
pub fn region_color(region_type: RegionType) -> Rgb<u8> {
    match region_type {
        RegionType::Text | RegionType::Content | RegionType::Abstract | RegionType::Reference
        | RegionType::ReferenceContent | RegionType::List => Rgb([255, 0, 0]),
        RegionType::DocTitle | RegionType::ParagraphTitle => Rgb([0, 200, 0]),
        RegionType::Table => Rgb([0, 0, 255]),
        RegionType::Formula | RegionType::FormulaNumber | RegionType::Algorithm => Rgb([255, 140, 0]),
        RegionType::Image | RegionType::Chart | RegionType::Seal => Rgb([255, 0, 255]),
        RegionType::FigureTitle
        | RegionType::TableTitle
        | RegionType::ChartTitle
        | RegionType::FigureTableChartTitle => Rgb([0, 170, 170]),
        RegionType::Header
        | RegionType::HeaderImage
        | RegionType::Footer
        | RegionType::FooterImage
        | RegionType::Number
        | RegionType::Footnote
        | RegionType::AsideText => Rgb([128, 128, 128]),
        RegionType::Other => Rgb([90, 60, 30]),
    }
}

/// Draws layout regions onto a copy of `image`.
pub fn draw_layout(image: &RgbImage, analysis: &PageAnalysis) -> RgbImage {
    let mut canvas = image.clone();
    for region in &analysis.regions {
        let Some((x, y, w, h)) = region.bbox.pixel_window(canvas.width(), canvas.height()) else {
            continue;
        };
        let color = region_color(region.region_type);
        let rect = DrawRect::at(x as i32, y as i32).of_size(w, h);
        draw_hollow_rect_mut(&mut canvas, rect, color);
        if w > 2 && h > 2 {
            let inner = DrawRect::at(x as i32 + 1, y as i32 + 1).of_size(w - 2, h - 2);
            draw_hollow_rect_mut(&mut canvas, inner, color);
        }
        let tab = DrawRect::at(x as i32, y as i32).of_size(w.min(TAB_SIZE), h.min(TAB_SIZE));
        draw_filled_rect_mut(&mut canvas, tab, color);
    }
    canvas
}

/// Draws OCR line outlines with confidence at least `drop_score` onto a copy of `image`.
pub fn draw_ocr(image: &RgbImage, lines: &[OcrLine], drop_score: f32) -> RgbImage {
    let mut canvas = image.clone();
    for line in lines.iter().filter(|l| l.text_confidence >= drop_score) {
        let points: Vec<DrawPoint<f32>> = line
            .bbox
            .points
            .iter()
            .map(|p| DrawPoint::new(p.x, p.y))
            .collect();
        // A closed polygon must not repeat its first point.
        if points.len() >= 3 && points.first() != points.last() {
            draw_hollow_polygon_mut(&mut canvas, &points, OCR_COLOR);
        }
    }
    canvas
}

/// One rendered page, PNG as base64.
pub fn page_image_json(page_number: usize, image: &RgbImage) -> OcrResult<Value> {
    Ok(json!({
        "page_number": page_number,
        "data": png_base64(image)?,
    }))
}

/// Multi-page draw response from already rendered pages.
pub fn draw_document_json(run: &DocumentRun<(usize, RgbImage)>) -> OcrResult<Value> {
    let images = run
        .pages()
        .map(|(page_number, image)| page_image_json(*page_number, image))
        .collect::<OcrResult<Vec<_>>>()?;
    Ok(document_json(run, "images", images))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LayoutRegion;
    use crate::oarocr::orchestrator::{PageOutcome, SourceKind};
    use crate::processors::{BoundingBox, Rect};

    fn white(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
    }

    #[test]
    fn test_layout_draws_type_color() {
        let mut analysis = PageAnalysis::new(1, 100, 100);
        analysis
            .regions
            .push(LayoutRegion::new(Rect::new(10.0, 10.0, 60.0, 60.0), RegionType::Table, 0.9));
        let drawn = draw_layout(&white(100, 100), &analysis);
        assert_eq!(*drawn.get_pixel(30, 10), region_color(RegionType::Table));
        assert_eq!(*drawn.get_pixel(12, 12), region_color(RegionType::Table));
        assert_eq!(*drawn.get_pixel(35, 35), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_empty_page_is_unchanged() {
        let page = white(20, 20);
        assert_eq!(draw_layout(&page, &PageAnalysis::new(1, 20, 20)), page);
        assert_eq!(draw_ocr(&page, &[], DEFAULT_DROP_SCORE), page);
    }

    #[test]
    fn test_ocr_drop_score_filters_lines() {
        let line = |conf: f32| OcrLine {
            bbox: BoundingBox::from_coords(2.0, 2.0, 18.0, 10.0),
            text: "t".to_string(),
            text_confidence: conf,
            rotation: 0,
            rotation_confidence: 0.0,
        };
        let page = white(20, 20);
        assert_eq!(draw_ocr(&page, &[line(0.3)], DEFAULT_DROP_SCORE), page);
        let drawn = draw_ocr(&page, &[line(0.8)], DEFAULT_DROP_SCORE);
        assert_eq!(*drawn.get_pixel(10, 2), OCR_COLOR);
    }

    #[test]
    fn test_draw_document_json_reports_cap() {
        let run = DocumentRun {
            source_kind: SourceKind::Pdf,
            total_pages: 5,
            processed_pages: 2,
            max_pages_limit: Some(2),
            outcomes: vec![
                PageOutcome::Ok((1, white(4, 4))),
                PageOutcome::Ok((2, white(4, 4))),
            ],
        };
        let value = draw_document_json(&run).unwrap();
        assert_eq!(value["file_type"], "pdf");
        assert_eq!(value["total_pages"], 5);
        assert_eq!(value["processed_pages"], 2);
        assert_eq!(value["max_pages_limit"], 2);
        assert_eq!(value["images"].as_array().unwrap().len(), 2);
        assert_eq!(value["images"][1]["page_number"], 2);
    }
}
