//! Document assembly: JSON trees and Markdown with image assets.
//!
//! Markdown image references and the returned asset list come from the same
//! registry, so every referenced file has exactly one asset and every asset is
//! referenced.

use crate::core::OcrResult;
use crate::domain::{LayoutRegion, RegionContent, RegionType};
use crate::oarocr::ocr::{OcrPageResult, apply_rotation};
use crate::oarocr::orchestrator::{DocumentRun, SourceKind};
use crate::oarocr::structure::AnalyzedPage;
use crate::utils::{crop_rect, encode_png, to_base64};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Separator placed between pages of a multi-page Markdown document.
pub const PAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Leading section numbering of a title: `1`, `1.2.3`, `(2)`, `一、`, `IV.`.
static TITLE_NUMBERING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^\s*
        (
            [1-9][0-9]*(?:\.[1-9][0-9]*)*[\.、]?
            |
            [(（][1-9][0-9]*(?:\.[1-9][0-9]*)*[)）]
            |
            [一二三四五六七八九十百千万零]+[、.]
            |
            [(（][一二三四五六七八九十百千万零]+[)）]
            |
            (?:I|II|III|IV|V|VI|VII|VIII|IX|X)\.
        )
        \s+
        (.*)
        $",
    )
    .expect("title numbering regex is valid")
});

/// Heading level and cleaned text of a paragraph title.
///
/// Dotted arabic numbering sets the level (`1.2.3` is level 3), other
/// numbering is level 1 and unnumbered titles are level 2. Levels are clamped
/// to 1..=6.
pub fn title_level(title: &str) -> (usize, String) {
    let cleaned = clean_text(title);
    let Some(captures) = TITLE_NUMBERING_REGEX.captures(&cleaned) else {
        return (2, cleaned);
    };
    let numbering = captures
        .get(1)
        .map(|m| m.as_str().trim_end_matches(['.', '、']))
        .unwrap_or("");
    let rest = captures.get(2).map(|m| m.as_str().trim()).unwrap_or("");
    let level = if numbering.starts_with(|c: char| c.is_ascii_digit()) {
        numbering.matches('.').count() + 1
    } else {
        1
    };
    let formatted = if rest.is_empty() {
        numbering.to_string()
    } else {
        format!("{numbering} {rest}")
    };
    (level.clamp(1, 6), formatted)
}

/// Joins hyphenated line breaks and flattens the rest into spaces.
fn clean_text(text: &str) -> String {
    text.replace("-\n", "").replace('\n', " ").trim().to_string()
}

/// Asset file name for PNG bytes: `img_` and the first 16 hex digits of their SHA-256.
pub fn asset_name(png: &[u8]) -> String {
    let digest = Sha256::digest(png);
    format!("img_{}.png", digest[..8].iter().map(|b| format!("{b:02x}")).join(""))
}

fn serialize_base64<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_base64(data))
}

/// An image referenced from Markdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkdownAsset {
    /// File name used in the Markdown reference.
    pub filename: String,
    /// PNG bytes; serialized as base64.
    #[serde(serialize_with = "serialize_base64")]
    pub data: Vec<u8>,
}

/// Markdown text together with the images it references.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarkdownArtifact {
    pub markdown: String,
    pub images: Vec<MarkdownAsset>,
}

/// Assets by name, in first-reference order.
#[derive(Debug, Default)]
struct AssetRegistry {
    assets: Vec<MarkdownAsset>,
    names: HashSet<String>,
}

impl AssetRegistry {
    /// Registers PNG bytes and returns their file name; identical bytes share one asset.
    fn add(&mut self, png: Vec<u8>) -> String {
        let filename = asset_name(&png);
        if self.names.insert(filename.clone()) {
            self.assets.push(MarkdownAsset {
                filename: filename.clone(),
                data: png,
            });
        }
        filename
    }
}

/// Renders one page as Markdown.
pub fn page_markdown(page: &AnalyzedPage) -> OcrResult<MarkdownArtifact> {
    let mut assets = AssetRegistry::default();
    let markdown = render_page(page, &mut assets)?;
    Ok(MarkdownArtifact {
        markdown,
        images: assets.assets,
    })
}

/// Renders every processed page, separated by [`PAGE_SEPARATOR`].
pub fn document_markdown(run: &DocumentRun<AnalyzedPage>) -> OcrResult<MarkdownArtifact> {
    let mut assets = AssetRegistry::default();
    let pages = run
        .pages()
        .map(|page| render_page(page, &mut assets))
        .collect::<OcrResult<Vec<_>>>()?;
    Ok(MarkdownArtifact {
        markdown: pages.join(PAGE_SEPARATOR),
        images: assets.assets,
    })
}

fn render_page(page: &AnalyzedPage, assets: &mut AssetRegistry) -> OcrResult<String> {
    let mut blocks = Vec::new();
    for region in &page.analysis.regions {
        if region.region_type.is_page_furniture() {
            continue;
        }
        if let Some(block) = render_region(page, region, assets)? {
            blocks.push(block);
        }
    }
    Ok(blocks.join("\n\n"))
}

fn render_region(
    page: &AnalyzedPage,
    region: &LayoutRegion,
    assets: &mut AssetRegistry,
) -> OcrResult<Option<String>> {
    let text = region.text().map(clean_text).filter(|t| !t.is_empty());

    let block = match (&region.content, region.region_type) {
        (Some(RegionContent::Asset), region_type) => image_reference(page, region, region_type, assets)?,
        (Some(RegionContent::Table(table)), _) => Some(table.to_html()),
        (Some(RegionContent::Formula(formula)), _) => {
            Some(format!("$${}$$", formula.latex.trim())).filter(|_| !formula.latex.trim().is_empty())
        }
        (_, RegionType::Chart) => {
            // Recognized chart data goes under the chart image.
            let image = image_reference(page, region, RegionType::Chart, assets)?;
            match (image, text) {
                (Some(image), Some(text)) => Some(format!("{image}\n\n{text}")),
                (image, text) => image.or(text),
            }
        }
        (_, RegionType::DocTitle) => text.map(|t| format!("# {t}")),
        (_, RegionType::ParagraphTitle) => text.map(|t| {
            let (level, title) = title_level(&t);
            format!("{} {}", "#".repeat(level), title)
        }),
        (_, region_type) if region_type.is_caption() => text.map(|t| format!("*{t}*")),
        (_, RegionType::List) => list_block(region),
        _ => text,
    };
    Ok(block)
}

/// One `- ` bullet per OCR line of a list region.
fn list_block(region: &LayoutRegion) -> Option<String> {
    let lines: Vec<String> = if region.ocr_items.is_empty() {
        region
            .text()
            .map(|t| t.lines().map(str::to_string).collect())
            .unwrap_or_default()
    } else {
        region.ocr_items.iter().map(|item| item.text.clone()).collect()
    };
    let bullets = lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| format!("- {line}"))
        .join("\n");
    Some(bullets).filter(|b| !b.is_empty())
}

fn image_reference(
    page: &AnalyzedPage,
    region: &LayoutRegion,
    region_type: RegionType,
    assets: &mut AssetRegistry,
) -> OcrResult<Option<String>> {
    let Some(crop) = crop_rect(&page.image, &region.bbox) else {
        return Ok(None);
    };
    // Assets are stored upright even when the page was scanned rotated.
    let crop = apply_rotation(&crop, page.analysis.rotation).unwrap_or(crop);
    let filename = assets.add(encode_png(&crop)?);
    Ok(Some(format!("![{region_type}]({filename})")))
}

fn page_json(page: &AnalyzedPage) -> Value {
    json!({
        "page_number": page.analysis.page_number,
        "width": page.analysis.width,
        "height": page.analysis.height,
        "rotation": page.analysis.rotation,
        "regions": page.analysis.regions,
    })
}

/// JSON for a structure run.
///
/// A single image gives `{regions, rotation, width, height}`; a PDF gives
/// `{file_type: "pdf", total_pages, pages: [...]}` with one entry per page.
pub fn structure_json(run: &DocumentRun<AnalyzedPage>) -> Value {
    if run.source_kind == SourceKind::Image
        && let Some(page) = run.pages().next()
    {
        return json!({
            "regions": page.analysis.regions,
            "rotation": page.analysis.rotation,
            "width": page.analysis.width,
            "height": page.analysis.height,
        });
    }
    let pages: Vec<Value> = run.pages().map(page_json).collect();
    document_json(run, "pages", pages)
}

/// JSON for an OCR run, shaped like [`structure_json`] with `results` per page.
pub fn ocr_json(run: &DocumentRun<OcrPageResult>) -> Value {
    if run.source_kind == SourceKind::Image
        && let Some(page) = run.pages().next()
    {
        return json!({
            "results": page.results,
            "rotation": page.rotation,
        });
    }
    let pages: Vec<Value> = run
        .pages()
        .map(|page| {
            json!({
                "page_number": page.page_number,
                "results": page.results,
                "rotation": page.rotation,
            })
        })
        .collect();
    document_json(run, "pages", pages)
}

/// Envelope shared by every multi-page response.
pub(crate) fn document_json<T>(run: &DocumentRun<T>, key: &str, entries: Vec<Value>) -> Value {
    let mut value = json!({
        "file_type": "pdf",
        "total_pages": run.total_pages,
        "processed_pages": run.processed_pages,
    });
    if let Some(limit) = run.max_pages_limit {
        value["max_pages_limit"] = json!(limit);
    }
    value[key] = Value::Array(entries);
    let skipped = run.skipped();
    if !skipped.is_empty() {
        value["skipped_pages"] = json!(skipped);
    }
    value
}

/// Plain text of an OCR run, pages separated by a blank line.
pub fn ocr_text(run: &DocumentRun<OcrPageResult>) -> String {
    run.pages().map(OcrPageResult::text).join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FormulaResult, OcrItem, PageAnalysis, TableCell, TableStructure};
    use crate::oarocr::orchestrator::PageOutcome;
    use crate::processors::{BoundingBox, Rect};
    use image::{Rgb, RgbImage};
    use std::collections::HashMap;

    fn region(y: f32, region_type: RegionType, content: RegionContent) -> LayoutRegion {
        LayoutRegion::new(Rect::new(10.0, y, 90.0, y + 20.0), region_type, 0.9).with_content(content)
    }

    fn text(y: f32, region_type: RegionType, value: &str) -> LayoutRegion {
        region(y, region_type, RegionContent::Text { text: value.to_string() })
    }

    fn page(number: usize, regions: Vec<LayoutRegion>) -> AnalyzedPage {
        let image = RgbImage::from_fn(100, 300, |x, y| Rgb([(x * 2) as u8, y as u8, 7]));
        let mut analysis = PageAnalysis::new(number, 100, 300);
        analysis.regions = regions;
        AnalyzedPage { analysis, image }
    }

    fn run(pages: Vec<AnalyzedPage>) -> DocumentRun<AnalyzedPage> {
        DocumentRun {
            source_kind: SourceKind::Pdf,
            total_pages: pages.len(),
            processed_pages: pages.len(),
            max_pages_limit: None,
            outcomes: pages.into_iter().map(PageOutcome::Ok).collect(),
        }
    }

    fn references(markdown: &str) -> Vec<String> {
        let re = Regex::new(r"!\[[^\]]*\]\(([^)]+)\)").unwrap();
        re.captures_iter(markdown).map(|c| c[1].to_string()).collect()
    }

    #[test]
    fn test_title_levels() {
        assert_eq!(title_level("1.2.3 Details"), (3, "1.2.3 Details".to_string()));
        assert_eq!(title_level("2. Methods"), (1, "2 Methods".to_string()));
        assert_eq!(title_level("Related work"), (2, "Related work".to_string()));
        assert_eq!(title_level("一、 绪论").0, 1);
        assert_eq!(title_level("1.2.3.4.5.6.7 Deep").0, 6);
    }

    #[test]
    fn test_asset_name_format() {
        let name = asset_name(b"png bytes");
        assert!(name.starts_with("img_") && name.ends_with(".png"));
        assert_eq!(name.len(), "img_".len() + 16 + ".png".len());
        assert_eq!(name, asset_name(b"png bytes"));
    }

    #[test]
    fn test_markdown_block_rules() {
        let table = TableStructure::new(vec![TableCell::new(0, 0, "a")], 0.9);
        let mut list = text(200.0, RegionType::List, "one two");
        list.ocr_items = vec![
            OcrItem::new(BoundingBox::from_coords(0.0, 0.0, 1.0, 1.0), "one", 0.9),
            OcrItem::new(BoundingBox::from_coords(0.0, 2.0, 1.0, 3.0), "two", 0.9),
        ];
        let page = page(
            1,
            vec![
                text(0.0, RegionType::DocTitle, "Report"),
                text(20.0, RegionType::Header, "running header"),
                text(40.0, RegionType::ParagraphTitle, "1.1 Scope"),
                text(60.0, RegionType::Text, "Body text."),
                region(80.0, RegionType::Table, RegionContent::Table(table)),
                region(100.0, RegionType::Formula, RegionContent::Formula(FormulaResult::new("x^2", 0.9))),
                text(120.0, RegionType::FigureTitle, "Figure 1"),
                text(140.0, RegionType::Formula, "x squared"),
                text(160.0, RegionType::Number, "7"),
                list,
            ],
        );
        let artifact = page_markdown(&page).unwrap();
        let expected = [
            "# Report",
            "## 1.1 Scope",
            "Body text.",
            "<table><tr><td>a</td></tr></table>",
            "$$x^2$$",
            "*Figure 1*",
            "x squared",
            "- one\n- two",
        ]
        .join("\n\n");
        assert_eq!(artifact.markdown, expected);
        assert!(artifact.images.is_empty());
    }

    #[test]
    fn test_references_and_assets_correspond() {
        let first = page(
            1,
            vec![
                region(0.0, RegionType::Image, RegionContent::Asset),
                text(30.0, RegionType::Text, "between"),
                region(60.0, RegionType::Seal, RegionContent::Asset),
                // Same pixels as the first image.
                region(0.0, RegionType::Image, RegionContent::Asset),
            ],
        );
        let second = page(2, vec![region(100.0, RegionType::Chart, RegionContent::Asset)]);
        let artifact = document_markdown(&run(vec![first, second])).unwrap();

        let refs = references(&artifact.markdown);
        assert_eq!(refs.len(), 4);
        let assets: HashMap<&str, usize> = artifact
            .images
            .iter()
            .map(|a| a.filename.as_str())
            .counts();
        for name in &refs {
            assert_eq!(assets.get(name.as_str()), Some(&1));
        }
        let referenced: HashSet<&str> = refs.iter().map(String::as_str).collect();
        assert_eq!(referenced.len(), artifact.images.len());
        assert_eq!(artifact.markdown.matches(PAGE_SEPARATOR).count(), 1);
        assert!(artifact.markdown.contains("![seal]("));
    }

    #[test]
    fn test_region_outside_page_has_no_reference_or_asset() {
        let mut outside = region(0.0, RegionType::Image, RegionContent::Asset);
        outside.bbox = Rect::new(500.0, 500.0, 600.0, 600.0);
        let artifact = page_markdown(&page(1, vec![outside])).unwrap();
        assert!(artifact.markdown.is_empty());
        assert!(artifact.images.is_empty());
    }

    #[test]
    fn test_assets_of_rotated_page_are_upright() {
        let mut rotated = page(1, vec![region(0.0, RegionType::Image, RegionContent::Asset)]);
        rotated.analysis.rotation = 90;
        let artifact = page_markdown(&rotated).unwrap();
        let asset = crate::utils::decode_image(&artifact.images[0].data).unwrap();
        // The 80x20 crop of the scanned page is stored turned upright.
        assert_eq!(asset.dimensions(), (20, 80));
    }

    #[test]
    fn test_markdown_json_encodes_base64() {
        let artifact = page_markdown(&page(1, vec![region(0.0, RegionType::Image, RegionContent::Asset)])).unwrap();
        let value = serde_json::to_value(&artifact).unwrap();
        let data = value["images"][0]["data"].as_str().unwrap();
        assert!(data.starts_with("iVBORw0KGgo"));
        assert_eq!(value["images"][0]["filename"], artifact.images[0].filename);
    }

    #[test]
    fn test_structure_json_shapes() {
        let single = DocumentRun {
            source_kind: SourceKind::Image,
            total_pages: 1,
            processed_pages: 1,
            max_pages_limit: None,
            outcomes: vec![PageOutcome::Ok(page(1, vec![text(0.0, RegionType::Text, "hi")]))],
        };
        let value = structure_json(&single);
        assert_eq!(value["regions"][0]["text"], "hi");
        assert_eq!(value["rotation"], 0);
        assert!(value.get("file_type").is_none());

        let mut pdf = run(vec![page(1, vec![]), page(3, vec![])]);
        pdf.total_pages = 3;
        pdf.outcomes.insert(
            1,
            PageOutcome::Skipped {
                page_number: 2,
                reason: "broken".to_string(),
            },
        );
        let value = structure_json(&pdf);
        assert_eq!(value["file_type"], "pdf");
        assert_eq!(value["total_pages"], 3);
        assert_eq!(value["pages"].as_array().unwrap().len(), 2);
        assert_eq!(value["pages"][1]["page_number"], 3);
        assert_eq!(value["skipped_pages"][0]["page_number"], 2);
    }
}
