//! Document structure result types.
//!
//! A page analysis is a list of [`LayoutRegion`]s in reading order. Each region
//! carries a closed [`RegionType`] and, once its handler has run, a
//! [`RegionContent`] payload.

use crate::processors::{BoundingBox, Rect};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// Layout region type covering the PP-DocLayout label sets (20 and 23 classes).
///
/// Labels a model emits that have no variant map to [`RegionType::Other`]; the
/// raw label is kept on the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionType {
    /// Document title
    DocTitle,
    /// Paragraph/section title
    ParagraphTitle,
    /// General text content
    Text,
    /// Table of contents
    Content,
    /// Abstract section
    Abstract,
    /// Image or figure
    Image,
    /// Table
    Table,
    /// Chart or graph
    Chart,
    /// Mathematical formula
    Formula,
    /// Figure caption
    FigureTitle,
    /// Table caption
    TableTitle,
    /// Chart caption
    ChartTitle,
    /// Combined figure/table/chart caption
    FigureTableChartTitle,
    /// Page header
    Header,
    /// Header image
    HeaderImage,
    /// Page footer
    Footer,
    /// Footer image
    FooterImage,
    /// Footnote
    Footnote,
    /// Stamp or official seal
    Seal,
    /// Page number
    Number,
    /// Reference section
    Reference,
    /// Reference content
    ReferenceContent,
    /// Algorithm block
    Algorithm,
    /// Formula number
    FormulaNumber,
    /// Marginal/aside text
    AsideText,
    /// List items
    List,
    /// Unknown label
    Other,
}

impl RegionType {
    /// Every variant, in declaration order.
    pub const ALL: [RegionType; 27] = [
        RegionType::DocTitle,
        RegionType::ParagraphTitle,
        RegionType::Text,
        RegionType::Content,
        RegionType::Abstract,
        RegionType::Image,
        RegionType::Table,
        RegionType::Chart,
        RegionType::Formula,
        RegionType::FigureTitle,
        RegionType::TableTitle,
        RegionType::ChartTitle,
        RegionType::FigureTableChartTitle,
        RegionType::Header,
        RegionType::HeaderImage,
        RegionType::Footer,
        RegionType::FooterImage,
        RegionType::Footnote,
        RegionType::Seal,
        RegionType::Number,
        RegionType::Reference,
        RegionType::ReferenceContent,
        RegionType::Algorithm,
        RegionType::FormulaNumber,
        RegionType::AsideText,
        RegionType::List,
        RegionType::Other,
    ];

    /// Label string used in JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionType::DocTitle => "doc_title",
            RegionType::ParagraphTitle => "paragraph_title",
            RegionType::Text => "text",
            RegionType::Content => "content",
            RegionType::Abstract => "abstract",
            RegionType::Image => "image",
            RegionType::Table => "table",
            RegionType::Chart => "chart",
            RegionType::Formula => "formula",
            RegionType::FigureTitle => "figure_title",
            RegionType::TableTitle => "table_title",
            RegionType::ChartTitle => "chart_title",
            RegionType::FigureTableChartTitle => "figure_table_chart_title",
            RegionType::Header => "header",
            RegionType::HeaderImage => "header_image",
            RegionType::Footer => "footer",
            RegionType::FooterImage => "footer_image",
            RegionType::Footnote => "footnote",
            RegionType::Seal => "seal",
            RegionType::Number => "number",
            RegionType::Reference => "reference",
            RegionType::ReferenceContent => "reference_content",
            RegionType::Algorithm => "algorithm",
            RegionType::FormulaNumber => "formula_number",
            RegionType::AsideText => "aside_text",
            RegionType::List => "list",
            RegionType::Other => "other",
        }
    }

    /// Maps a model label to a region type.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "doc_title" => RegionType::DocTitle,
            "paragraph_title" | "title" => RegionType::ParagraphTitle,
            "text" | "paragraph" => RegionType::Text,
            "content" => RegionType::Content,
            "abstract" => RegionType::Abstract,
            "image" | "figure" => RegionType::Image,
            "table" => RegionType::Table,
            "chart" | "flowchart" => RegionType::Chart,
            "formula" | "equation" => RegionType::Formula,
            "figure_title" => RegionType::FigureTitle,
            "table_title" => RegionType::TableTitle,
            "chart_title" => RegionType::ChartTitle,
            "figure_table_chart_title" | "caption" => RegionType::FigureTableChartTitle,
            "header" => RegionType::Header,
            "header_image" => RegionType::HeaderImage,
            "footer" => RegionType::Footer,
            "footer_image" => RegionType::FooterImage,
            "footnote" => RegionType::Footnote,
            "seal" => RegionType::Seal,
            "number" => RegionType::Number,
            "reference" => RegionType::Reference,
            "reference_content" => RegionType::ReferenceContent,
            "algorithm" => RegionType::Algorithm,
            "formula_number" => RegionType::FormulaNumber,
            "aside_text" => RegionType::AsideText,
            "list" => RegionType::List,
            _ => RegionType::Other,
        }
    }

    /// Returns whether this type is a caption variant.
    pub fn is_caption(&self) -> bool {
        matches!(
            self,
            RegionType::FigureTitle
                | RegionType::TableTitle
                | RegionType::ChartTitle
                | RegionType::FigureTableChartTitle
        )
    }

    /// Page furniture that Markdown output leaves out.
    pub fn is_page_furniture(&self) -> bool {
        matches!(
            self,
            RegionType::Header
                | RegionType::HeaderImage
                | RegionType::Footer
                | RegionType::FooterImage
                | RegionType::Number
                | RegionType::AsideText
        )
    }
}

impl std::fmt::Display for RegionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recognized text line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrItem {
    /// Quadrilateral in page pixel coordinates.
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    /// Recognized text.
    pub text: String,
    /// Recognition confidence.
    pub text_confidence: f32,
}

impl OcrItem {
    /// Creates a new OCR item.
    pub fn new(bbox: BoundingBox, text: impl Into<String>, text_confidence: f32) -> Self {
        Self {
            bbox,
            text: text.into(),
            text_confidence,
        }
    }
}

/// A cell in a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    /// Row index (0-based)
    pub row: usize,
    /// Column index (0-based)
    pub col: usize,
    /// Row span
    pub row_span: usize,
    /// Column span
    pub col_span: usize,
    /// Text content of the cell
    pub text: String,
    /// Cell box in page coordinates, when the recognizer reports one
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bbox: Option<Rect>,
}

impl TableCell {
    /// Creates a single-span cell.
    pub fn new(row: usize, col: usize, text: impl Into<String>) -> Self {
        Self {
            row,
            col,
            row_span: 1,
            col_span: 1,
            text: text.into(),
            bbox: None,
        }
    }

    /// Sets the row and column spans.
    pub fn with_span(mut self, row_span: usize, col_span: usize) -> Self {
        self.row_span = row_span.max(1);
        self.col_span = col_span.max(1);
        self
    }
}

/// Result of table recognition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStructure {
    /// Detected cells
    pub cells: Vec<TableCell>,
    /// HTML produced by the recognizer, if it emits one directly
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub html: Option<String>,
    /// Structure recognition confidence
    pub confidence: f32,
}

impl TableStructure {
    /// Creates a table from its cells.
    pub fn new(cells: Vec<TableCell>, confidence: f32) -> Self {
        Self {
            cells,
            html: None,
            confidence,
        }
    }

    /// Sets the recognizer's HTML.
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Renders the table as HTML.
    ///
    /// Uses the recognizer's HTML when present; otherwise builds `<tr>`/`<td>`
    /// rows from the cell grid, honouring spans.
    pub fn to_html(&self) -> String {
        if let Some(html) = &self.html {
            return html.clone();
        }
        let mut rows: Vec<Vec<&TableCell>> = Vec::new();
        for cell in &self.cells {
            if rows.len() <= cell.row {
                rows.resize_with(cell.row + 1, Vec::new);
            }
            rows[cell.row].push(cell);
        }

        let mut html = String::from("<table>");
        for row in rows.iter_mut() {
            row.sort_by_key(|c| c.col);
            html.push_str("<tr>");
            for cell in row.iter() {
                html.push_str("<td");
                if cell.row_span > 1 {
                    html.push_str(&format!(" rowspan=\"{}\"", cell.row_span));
                }
                if cell.col_span > 1 {
                    html.push_str(&format!(" colspan=\"{}\"", cell.col_span));
                }
                html.push('>');
                html.push_str(&escape_html(&cell.text));
                html.push_str("</td>");
            }
            html.push_str("</tr>");
        }
        html.push_str("</table>");
        html
    }
}

/// Result of formula recognition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaResult {
    /// LaTeX representation of the formula
    pub latex: String,
    /// Confidence score for the recognition
    pub confidence: f32,
}

impl FormulaResult {
    /// Creates a new formula result.
    pub fn new(latex: impl Into<String>, confidence: f32) -> Self {
        Self {
            latex: latex.into(),
            confidence,
        }
    }
}

/// Type-dependent payload of a region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegionContent {
    /// Plain text, from OCR or a chart recognizer.
    Text {
        /// The text.
        text: String,
    },
    /// Recognized table structure.
    Table(TableStructure),
    /// Recognized formula markup.
    Formula(FormulaResult),
    /// Kept as an image; the pixels are the region crop.
    Asset,
}

/// A detected layout region.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutRegion {
    /// Axis-aligned box in original page pixels
    pub bbox: Rect,
    /// Closed region type
    pub region_type: RegionType,
    /// Label as emitted by the layout model
    pub label: String,
    /// Detection confidence
    pub confidence: f32,
    /// Handler output, `None` until routed
    pub content: Option<RegionContent>,
    /// Text lines that produced the text content
    pub ocr_items: Vec<OcrItem>,
    /// Page number, set when regions are flattened across pages
    pub page_number: Option<usize>,
}

impl LayoutRegion {
    /// Creates a region without content.
    pub fn new(bbox: Rect, region_type: RegionType, confidence: f32) -> Self {
        Self {
            bbox,
            region_type,
            label: region_type.as_str().to_string(),
            confidence,
            content: None,
            ocr_items: Vec::new(),
            page_number: None,
        }
    }

    /// Sets the raw model label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the content.
    pub fn with_content(mut self, content: RegionContent) -> Self {
        self.content = Some(content);
        self
    }

    /// Sets plain-text content.
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_content(RegionContent::Text { text: text.into() })
    }

    /// Plain-text view of the content: OCR text or formula LaTeX.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Some(RegionContent::Text { text }) => Some(text.as_str()),
            Some(RegionContent::Formula(formula)) => Some(formula.latex.as_str()),
            _ => None,
        }
    }
}

impl Serialize for LayoutRegion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("LayoutRegion", 7)?;
        state.serialize_field("type", &self.region_type)?;
        state.serialize_field("label", &self.label)?;
        state.serialize_field("bbox", &self.bbox)?;
        state.serialize_field("confidence", &self.confidence)?;
        match self.text() {
            Some(text) => state.serialize_field("text", text)?,
            None => state.skip_field("text")?,
        }
        match &self.content {
            Some(content) => state.serialize_field("content", content)?,
            None => state.skip_field("content")?,
        }
        if self.ocr_items.is_empty() {
            state.skip_field("ocr_items")?;
        } else {
            state.serialize_field("ocr_items", &self.ocr_items)?;
        }
        match self.page_number {
            Some(page) => state.serialize_field("page_number", &page)?,
            None => state.skip_field("page_number")?,
        }
        state.end()
    }
}

/// Analysis of one page, regions in reading order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageAnalysis {
    /// 1-based page number
    pub page_number: usize,
    /// Page width in pixels
    pub width: u32,
    /// Page height in pixels
    pub height: u32,
    /// Orientation applied before analysis (0, 90, 180 or 270)
    pub rotation: u32,
    /// Regions in reading order
    pub regions: Vec<LayoutRegion>,
}

impl PageAnalysis {
    /// Creates an empty analysis for a page.
    pub fn new(page_number: usize, width: u32, height: u32) -> Self {
        Self {
            page_number,
            width,
            height,
            rotation: 0,
            regions: Vec::new(),
        }
    }

    /// Stamps every region with this page's number.
    pub fn stamp_page_numbers(&mut self) {
        for region in &mut self.regions {
            region.page_number = Some(self.page_number);
        }
    }
}

/// Escapes HTML special characters.
pub(crate) fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_type_label_round_trip() {
        for region_type in RegionType::ALL {
            assert_eq!(RegionType::from_label(region_type.as_str()), region_type);
            let json = serde_json::to_string(&region_type).unwrap();
            assert_eq!(json, format!("\"{}\"", region_type.as_str()));
        }
        assert_eq!(RegionType::from_label("Figure"), RegionType::Image);
        assert_eq!(RegionType::from_label("mystery"), RegionType::Other);
    }

    #[test]
    fn test_layout_region_json_shape() {
        let region = LayoutRegion::new(Rect::new(1.0, 2.0, 30.0, 40.0), RegionType::Text, 0.9)
            .with_text("hello");
        let value = serde_json::to_value(&region).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["bbox"], serde_json::json!([1.0, 2.0, 30.0, 40.0]));
        assert_eq!(value["text"], "hello");
        assert_eq!(value["content"]["kind"], "text");
        assert!(value.get("page_number").is_none());
        assert!(value.get("ocr_items").is_none());
    }

    #[test]
    fn test_formula_region_exposes_latex_as_text() {
        let region = LayoutRegion::new(Rect::new(0.0, 0.0, 5.0, 5.0), RegionType::Formula, 0.8)
            .with_content(RegionContent::Formula(FormulaResult::new("x^2", 0.7)));
        assert_eq!(region.text(), Some("x^2"));

        let asset = LayoutRegion::new(Rect::new(0.0, 0.0, 5.0, 5.0), RegionType::Image, 0.8)
            .with_content(RegionContent::Asset);
        assert_eq!(asset.text(), None);
        let value = serde_json::to_value(&asset).unwrap();
        assert_eq!(value["content"]["kind"], "asset");
    }

    #[test]
    fn test_table_structure_to_html() {
        let table = TableStructure::new(
            vec![
                TableCell::new(0, 0, "Name").with_span(1, 2),
                TableCell::new(1, 1, "b<c"),
                TableCell::new(1, 0, "a"),
            ],
            0.9,
        );
        assert_eq!(
            table.to_html(),
            "<table><tr><td colspan=\"2\">Name</td></tr><tr><td>a</td><td>b&lt;c</td></tr></table>"
        );
        let given = TableStructure::new(vec![], 0.5).with_html("<table></table>");
        assert_eq!(given.to_html(), "<table></table>");
    }

    #[test]
    fn test_stamp_page_numbers() {
        let mut page = PageAnalysis::new(3, 10, 10);
        page.regions
            .push(LayoutRegion::new(Rect::new(0.0, 0.0, 1.0, 1.0), RegionType::Text, 1.0));
        page.stamp_page_numbers();
        assert_eq!(page.regions[0].page_number, Some(3));
    }
}
