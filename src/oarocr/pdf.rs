//! PDF rasterization through PDFium.

use crate::core::config::RenderSettings;
use crate::core::{OCRError, OcrResult};
use crate::oarocr::orchestrator::{ImageSource, PageSource, SourceKind};
use crate::utils::{decode_image, flatten_alpha, is_pdf_bytes};
use image::RgbImage;
use pdfium_render::prelude::*;
use tracing::debug;

/// PDF points per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Pixel size of a page of `width_pt x height_pt` points.
///
/// The page is scaled to the configured DPI; when the longer side would exceed
/// `max_dimension` both sides shrink by the same factor.
pub fn render_size(width_pt: f32, height_pt: f32, settings: &RenderSettings) -> (u32, u32) {
    let scale = settings.dpi / POINTS_PER_INCH;
    let (mut width, mut height) = (width_pt * scale, height_pt * scale);
    let longest = width.max(height);
    let limit = settings.max_dimension as f32;
    if longest > limit {
        let ratio = limit / longest;
        width *= ratio;
        height *= ratio;
    }
    ((width.round() as u32).max(1), (height.round() as u32).max(1))
}

/// A bound PDFium library plus render settings.
pub struct PdfRasterizer {
    pdfium: Pdfium,
    settings: RenderSettings,
}

impl PdfRasterizer {
    /// Binds PDFium from the working directory, common library folders, or the system.
    pub fn new(settings: RenderSettings) -> OcrResult<Self> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("/usr/lib")))
            .or_else(|_| {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("/usr/local/lib"))
            })
            .or_else(|_| {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("/opt/homebrew/lib"))
            })
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| OCRError::ConfigError {
                message: format!("could not find the PDFium library: {e}"),
            })?;
        Ok(Self {
            pdfium: Pdfium::new(bindings),
            settings,
        })
    }

    /// Opens a PDF held in memory.
    pub fn open<'a>(&'a self, bytes: &'a [u8]) -> OcrResult<PdfPages<'a>> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| OCRError::UnsupportedInput {
                message: format!("unreadable PDF: {e}"),
            })?;
        debug!(pages = document.pages().len(), "opened PDF");
        Ok(PdfPages {
            document,
            settings: &self.settings,
        })
    }
}

/// Pages of an open PDF.
pub struct PdfPages<'a> {
    document: PdfDocument<'a>,
    settings: &'a RenderSettings,
}

impl PdfPages<'_> {
    fn render(&self, index: usize) -> Result<RgbImage, String> {
        let index = u16::try_from(index).map_err(|_| format!("page index {index} out of range"))?;
        let page = self.document.pages().get(index).map_err(|e| e.to_string())?;
        let (width, height) = render_size(page.width().value, page.height().value, self.settings);
        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_target_height(height as i32)
            .render_form_data(true)
            .render_annotations(true);
        let bitmap = page.render_with_config(&config).map_err(|e| e.to_string())?;
        Ok(flatten_alpha(bitmap.as_image()))
    }
}

impl PageSource for PdfPages<'_> {
    fn kind(&self) -> SourceKind {
        SourceKind::Pdf
    }

    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn render_page(&self, index: usize) -> OcrResult<RgbImage> {
        self.render(index)
            .map_err(|message| OCRError::PageRenderFailure {
                page: index + 1,
                message,
            })
    }
}

/// Opens `bytes` as a page source and passes it to `f`.
///
/// PDFs are detected by their magic number; everything else must decode as an
/// image, otherwise the input is rejected as unsupported.
pub fn with_page_source<T>(
    bytes: &[u8],
    settings: &RenderSettings,
    f: impl FnOnce(&dyn PageSource) -> OcrResult<T>,
) -> OcrResult<T> {
    if is_pdf_bytes(bytes) {
        let rasterizer = PdfRasterizer::new(settings.clone())?;
        let pages = rasterizer.open(bytes)?;
        f(&pages)
    } else {
        let source = ImageSource::new(decode_image(bytes)?);
        f(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_size_at_300_dpi() {
        // US Letter
        let size = render_size(612.0, 792.0, &RenderSettings::default());
        assert_eq!(size, (2550, 3300));
    }

    #[test]
    fn test_render_size_capped() {
        let settings = RenderSettings {
            dpi: 300.0,
            max_dimension: 1000,
        };
        let (w, h) = render_size(612.0, 792.0, &settings);
        assert_eq!(h, 1000);
        assert_eq!(w, 773);
    }

    #[test]
    fn test_image_bytes_open_as_single_page() {
        let png = crate::utils::encode_png(&RgbImage::new(3, 2)).unwrap();
        let pages = with_page_source(&png, &RenderSettings::default(), |source| {
            assert_eq!(source.kind(), SourceKind::Image);
            Ok(source.page_count())
        })
        .unwrap();
        assert_eq!(pages, 1);
    }

    #[test]
    fn test_garbage_is_unsupported() {
        let err = with_page_source(b"hello world", &RenderSettings::default(), |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, OCRError::UnsupportedInput { .. }));
    }
}
