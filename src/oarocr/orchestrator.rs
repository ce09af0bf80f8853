//! Multi-page orchestration.
//!
//! A [`PageSource`] yields page rasters one at a time; [`PageOrchestrator`]
//! walks them in order up to an optional page cap and runs a per-page stage on
//! each. A page that fails to render is recorded as skipped and the remaining
//! pages still run; any other error fails the whole request.

use crate::core::{OCRError, OcrResult};
use image::RgbImage;
use serde::Serialize;
use tracing::{info, warn};

/// Where the pages came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A single raster image.
    Image,
    /// A PDF document.
    Pdf,
}

/// Something that can rasterize pages on demand.
pub trait PageSource {
    /// Kind of the source.
    fn kind(&self) -> SourceKind;

    /// Number of pages in the source.
    fn page_count(&self) -> usize;

    /// Rasterizes the 0-based page `index`.
    ///
    /// Implementations report a page that cannot be drawn as
    /// [`OCRError::PageRenderFailure`].
    fn render_page(&self, index: usize) -> OcrResult<RgbImage>;
}

/// A single decoded image as a one-page source.
#[derive(Debug, Clone)]
pub struct ImageSource {
    image: RgbImage,
}

impl ImageSource {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }
}

impl PageSource for ImageSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Image
    }

    fn page_count(&self) -> usize {
        1
    }

    fn render_page(&self, index: usize) -> OcrResult<RgbImage> {
        if index == 0 {
            Ok(self.image.clone())
        } else {
            Err(OCRError::PageRenderFailure {
                page: index + 1,
                message: "an image source has a single page".to_string(),
            })
        }
    }
}

/// Outcome of one page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome<T> {
    /// The page was processed.
    Ok(T),
    /// The page could not be rendered and was left out.
    Skipped {
        /// 1-based page number.
        page_number: usize,
        /// Why the page was skipped.
        reason: String,
    },
}

/// A page that was left out of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedPage {
    pub page_number: usize,
    pub reason: String,
}

/// Result of running a stage over a document.
#[derive(Debug, Clone)]
pub struct DocumentRun<T> {
    /// Kind of the source.
    pub source_kind: SourceKind,
    /// Pages in the source.
    pub total_pages: usize,
    /// Pages attempted; never more than `total_pages` or the cap.
    pub processed_pages: usize,
    /// Cap that applied to this run, if any.
    pub max_pages_limit: Option<usize>,
    /// One outcome per attempted page, in page order.
    pub outcomes: Vec<PageOutcome<T>>,
}

impl<T> DocumentRun<T> {
    /// Successfully processed pages.
    pub fn pages(&self) -> impl Iterator<Item = &T> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            PageOutcome::Ok(page) => Some(page),
            PageOutcome::Skipped { .. } => None,
        })
    }

    /// Pages that were skipped.
    pub fn skipped(&self) -> Vec<SkippedPage> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                PageOutcome::Skipped {
                    page_number,
                    reason,
                } => Some(SkippedPage {
                    page_number: *page_number,
                    reason: reason.clone(),
                }),
                PageOutcome::Ok(_) => None,
            })
            .collect()
    }

    /// Whether the cap cut the document short.
    pub fn truncated(&self) -> bool {
        self.processed_pages < self.total_pages
    }

    /// Applies `f` to every processed page.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> DocumentRun<U> {
        DocumentRun {
            source_kind: self.source_kind,
            total_pages: self.total_pages,
            processed_pages: self.processed_pages,
            max_pages_limit: self.max_pages_limit,
            outcomes: self
                .outcomes
                .into_iter()
                .map(|outcome| match outcome {
                    PageOutcome::Ok(page) => PageOutcome::Ok(f(page)),
                    PageOutcome::Skipped {
                        page_number,
                        reason,
                    } => PageOutcome::Skipped {
                        page_number,
                        reason,
                    },
                })
                .collect(),
        }
    }
}

/// Runs a per-page stage over every page of a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageOrchestrator {
    max_pages: Option<usize>,
}

impl PageOrchestrator {
    /// Processes every page.
    pub fn unlimited() -> Self {
        Self { max_pages: None }
    }

    /// Processes at most `max_pages` pages (at least one).
    pub fn with_max_pages(max_pages: usize) -> Self {
        Self {
            max_pages: Some(max_pages.max(1)),
        }
    }

    pub fn max_pages(&self) -> Option<usize> {
        self.max_pages
    }

    /// Renders each page in order and hands it to `stage` with its 1-based number.
    ///
    /// # Errors
    ///
    /// Errors from `stage`, and render errors other than
    /// [`OCRError::PageRenderFailure`], abort the run.
    pub fn run<S, T, F>(&self, source: &S, mut stage: F) -> OcrResult<DocumentRun<T>>
    where
        S: PageSource + ?Sized,
        F: FnMut(usize, RgbImage) -> OcrResult<T>,
    {
        let total_pages = source.page_count();
        let processed_pages = self
            .max_pages
            .map_or(total_pages, |cap| cap.min(total_pages));
        if processed_pages < total_pages {
            info!(total_pages, processed_pages, "page cap reached, remaining pages not processed");
        }

        let mut outcomes = Vec::with_capacity(processed_pages);
        for index in 0..processed_pages {
            let page_number = index + 1;
            let image = match source.render_page(index) {
                Ok(image) => image,
                Err(OCRError::PageRenderFailure { page, message }) => {
                    warn!(page, %message, "skipping page that failed to render");
                    outcomes.push(PageOutcome::Skipped {
                        page_number,
                        reason: message,
                    });
                    continue;
                }
                Err(err) => return Err(err),
            };
            info!(page = page_number, width = image.width(), height = image.height(), "processing page");
            outcomes.push(PageOutcome::Ok(stage(page_number, image)?));
        }

        Ok(DocumentRun {
            source_kind: source.kind(),
            total_pages,
            processed_pages,
            max_pages_limit: self.max_pages,
            outcomes,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Source with `pages` blank pages, failing to render the listed ones.
    pub(crate) struct FakePdf {
        pub pages: usize,
        pub broken: Vec<usize>,
    }

    impl PageSource for FakePdf {
        fn kind(&self) -> SourceKind {
            SourceKind::Pdf
        }

        fn page_count(&self) -> usize {
            self.pages
        }

        fn render_page(&self, index: usize) -> OcrResult<RgbImage> {
            if self.broken.contains(&index) {
                return Err(OCRError::PageRenderFailure {
                    page: index + 1,
                    message: "corrupt content stream".to_string(),
                });
            }
            Ok(RgbImage::new(10 + index as u32, 10))
        }
    }

    #[test]
    fn test_max_pages_caps_processing() {
        let source = FakePdf {
            pages: 5,
            broken: vec![],
        };
        let run = PageOrchestrator::with_max_pages(2)
            .run(&source, |page, image| Ok((page, image.width())))
            .unwrap();
        assert_eq!(run.total_pages, 5);
        assert_eq!(run.processed_pages, 2);
        assert_eq!(run.max_pages_limit, Some(2));
        assert!(run.truncated());
        let pages: Vec<_> = run.pages().cloned().collect();
        assert_eq!(pages, vec![(1, 10), (2, 11)]);
    }

    #[test]
    fn test_unlimited_processes_every_page() {
        let source = FakePdf {
            pages: 3,
            broken: vec![],
        };
        let run = PageOrchestrator::unlimited().run(&source, |page, _| Ok(page)).unwrap();
        assert_eq!(run.processed_pages, 3);
        assert_eq!(run.max_pages_limit, None);
        assert!(!run.truncated());
    }

    #[test]
    fn test_render_failure_skips_only_that_page() {
        let source = FakePdf {
            pages: 3,
            broken: vec![1],
        };
        let run = PageOrchestrator::unlimited().run(&source, |page, _| Ok(page)).unwrap();
        assert_eq!(run.pages().copied().collect::<Vec<_>>(), vec![1, 3]);
        let skipped = run.skipped();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].page_number, 2);
    }

    #[test]
    fn test_stage_error_aborts_run() {
        let source = FakePdf {
            pages: 3,
            broken: vec![],
        };
        let result = PageOrchestrator::unlimited().run(&source, |page, _| {
            if page == 2 {
                Err(OCRError::inference_error("layout", "run", "boom"))
            } else {
                Ok(page)
            }
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_processed_pages_bounded() {
        for (pages, cap) in [(0, 2), (1, 2), (2, 2), (7, 3), (3, 10)] {
            let source = FakePdf {
                pages,
                broken: vec![],
            };
            let run = PageOrchestrator::with_max_pages(cap).run(&source, |p, _| Ok(p)).unwrap();
            assert!(run.processed_pages <= pages.min(cap));
            assert_eq!(run.outcomes.len(), run.processed_pages);
        }
    }

    #[test]
    fn test_image_source_is_single_page() {
        let source = ImageSource::new(RgbImage::new(4, 4));
        let run = PageOrchestrator::unlimited().run(&source, |p, _| Ok(p)).unwrap();
        assert_eq!(run.source_kind, SourceKind::Image);
        assert_eq!(run.total_pages, 1);
        let mapped = run.map(|p| p * 10);
        assert_eq!(mapped.pages().copied().collect::<Vec<_>>(), vec![10]);
    }
}
