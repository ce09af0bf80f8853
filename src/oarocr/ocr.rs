//! OCR subsystem.
//!
//! [`OcrEngine`] chains the text roles: optional document orientation, DB text
//! detection (which already unclips its boxes), rectified line crops, optional
//! text-line orientation and CTC recognition. It works on a whole page or on a
//! region crop; the structure analyzer uses the latter.

use crate::core::config::OcrParams;
use crate::core::traits::{OrientationClassifier, TextDetector, TextRecognizer};
use crate::core::{OCRError, OcrResult};
use crate::domain::OcrItem;
use crate::processors::{BoundingBox, BoxMerger};
use crate::utils::get_rotate_crop_image;
use image::RgbImage;
use image::imageops;
use rayon::prelude::*;
use serde::Serialize;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lines whose top edges differ by less than this many pixels share a row.
const SAME_ROW_TOLERANCE: f32 = 10.0;
/// Lines below this confidence are left out of plain-text output.
pub const TEXT_MIN_CONFIDENCE: f32 = 0.1;

/// Orientation applied to a page before detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationCorrection {
    /// Angle reported by the classifier (0, 90, 180 or 270).
    pub angle: u32,
    /// Classifier confidence.
    pub confidence: f32,
    /// Width of the corrected image.
    pub rotated_width: u32,
    /// Height of the corrected image.
    pub rotated_height: u32,
}

impl OrientationCorrection {
    /// Maps a box on the corrected image back onto the original page.
    pub fn map_back(&self, bbox: &BoundingBox) -> BoundingBox {
        bbox.rotate_back_to_original(self.angle, self.rotated_width, self.rotated_height)
    }
}

/// Rotates an image so content classified at `angle` becomes upright.
pub fn apply_rotation(image: &RgbImage, angle: u32) -> Option<RgbImage> {
    match angle {
        90 => Some(imageops::rotate270(image)),
        180 => Some(imageops::rotate180(image)),
        270 => Some(imageops::rotate90(image)),
        _ => None,
    }
}

/// One recognized text line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrLine {
    /// Quadrilateral in original image coordinates.
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    /// Recognized text.
    pub text: String,
    /// Recognition confidence.
    pub text_confidence: f32,
    /// Text-line orientation (0 or 180) that was applied before recognition.
    pub rotation: u32,
    /// Confidence of the text-line classifier, 0 when it did not run.
    pub rotation_confidence: f32,
}

impl OcrLine {
    /// Converts to the result-model OCR item.
    pub fn to_item(&self) -> OcrItem {
        OcrItem::new(self.bbox.clone(), self.text.clone(), self.text_confidence)
    }
}

/// OCR output for one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrPageResult {
    /// 1-based page number.
    pub page_number: usize,
    /// Page rotation applied before detection (0, 90, 180 or 270).
    pub rotation: u32,
    /// Recognized lines, top to bottom.
    pub results: Vec<OcrLine>,
}

impl OcrPageResult {
    /// Plain text of the page, see [`ocr2text`].
    pub fn text(&self) -> String {
        ocr2text(&self.results)
    }
}

/// Joins confident, non-blank lines with newlines.
pub fn ocr2text(lines: &[OcrLine]) -> String {
    lines
        .iter()
        .filter(|line| line.text_confidence >= TEXT_MIN_CONFIDENCE && !line.text.trim().is_empty())
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Sorts boxes top to bottom, then left to right within a row.
///
/// Boxes whose top-left corners are within [`SAME_ROW_TOLERANCE`] vertically
/// are treated as one row.
pub fn sort_text_boxes<T>(items: &mut [T], bbox: impl Fn(&T) -> &BoundingBox) {
    items.sort_by(|a, b| {
        let (a, b) = (bbox(a), bbox(b));
        a.y_min()
            .partial_cmp(&b.y_min())
            .unwrap_or(Ordering::Equal)
            .then(a.x_min().partial_cmp(&b.x_min()).unwrap_or(Ordering::Equal))
    });
    for i in 0..items.len().saturating_sub(1) {
        for j in (0..=i).rev() {
            let (upper, lower) = (bbox(&items[j]), bbox(&items[j + 1]));
            if (lower.y_min() - upper.y_min()).abs() < SAME_ROW_TOLERANCE
                && lower.x_min() < upper.x_min()
            {
                items.swap(j, j + 1);
            } else {
                break;
            }
        }
    }
}

/// A rectified crop waiting for recognition.
struct LineCrop {
    bbox: BoundingBox,
    image: RgbImage,
    rotation: u32,
    rotation_confidence: f32,
}

/// Text detection and recognition over page or region images.
#[derive(Clone)]
pub struct OcrEngine {
    detector: Arc<dyn TextDetector>,
    recognizer: Arc<dyn TextRecognizer>,
    document_orientation: Option<Arc<dyn OrientationClassifier>>,
    text_line_orientation: Option<Arc<dyn OrientationClassifier>>,
}

impl std::fmt::Debug for OcrEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrEngine")
            .field("document_orientation", &self.document_orientation.is_some())
            .field("text_line_orientation", &self.text_line_orientation.is_some())
            .finish_non_exhaustive()
    }
}

impl OcrEngine {
    /// Starts a builder with the two required roles.
    pub fn builder(
        detector: Arc<dyn TextDetector>,
        recognizer: Arc<dyn TextRecognizer>,
    ) -> OcrEngineBuilder {
        OcrEngineBuilder::new(detector, recognizer)
    }

    /// Runs OCR on a whole page.
    ///
    /// The page is first corrected with the document orientation classifier
    /// (when present and `use_cls` is set); boxes are reported in the original
    /// orientation.
    pub fn predict(&self, image: &RgbImage, params: &OcrParams) -> OcrResult<OcrPageResult> {
        let (page, correction) = self.correct_orientation(image, params)?;
        let mut results = self.recognize_lines(&page, params)?;
        if let Some(correction) = correction {
            for line in &mut results {
                line.bbox = correction.map_back(&line.bbox);
            }
        }
        info!(lines = results.len(), "page OCR done");
        Ok(OcrPageResult {
            page_number: 1,
            rotation: correction.map(|c| c.angle).unwrap_or(0),
            results,
        })
    }

    /// Classifies the page orientation and rotates it upright.
    ///
    /// A rotation is applied only when the classifier confidence reaches
    /// `cls_thresh`; below it the page is left as is.
    pub fn correct_orientation<'a>(
        &self,
        image: &'a RgbImage,
        params: &OcrParams,
    ) -> OcrResult<(Cow<'a, RgbImage>, Option<OrientationCorrection>)> {
        let Some(classifier) = self.document_orientation.as_ref().filter(|_| params.use_cls)
        else {
            return Ok((Cow::Borrowed(image), None));
        };
        let Some(&(angle, confidence)) = classifier.classify(std::slice::from_ref(image))?.first()
        else {
            return Ok((Cow::Borrowed(image), None));
        };
        if confidence < params.cls_thresh {
            if angle != 0 {
                warn!(angle, confidence, cls_thresh = params.cls_thresh, "skipping low-confidence page rotation");
            }
            return Ok((Cow::Borrowed(image), None));
        }
        let Some(rotated) = apply_rotation(image, angle) else {
            return Ok((Cow::Borrowed(image), None));
        };
        debug!(angle, confidence, "page rotated upright");
        let correction = OrientationCorrection {
            angle,
            confidence,
            rotated_width: rotated.width(),
            rotated_height: rotated.height(),
        };
        Ok((Cow::Owned(rotated), Some(correction)))
    }

    /// Detects and recognizes lines on an upright image.
    ///
    /// Coordinates are relative to `image`. Lines with empty text or a score
    /// below `rec_score_thresh` are dropped; overlapping lines are merged when
    /// `merge_overlaps` is set.
    pub fn recognize_lines(&self, image: &RgbImage, params: &OcrParams) -> OcrResult<Vec<OcrLine>> {
        let mut boxes = self.detector.detect(image, params)?;
        if boxes.is_empty() {
            return Ok(Vec::new());
        }
        sort_text_boxes(&mut boxes, |(bbox, _)| bbox);

        let mut crops: Vec<LineCrop> = boxes
            .into_par_iter()
            .filter_map(|(bbox, _)| match get_rotate_crop_image(image, &bbox) {
                Ok(crop) => Some(LineCrop {
                    bbox,
                    image: crop,
                    rotation: 0,
                    rotation_confidence: 0.0,
                }),
                Err(err) => {
                    debug!(error = %err, "dropping text box that cannot be cropped");
                    None
                }
            })
            .collect();

        self.classify_line_orientations(&mut crops, params)?;

        let images: Vec<RgbImage> = crops.iter().map(|c| c.image.clone()).collect();
        let recognized = self.recognizer.recognize(&images)?;
        if recognized.len() != crops.len() {
            return Err(OCRError::inference_error(
                "text_recognition",
                "result count mismatch",
                format!("expected {} results, got {}", crops.len(), recognized.len()),
            ));
        }

        let lines: Vec<OcrLine> = crops
            .into_iter()
            .zip(recognized)
            .filter(|(_, (text, score))| !text.trim().is_empty() && *score >= params.rec_score_thresh)
            .map(|(crop, (text, score))| OcrLine {
                bbox: crop.bbox,
                text,
                text_confidence: score,
                rotation: crop.rotation,
                rotation_confidence: crop.rotation_confidence,
            })
            .collect();

        if params.merge_overlaps {
            return Ok(merge_lines(lines, params.overlap_threshold));
        }
        Ok(lines)
    }

    fn classify_line_orientations(&self, crops: &mut [LineCrop], params: &OcrParams) -> OcrResult<()> {
        let Some(classifier) = self.text_line_orientation.as_ref().filter(|_| params.use_cls) else {
            return Ok(());
        };
        if crops.is_empty() {
            return Ok(());
        }
        let images: Vec<RgbImage> = crops.iter().map(|c| c.image.clone()).collect();
        let classes = classifier.classify(&images)?;
        let mut flipped = 0usize;
        for (crop, (angle, confidence)) in crops.iter_mut().zip(classes) {
            crop.rotation_confidence = confidence;
            if angle == 180 && confidence >= params.cls_thresh {
                crop.image = imageops::rotate180(&crop.image);
                crop.rotation = 180;
                flipped += 1;
            }
        }
        debug!(lines = crops.len(), flipped, "text-line orientation done");
        Ok(())
    }
}

/// Merges overlapping lines and restores top-to-bottom order.
fn merge_lines(lines: Vec<OcrLine>, overlap_threshold: f32) -> Vec<OcrLine> {
    let items: Vec<OcrItem> = lines.iter().map(OcrLine::to_item).collect();
    let merged = BoxMerger::new(overlap_threshold, true).merge_ocr(&items);
    if merged.len() == lines.len() {
        return lines;
    }
    let mut merged: Vec<OcrLine> = merged
        .into_iter()
        .map(|item| OcrLine {
            bbox: item.bbox,
            text: item.text,
            text_confidence: item.text_confidence,
            rotation: 0,
            rotation_confidence: 0.0,
        })
        .collect();
    sort_text_boxes(&mut merged, |line| &line.bbox);
    merged
}

/// Builder for [`OcrEngine`].
pub struct OcrEngineBuilder {
    detector: Arc<dyn TextDetector>,
    recognizer: Arc<dyn TextRecognizer>,
    document_orientation: Option<Arc<dyn OrientationClassifier>>,
    text_line_orientation: Option<Arc<dyn OrientationClassifier>>,
}

impl OcrEngineBuilder {
    /// Creates a builder with the required detector and recognizer.
    pub fn new(detector: Arc<dyn TextDetector>, recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self {
            detector,
            recognizer,
            document_orientation: None,
            text_line_orientation: None,
        }
    }

    /// Adds a whole-page orientation classifier (0/90/180/270).
    pub fn with_document_orientation(mut self, classifier: Arc<dyn OrientationClassifier>) -> Self {
        self.document_orientation = Some(classifier);
        self
    }

    /// Adds a per-line orientation classifier (0/180).
    pub fn with_text_line_orientation(mut self, classifier: Arc<dyn OrientationClassifier>) -> Self {
        self.text_line_orientation = Some(classifier);
        self
    }

    pub fn build(self) -> OcrEngine {
        OcrEngine {
            detector: self.detector,
            recognizer: self.recognizer,
            document_orientation: self.document_orientation,
            text_line_orientation: self.text_line_orientation,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::processors::Point;
    use std::sync::Mutex;

    /// Detector returning fixed boxes.
    pub(crate) struct FixedDetector(pub Vec<BoundingBox>);

    impl TextDetector for FixedDetector {
        fn detect(&self, _image: &RgbImage, _params: &OcrParams) -> OcrResult<Vec<(BoundingBox, f32)>> {
            Ok(self.0.iter().cloned().map(|b| (b, 0.9)).collect())
        }
    }

    /// Recognizer that reports each crop's size as its text.
    pub(crate) struct SizeRecognizer;

    impl TextRecognizer for SizeRecognizer {
        fn recognize(&self, crops: &[RgbImage]) -> OcrResult<Vec<(String, f32)>> {
            Ok(crops
                .iter()
                .map(|c| (format!("{}x{}", c.width(), c.height()), 0.95))
                .collect())
        }
    }

    /// Recognizer replaying scripted results.
    struct ScriptedRecognizer(Vec<(String, f32)>);

    impl TextRecognizer for ScriptedRecognizer {
        fn recognize(&self, crops: &[RgbImage]) -> OcrResult<Vec<(String, f32)>> {
            Ok(self.0.iter().take(crops.len()).cloned().collect())
        }
    }

    /// Classifier returning a fixed answer and recording the input size.
    pub(crate) struct FixedClassifier {
        pub angle: u32,
        pub confidence: f32,
        pub seen: Mutex<Vec<(u32, u32)>>,
    }

    impl FixedClassifier {
        pub(crate) fn new(angle: u32, confidence: f32) -> Self {
            Self {
                angle,
                confidence,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl OrientationClassifier for FixedClassifier {
        fn classify(&self, images: &[RgbImage]) -> OcrResult<Vec<(u32, f32)>> {
            let mut seen = self.seen.lock().unwrap();
            seen.extend(images.iter().map(|i| i.dimensions()));
            Ok(vec![(self.angle, self.confidence); images.len()])
        }
    }

    fn page() -> RgbImage {
        RgbImage::from_pixel(200, 100, image::Rgb([255, 255, 255]))
    }

    #[test]
    fn test_lines_are_sorted_and_recognized() {
        let detector = FixedDetector(vec![
            BoundingBox::from_coords(10.0, 60.0, 90.0, 80.0),
            BoundingBox::from_coords(100.0, 12.0, 180.0, 30.0),
            BoundingBox::from_coords(10.0, 10.0, 60.0, 30.0),
        ]);
        let engine = OcrEngine::builder(Arc::new(detector), Arc::new(SizeRecognizer)).build();
        let result = engine.predict(&page(), &OcrParams::default()).unwrap();
        let texts: Vec<&str> = result.results.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["50x20", "80x18", "80x20"]);
        assert_eq!(result.rotation, 0);
    }

    #[test]
    fn test_low_confidence_page_rotation_is_skipped() {
        let classifier = Arc::new(FixedClassifier::new(90, 0.5));
        let engine = OcrEngine::builder(
            Arc::new(FixedDetector(vec![BoundingBox::from_coords(10.0, 10.0, 60.0, 30.0)])),
            Arc::new(SizeRecognizer),
        )
        .with_document_orientation(classifier.clone())
        .build();
        let params = OcrParams {
            cls_thresh: 0.9,
            ..OcrParams::default()
        };
        let image = page();
        let (corrected, correction) = engine.correct_orientation(&image, &params).unwrap();
        assert!(correction.is_none());
        assert_eq!(corrected.dimensions(), (200, 100));

        let result = engine.predict(&image, &params).unwrap();
        assert_eq!(result.rotation, 0);
        assert_eq!(result.results[0].bbox, BoundingBox::from_coords(10.0, 10.0, 60.0, 30.0));
    }

    #[test]
    fn test_confident_page_rotation_maps_boxes_back() {
        let classifier = Arc::new(FixedClassifier::new(180, 0.99));
        let engine = OcrEngine::builder(
            Arc::new(FixedDetector(vec![BoundingBox::from_coords(10.0, 10.0, 60.0, 30.0)])),
            Arc::new(SizeRecognizer),
        )
        .with_document_orientation(classifier)
        .build();
        let result = engine.predict(&page(), &OcrParams::default()).unwrap();
        assert_eq!(result.rotation, 180);
        let bbox = &result.results[0].bbox;
        assert_eq!((bbox.x_min(), bbox.y_min()), (140.0, 70.0));
        assert_eq!((bbox.x_max(), bbox.y_max()), (190.0, 90.0));
    }

    #[test]
    fn test_use_cls_false_disables_classifiers() {
        let classifier = Arc::new(FixedClassifier::new(180, 1.0));
        let engine = OcrEngine::builder(
            Arc::new(FixedDetector(vec![BoundingBox::from_coords(10.0, 10.0, 60.0, 30.0)])),
            Arc::new(SizeRecognizer),
        )
        .with_document_orientation(classifier.clone())
        .with_text_line_orientation(classifier.clone())
        .build();
        let params = OcrParams {
            use_cls: false,
            ..OcrParams::default()
        };
        let result = engine.predict(&page(), &params).unwrap();
        assert_eq!(result.rotation, 0);
        assert_eq!(result.results[0].rotation, 0);
        assert!(classifier.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_text_line_flip_requires_confidence() {
        let boxes = vec![BoundingBox::from_coords(10.0, 10.0, 60.0, 30.0)];
        let confident = OcrEngine::builder(Arc::new(FixedDetector(boxes.clone())), Arc::new(SizeRecognizer))
            .with_text_line_orientation(Arc::new(FixedClassifier::new(180, 0.95)))
            .build();
        let line = &confident.predict(&page(), &OcrParams::default()).unwrap().results[0];
        assert_eq!((line.rotation, line.rotation_confidence), (180, 0.95));

        let unsure = OcrEngine::builder(Arc::new(FixedDetector(boxes)), Arc::new(SizeRecognizer))
            .with_text_line_orientation(Arc::new(FixedClassifier::new(180, 0.5)))
            .build();
        let line = &unsure.predict(&page(), &OcrParams::default()).unwrap().results[0];
        assert_eq!(line.rotation, 0);
    }

    #[test]
    fn test_empty_and_low_score_lines_are_dropped() {
        let detector = FixedDetector(vec![
            BoundingBox::from_coords(10.0, 10.0, 60.0, 30.0),
            BoundingBox::from_coords(10.0, 40.0, 60.0, 60.0),
            BoundingBox::from_coords(10.0, 70.0, 60.0, 90.0),
        ]);
        let recognizer = ScriptedRecognizer(vec![
            ("kept".to_string(), 0.9),
            ("  ".to_string(), 0.9),
            ("weak".to_string(), 0.2),
        ]);
        let engine = OcrEngine::builder(Arc::new(detector), Arc::new(recognizer)).build();
        let params = OcrParams {
            rec_score_thresh: 0.5,
            ..OcrParams::default()
        };
        let result = engine.predict(&page(), &params).unwrap();
        assert_eq!(result.results.len(), 1);
        assert_eq!(result.results[0].text, "kept");
    }

    #[test]
    fn test_degenerate_boxes_are_skipped() {
        let detector = FixedDetector(vec![
            BoundingBox::new(vec![Point::new(5.0, 5.0), Point::new(9.0, 5.0), Point::new(9.0, 9.0)]),
            BoundingBox::from_coords(10.0, 10.0, 60.0, 30.0),
        ]);
        let engine = OcrEngine::builder(Arc::new(detector), Arc::new(SizeRecognizer)).build();
        let result = engine.predict(&page(), &OcrParams::default()).unwrap();
        assert_eq!(result.results.len(), 1);
    }

    #[test]
    fn test_merge_overlaps_joins_duplicate_lines() {
        let detector = FixedDetector(vec![
            BoundingBox::from_coords(10.0, 10.0, 100.0, 30.0),
            BoundingBox::from_coords(12.0, 11.0, 98.0, 29.0),
        ]);
        let engine = OcrEngine::builder(Arc::new(detector), Arc::new(SizeRecognizer)).build();
        let params = OcrParams {
            merge_overlaps: true,
            ..OcrParams::default()
        };
        let result = engine.predict(&page(), &params).unwrap();
        assert_eq!(result.results.len(), 1);
        assert_eq!(result.results[0].bbox.bounding_rect().x_max, 100.0);
    }

    #[test]
    fn test_ocr2text_filters_confidence_and_blank() {
        let line = |text: &str, conf: f32| OcrLine {
            bbox: BoundingBox::from_coords(0.0, 0.0, 1.0, 1.0),
            text: text.to_string(),
            text_confidence: conf,
            rotation: 0,
            rotation_confidence: 0.0,
        };
        let lines = vec![line("first", 0.9), line("noise", 0.05), line(" ", 0.9), line("last", 0.1)];
        assert_eq!(ocr2text(&lines), "first\nlast");
    }

    #[test]
    fn test_sort_text_boxes_row_tolerance() {
        let mut boxes = vec![
            BoundingBox::from_coords(100.0, 5.0, 150.0, 20.0),
            BoundingBox::from_coords(10.0, 12.0, 60.0, 25.0),
            BoundingBox::from_coords(10.0, 50.0, 60.0, 70.0),
        ];
        sort_text_boxes(&mut boxes, |b| b);
        assert_eq!(boxes[0].x_min(), 10.0);
        assert_eq!(boxes[1].x_min(), 100.0);
        assert_eq!(boxes[2].y_min(), 50.0);
    }
}
