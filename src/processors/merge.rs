//! Overlap-based box merging for layout regions and OCR lines.
//!
//! Two boxes qualify when an eligibility predicate accepts them and their
//! intersection covers at least `overlap_threshold` of the smaller box. Qualifying
//! pairs are merged in decreasing-overlap order, and the pass repeats until no pair
//! qualifies, so the output is a fixed point.

use crate::domain::{LayoutRegion, OcrItem, RegionContent};
use crate::processors::geometry::Rect;
use std::cmp::Ordering;

/// A box that can absorb another during merging.
pub trait Mergeable: Clone {
    /// Axis-aligned extent used for the overlap test.
    fn rect(&self) -> Rect;

    /// Folds `other` into `self`.
    ///
    /// Implementations take the union box and the higher confidence, and keep
    /// text from both sides.
    fn absorb(&mut self, other: Self);
}

/// Merges overlapping boxes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxMerger {
    /// Minimum intersection over the smaller area.
    pub overlap_threshold: f32,
    /// When false, input passes through unchanged.
    pub enabled: bool,
}

impl BoxMerger {
    /// Creates a merger.
    pub fn new(overlap_threshold: f32, enabled: bool) -> Self {
        Self {
            overlap_threshold,
            enabled,
        }
    }

    /// Merges `items`, considering only pairs accepted by `eligible`.
    ///
    /// Items that survive keep their relative order; a merged box takes the
    /// position of the earlier of its two inputs.
    pub fn merge<T, F>(&self, items: &[T], eligible: F) -> Vec<T>
    where
        T: Mergeable,
        F: Fn(&T, &T) -> bool,
    {
        let mut current = items.to_vec();
        if !self.enabled || !self.overlap_threshold.is_finite() || current.len() < 2 {
            return current;
        }

        let mut rounds = 0usize;
        loop {
            let rects: Vec<Rect> = current.iter().map(Mergeable::rect).collect();
            let mut pairs: Vec<(f32, usize, usize)> = Vec::new();
            for i in 0..current.len() {
                for j in (i + 1)..current.len() {
                    if !eligible(&current[i], &current[j]) {
                        continue;
                    }
                    let ratio = rects[i].overlap_ratio_min(&rects[j]);
                    if ratio > 0.0 && ratio >= self.overlap_threshold {
                        pairs.push((ratio, i, j));
                    }
                }
            }
            if pairs.is_empty() {
                break;
            }
            pairs.sort_by(|a, b| {
                b.0.partial_cmp(&a.0)
                    .unwrap_or(Ordering::Equal)
                    .then(a.1.cmp(&b.1))
                    .then(a.2.cmp(&b.2))
            });

            let mut used = vec![false; current.len()];
            let mut slots: Vec<Option<T>> = current.into_iter().map(Some).collect();
            for (_, i, j) in pairs {
                if used[i] || used[j] {
                    continue;
                }
                used[i] = true;
                used[j] = true;
                if let Some(other) = slots[j].take()
                    && let Some(target) = slots[i].as_mut()
                {
                    target.absorb(other);
                }
            }
            current = slots.into_iter().flatten().collect();
            rounds += 1;
        }

        tracing::debug!(
            before = items.len(),
            after = current.len(),
            rounds,
            "merged overlapping boxes"
        );
        current
    }

    /// Merges layout regions of the same type.
    pub fn merge_layout(&self, regions: &[LayoutRegion]) -> Vec<LayoutRegion> {
        self.merge(regions, |a, b| a.region_type == b.region_type)
    }

    /// Merges OCR lines regardless of content.
    pub fn merge_ocr(&self, items: &[OcrItem]) -> Vec<OcrItem> {
        self.merge(items, |_, _| true)
    }
}

/// True when `a` reads before `b` by top edge, then left edge.
fn reads_before(a: &Rect, b: &Rect) -> bool {
    (a.y_min, a.x_min) <= (b.y_min, b.x_min)
}

fn join_text(first: &str, second: &str, separator: &str) -> String {
    match (first.is_empty(), second.is_empty()) {
        (true, _) => second.to_string(),
        (_, true) => first.to_string(),
        _ => format!("{first}{separator}{second}"),
    }
}

impl Mergeable for OcrItem {
    fn rect(&self) -> Rect {
        self.bbox.bounding_rect()
    }

    fn absorb(&mut self, other: Self) {
        let (mine, theirs) = (self.rect(), other.rect());
        self.text = if reads_before(&mine, &theirs) {
            join_text(&self.text, &other.text, " ")
        } else {
            join_text(&other.text, &self.text, " ")
        };
        self.text_confidence = self.text_confidence.max(other.text_confidence);
        self.bbox = mine.union(&theirs).to_quad();
    }
}

/// An absent or opaque-asset content yields to one with data; otherwise the
/// winner's is kept.
fn pick_content(
    mine: Option<RegionContent>,
    theirs: Option<RegionContent>,
    theirs_wins: bool,
) -> Option<RegionContent> {
    match (mine, theirs) {
        (None, theirs) => theirs,
        (mine, None) => mine,
        (Some(RegionContent::Asset), theirs) => theirs,
        (mine, Some(RegionContent::Asset)) => mine,
        (mine, theirs) => {
            if theirs_wins {
                theirs
            } else {
                mine
            }
        }
    }
}

impl Mergeable for LayoutRegion {
    fn rect(&self) -> Rect {
        self.bbox
    }

    /// Text contents are joined in reading position. Any other pair keeps the
    /// content that carries data, preferring the more confident region.
    fn absorb(&mut self, other: Self) {
        let self_first = reads_before(&self.bbox, &other.bbox);
        let theirs_wins = other.confidence > self.confidence;
        self.content = match (self.content.take(), other.content) {
            (
                Some(RegionContent::Text { text: mine }),
                Some(RegionContent::Text { text: theirs }),
            ) => Some(RegionContent::Text {
                text: if self_first {
                    join_text(&mine, &theirs, "\n")
                } else {
                    join_text(&theirs, &mine, "\n")
                },
            }),
            (mine, theirs) => pick_content(mine, theirs, theirs_wins),
        };
        if self_first {
            self.ocr_items.extend(other.ocr_items);
        } else {
            let mut items = other.ocr_items;
            items.append(&mut self.ocr_items);
            self.ocr_items = items;
        }
        if other.confidence > self.confidence {
            self.label = other.label;
        }
        self.confidence = self.confidence.max(other.confidence);
        self.bbox = self.bbox.union(&other.bbox);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FormulaResult, RegionType, TableCell, TableStructure};
    use crate::processors::BoundingBox;

    fn region(x1: f32, y1: f32, x2: f32, y2: f32, t: RegionType, conf: f32) -> LayoutRegion {
        LayoutRegion::new(Rect::new(x1, y1, x2, y2), t, conf)
    }

    #[test]
    fn test_merge_two_overlapping_text_boxes() {
        // Second box lies 95% inside the first.
        let a = region(0.0, 0.0, 100.0, 20.0, RegionType::Text, 0.6);
        let b = region(5.0, 1.0, 105.0, 20.0, RegionType::Text, 0.8);
        let ratio = a.bbox.overlap_ratio_min(&b.bbox);
        assert!((ratio - 0.95).abs() < 1e-4);

        let merged = BoxMerger::new(0.9, true).merge_layout(&[a, b]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].bbox, Rect::new(0.0, 0.0, 105.0, 20.0));
        assert_eq!(merged[0].confidence, 0.8);
    }

    #[test]
    fn test_merge_never_crosses_types() {
        let a = region(0.0, 0.0, 100.0, 100.0, RegionType::Text, 0.9);
        let b = region(0.0, 0.0, 100.0, 100.0, RegionType::Table, 0.9);
        let merged = BoxMerger::new(0.5, true).merge_layout(&[a.clone(), b.clone()]);
        assert_eq!(merged, vec![a, b]);
    }

    #[test]
    fn test_merge_disabled_passes_through() {
        let a = region(0.0, 0.0, 10.0, 10.0, RegionType::Text, 0.9);
        let b = region(0.0, 0.0, 10.0, 10.0, RegionType::Text, 0.9);
        let merged = BoxMerger::new(0.5, false).merge_layout(&[a.clone(), b.clone()]);
        assert_eq!(merged, vec![a, b]);
    }

    #[test]
    fn test_merge_reaches_fixed_point_and_is_idempotent() {
        // a+b merge first; their union then swallows c.
        let a = region(0.0, 0.0, 50.0, 10.0, RegionType::Text, 0.5);
        let b = region(0.0, 0.0, 50.0, 10.5, RegionType::Text, 0.6);
        let c = region(10.0, 2.0, 40.0, 8.0, RegionType::Text, 0.7);
        let d = region(0.0, 500.0, 50.0, 510.0, RegionType::Text, 0.9);
        let merger = BoxMerger::new(0.9, true);

        let once = merger.merge_layout(&[a, b, c, d.clone()]);
        assert_eq!(once.len(), 2);
        assert_eq!(once[1], d);

        let twice = merger.merge_layout(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_concatenates_text_in_reading_position() {
        let upper = region(0.0, 0.0, 100.0, 20.0, RegionType::Text, 0.9).with_text("first");
        let lower = region(0.0, 1.0, 100.0, 20.0, RegionType::Text, 0.9).with_text("second");
        let merged = BoxMerger::new(0.9, true).merge_layout(&[lower, upper]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text(), Some("first\nsecond"));
    }

    #[test]
    fn test_merge_ocr_items_unconditionally() {
        let a = OcrItem::new(BoundingBox::from_coords(0.0, 0.0, 40.0, 10.0), "hello", 0.7);
        let b = OcrItem::new(BoundingBox::from_coords(1.0, 0.0, 40.0, 10.0), "world", 0.9);
        let merged = BoxMerger::new(0.9, true).merge_ocr(&[a, b]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "hello world");
        assert_eq!(merged[0].text_confidence, 0.9);
        assert_eq!(merged[0].bbox.bounding_rect(), Rect::new(0.0, 0.0, 40.0, 10.0));
    }

    #[test]
    fn test_merge_prefers_highest_overlap_first() {
        // b overlaps a at 1.0 and c at 0.95; a+b must merge, c stays for the next round.
        let a = region(0.0, 0.0, 10.0, 10.0, RegionType::Text, 0.1);
        let b = region(0.0, 0.0, 10.0, 10.0, RegionType::Text, 0.2);
        let c = region(0.5, 0.0, 10.5, 10.0, RegionType::Text, 0.3);
        let merged = BoxMerger::new(0.9, true).merge_layout(&[a, b, c]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].bbox, Rect::new(0.0, 0.0, 10.5, 10.0));
        assert_eq!(merged[0].confidence, 0.3);
    }

    #[test]
    fn test_absorb_keeps_structured_content() {
        let formula = RegionContent::Formula(FormulaResult::new("a+b", 0.9));
        let mut survivor = region(0.0, 0.0, 100.0, 20.0, RegionType::Formula, 0.9);
        survivor.absorb(region(2.0, 1.0, 98.0, 19.0, RegionType::Formula, 0.5).with_content(formula.clone()));
        assert_eq!(survivor.content, Some(formula.clone()));

        let mut asset = region(0.0, 0.0, 100.0, 20.0, RegionType::Formula, 0.9)
            .with_content(RegionContent::Asset);
        asset.absorb(region(2.0, 1.0, 98.0, 19.0, RegionType::Formula, 0.5).with_content(formula.clone()));
        assert_eq!(asset.content, Some(formula));
    }

    #[test]
    fn test_absorb_prefers_more_confident_table() {
        let weak = TableStructure::new(vec![TableCell::new(0, 0, "weak")], 0.4);
        let strong = TableStructure::new(vec![TableCell::new(0, 0, "strong")], 0.9);
        let mut survivor = region(0.0, 0.0, 100.0, 50.0, RegionType::Table, 0.6)
            .with_content(RegionContent::Table(weak));
        survivor.absorb(
            region(1.0, 1.0, 99.0, 49.0, RegionType::Table, 0.8)
                .with_content(RegionContent::Table(strong.clone())),
        );
        assert_eq!(survivor.content, Some(RegionContent::Table(strong)));
        assert_eq!(survivor.confidence, 0.8);
    }

    #[test]
    fn test_merge_empty_and_single() {
        let merger = BoxMerger::new(0.9, true);
        assert!(merger.merge_layout(&[]).is_empty());
        let one = vec![region(0.0, 0.0, 1.0, 1.0, RegionType::Text, 1.0)];
        assert_eq!(merger.merge_layout(&one), one);
    }
}
