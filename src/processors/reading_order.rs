//! Reading-order resolution for the regions of one page.
//!
//! Regions are clustered into columns by horizontal overlap; columns are read
//! left to right and each column top to bottom. Regions that bridge two
//! otherwise separate columns (full-width titles, wide figures) split the page
//! into horizontal bands that are ordered independently, unless another region
//! sits beside them; a wide block next to a neighbouring column is part of its
//! own column. This is best-effort and makes no claim beyond that.

use crate::domain::LayoutRegion;
use crate::processors::geometry::Rect;
use std::cmp::Ordering;

/// Share of the narrower box's width two boxes must share to sit in one column.
pub const COLUMN_OVERLAP_RATIO: f32 = 0.5;

fn same_column(a: &Rect, b: &Rect) -> bool {
    let narrower = a.width().min(b.width());
    narrower > 0.0 && a.x_overlap(b) / narrower >= COLUMN_OVERLAP_RATIO
}

/// `b` sits beside `a`: no shared width, and most of the shorter one's height
/// shared.
fn beside(a: &Rect, b: &Rect) -> bool {
    let shorter = a.height().min(b.height());
    shorter > 0.0 && a.x_overlap(b) <= 0.0 && a.y_overlap(b) / shorter >= COLUMN_OVERLAP_RATIO
}

fn cmp_f32(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn find(parent: &mut [usize], i: usize) -> usize {
    let mut root = i;
    while parent[root] != root {
        root = parent[root];
    }
    let mut node = i;
    while parent[node] != root {
        let next = parent[node];
        parent[node] = root;
        node = next;
    }
    root
}

/// Orders the members of one band column by column.
fn order_band(rects: &[Rect], members: &[usize]) -> Vec<usize> {
    let mut parent: Vec<usize> = (0..members.len()).collect();
    for a in 0..members.len() {
        for b in (a + 1)..members.len() {
            if same_column(&rects[members[a]], &rects[members[b]]) {
                let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
                if ra != rb {
                    parent[ra.max(rb)] = ra.min(rb);
                }
            }
        }
    }

    let mut columns: Vec<Vec<usize>> = Vec::new();
    let mut column_of_root: Vec<Option<usize>> = vec![None; members.len()];
    for local in 0..members.len() {
        let root = find(&mut parent, local);
        let column = *column_of_root[root].get_or_insert_with(|| {
            columns.push(Vec::new());
            columns.len() - 1
        });
        columns[column].push(members[local]);
    }

    for column in &mut columns {
        column.sort_by(|&a, &b| {
            cmp_f32(rects[a].y_min, rects[b].y_min)
                .then(cmp_f32(rects[a].x_min, rects[b].x_min))
                .then(a.cmp(&b))
        });
    }
    let left_edge = |column: &Vec<usize>| {
        column
            .iter()
            .map(|&i| rects[i].x_min)
            .fold(f32::INFINITY, f32::min)
    };
    columns.sort_by(|a, b| {
        cmp_f32(left_edge(a), left_edge(b)).then(a.iter().min().cmp(&b.iter().min()))
    });
    columns.into_iter().flatten().collect()
}

/// Computes a reading order over `rects`.
///
/// Returns a permutation of `0..rects.len()`: every index appears exactly once.
pub fn reading_order(rects: &[Rect]) -> Vec<usize> {
    let n = rects.len();
    if n < 2 {
        return (0..n).collect();
    }

    // A region bridges columns when it shares a column with two boxes that do
    // not share one with each other, and nothing runs alongside it.
    let bridges = |r: usize| {
        if (0..n).any(|o| o != r && beside(&rects[r], &rects[o])) {
            return false;
        }
        let touching: Vec<usize> = (0..n)
            .filter(|&o| o != r && same_column(&rects[r], &rects[o]))
            .collect();
        touching.iter().enumerate().any(|(k, &a)| {
            touching[k + 1..]
                .iter()
                .any(|&b| !same_column(&rects[a], &rects[b]))
        })
    };

    let center_y = |i: usize| (rects[i].y_min + rects[i].y_max) / 2.0;
    let mut separators: Vec<usize> = (0..n).filter(|&r| bridges(r)).collect();
    separators.sort_by(|&a, &b| {
        cmp_f32(center_y(a), center_y(b))
            .then(cmp_f32(rects[a].x_min, rects[b].x_min))
            .then(a.cmp(&b))
    });

    let mut bands: Vec<Vec<usize>> = vec![Vec::new(); separators.len() + 1];
    for i in (0..n).filter(|i| !separators.contains(i)) {
        let band = separators
            .iter()
            .take_while(|&&s| center_y(s) <= center_y(i))
            .count();
        bands[band].push(i);
    }

    let mut order = Vec::with_capacity(n);
    for (band, members) in bands.iter().enumerate() {
        order.extend(order_band(rects, members));
        if let Some(&separator) = separators.get(band) {
            order.push(separator);
        }
    }
    order
}

/// Reorders regions into reading order.
pub fn order_regions(regions: Vec<LayoutRegion>) -> Vec<LayoutRegion> {
    let rects: Vec<Rect> = regions.iter().map(|r| r.bbox).collect();
    let order = reading_order(&rects);
    let mut slots: Vec<Option<LayoutRegion>> = regions.into_iter().map(Some).collect();
    order.into_iter().filter_map(|i| slots[i].take()).collect()
}
