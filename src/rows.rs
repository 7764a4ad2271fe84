//! Row clustering
//!
//! Groups text chunks and rectangles that share (or nearly share) a baseline
//! into row buckets keyed by Y.

use crate::geometry::{cmp_f32, Positioned, Rectangle, TextChunk, TOLERANCE};
use std::ops::{Deref, DerefMut};

/// A row bucket
#[derive(Debug, Clone, PartialEq)]
pub struct Row<T> {
    /// Row key (a baseline Y)
    pub y: f32,
    pub items: Vec<T>,
}

/// Row buckets with unique keys, kept in insertion order until sorted
#[derive(Debug, Clone, PartialEq)]
pub struct Rows<T> {
    rows: Vec<Row<T>>,
}

impl<T> Default for Rows<T> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<T> Rows<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row with exactly this key
    pub fn get(&self, y: f32) -> Option<&Vec<T>> {
        self.rows.iter().find(|r| r.y == y).map(|r| &r.items)
    }

    pub fn get_mut(&mut self, y: f32) -> Option<&mut Vec<T>> {
        self.rows.iter_mut().find(|r| r.y == y).map(|r| &mut r.items)
    }

    pub fn contains_key(&self, y: f32) -> bool {
        self.rows.iter().any(|r| r.y == y)
    }

    /// Items of the row keyed `y`, creating an empty row if needed
    pub fn entry(&mut self, y: f32) -> &mut Vec<T> {
        let index = match self.rows.iter().position(|r| r.y == y) {
            Some(index) => index,
            None => {
                self.rows.push(Row {
                    y,
                    items: Vec::new(),
                });
                self.rows.len() - 1
            }
        };
        &mut self.rows[index].items
    }

    pub fn remove(&mut self, y: f32) -> Option<Vec<T>> {
        let index = self.rows.iter().position(|r| r.y == y)?;
        Some(self.rows.remove(index).items)
    }

    pub fn keys(&self) -> impl Iterator<Item = f32> + '_ {
        self.rows.iter().map(|r| r.y)
    }

    pub fn sort_by_y(&mut self) {
        self.rows.sort_by(|a, b| cmp_f32(a.y, b.y));
    }

    /// All items, row by row
    pub fn into_items(self) -> impl Iterator<Item = T> {
        self.rows.into_iter().flat_map(|r| r.items)
    }
}

impl<T> Deref for Rows<T> {
    type Target = [Row<T>];

    fn deref(&self) -> &Self::Target {
        &self.rows
    }
}

impl<T> DerefMut for Rows<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.rows
    }
}

/// Bucket items by Y in two stages: an exact key match first, then the first
/// existing key within `window(item)`. Keys reused for an item whose own Y
/// differs are re-keyed afterwards to the row's dominant baseline.
fn bucket_by_y<T, F>(mut items: Vec<T>, window: F) -> Rows<T>
where
    T: Positioned,
    F: Fn(&Rectangle) -> f32,
{
    items.sort_by(|a, b| cmp_f32(a.rect().y, b.rect().y));

    let mut rows: Rows<T> = Rows::new();
    let mut displaced: Vec<f32> = Vec::new();

    for item in items {
        let y = item.rect().y;
        let key = if rows.contains_key(y) {
            y
        } else {
            let reach = window(item.rect());
            match rows.keys().find(|k| (y - k).abs() < reach) {
                Some(k) => {
                    if (y - k).abs() > TOLERANCE && !displaced.contains(&k) {
                        displaced.push(k);
                    }
                    k
                }
                None => y,
            }
        };
        rows.entry(key).push(item);
    }

    for key in displaced {
        rebase_displaced(&mut rows, key);
    }

    rows.sort_by_y();
    for row in rows.iter_mut() {
        row.items.sort_by(|a, b| cmp_f32(a.rect().x, b.rect().x));
    }
    rows
}

/// Move a displaced row onto the Y of its dominant member: the height class
/// with the most members, ties going to the taller class.
fn rebase_displaced<T: Positioned>(rows: &mut Rows<T>, key: f32) {
    let Some(items) = rows.get(key) else {
        return;
    };

    // (height, count, y of first member)
    let mut classes: Vec<(f32, usize, f32)> = Vec::new();
    for item in items {
        let rect = item.rect();
        match classes.iter_mut().find(|c| c.0 == rect.height) {
            Some(class) => class.1 += 1,
            None => classes.push((rect.height, 1, rect.y)),
        }
    }

    let mut best: Option<(f32, usize, f32)> = None;
    for class in classes {
        let better = match best {
            None => true,
            Some((height, count, _)) => {
                class.1 > count || (class.1 == count && class.0 > height)
            }
        };
        if better {
            best = Some(class);
        }
    }

    if let Some((_, _, baseline)) = best {
        if (baseline - key).abs() > TOLERANCE {
            if let Some(moved) = rows.remove(key) {
                rows.entry(baseline).extend(moved);
            }
        }
    }
}

/// Group text chunks into rows. A chunk joins an existing row when its Y is
/// within its own height plus `overflow_delta` of the row key.
pub fn cluster_text_rows(chunks: &[TextChunk], overflow_delta: f32) -> Rows<TextChunk> {
    bucket_by_y(chunks.to_vec(), |rect| rect.height + overflow_delta)
}

/// Group rectangles into rows of cells.
///
/// Rectangles smaller than the smallest text chunk, with negative Y, or more
/// than three times the modal height while crossing another rectangle (stroke
/// artifacts) are dropped. A row with a single usable cell is rebuilt from
/// the gaps between its distinct X positions.
pub fn cluster_rectangle_rows(
    rectangles: &[Rectangle],
    modal_height: f32,
    min_height: f32,
    min_width: f32,
) -> Rows<Rectangle> {
    let kept: Vec<Rectangle> = rectangles
        .iter()
        .filter(|r| {
            let artifact =
                r.height > modal_height * 3.0 && rectangles.iter().any(|o| o.intersects(r));
            r.y >= 0.0 && r.width >= min_width && r.height >= min_height && !artifact
        })
        .copied()
        .collect();

    let buckets = bucket_by_y(kept, |_| TOLERANCE);

    let mut rows: Rows<Rectangle> = Rows::new();
    let mut previous_key: Option<f32> = None;

    for bucket in buckets.iter() {
        let key = bucket.y;
        let mut cells: Vec<Rectangle> = Vec::with_capacity(bucket.items.len());
        for rect in &bucket.items {
            if !cells
                .iter()
                .any(|c| c.x == rect.x && c.width == rect.width)
            {
                cells.push(*rect);
            }
        }
        // Already X-ordered by bucket_by_y

        let usable: Vec<Rectangle> = cells
            .iter()
            .filter(|c| c.width > 1.0 && c.height >= min_height)
            .copied()
            .collect();

        if usable.len() > 1 {
            rows.entry(key).extend(usable);
        } else if cells.len() == 1 {
            let only = cells[0];
            if only.width > 1.0 && only.height > 1.0 {
                rows.entry(key).push(only);
            }
        } else {
            let filled = fill_gaps(&cells, key, previous_key, min_height);
            if filled.len() > 1 {
                rows.entry(key).extend(filled);
            }
        }

        previous_key = Some(key);
    }

    rows
}

/// Synthesize cells spanning consecutive distinct X positions, plus a
/// trailing cell sized from the last rectangle.
fn fill_gaps(
    cells: &[Rectangle],
    key: f32,
    previous_key: Option<f32>,
    min_height: f32,
) -> Vec<Rectangle> {
    let mut filled = Vec::new();
    let mut current = cells[0];

    for next in &cells[1..] {
        let width = next.x - current.x;
        let height = previous_key.map_or(current.height, |prev| key - prev);
        if width > 1.0 && height >= min_height {
            filled.push(Rectangle::new(current.x, current.y, width, height));
        }
        current = *next;
    }

    if filled.len() > 1 {
        let last = cells[cells.len() - 1];
        if last.width > 1.0 && last.height > 1.0 {
            let height = filled[filled.len() - 1].height;
            filled.push(Rectangle::new(last.x, last.y, last.width, height));
        }
    }

    filled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, x: f32, y: f32, height: f32) -> TextChunk {
        TextChunk::new(text, Rectangle::new(x, y, text.len() as f32 * 5.0, height))
    }

    fn texts(row: &Row<TextChunk>) -> Vec<&str> {
        row.items.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_exact_baselines_form_rows() {
        let chunks = vec![
            chunk("B", 60.0, 100.0, 10.0),
            chunk("C", 5.0, 130.0, 10.0),
            chunk("A", 5.0, 100.0, 10.0),
        ];
        let rows = cluster_text_rows(&chunks, 2.0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].y, 100.0);
        assert_eq!(texts(&rows[0]), vec!["A", "B"]);
        assert_eq!(rows[1].y, 130.0);
        assert_eq!(texts(&rows[1]), vec!["C"]);
    }

    #[test]
    fn test_drifting_baseline_adopts_dominant_y() {
        // A small superscript sits 3 units above the row's real baseline
        let chunks = vec![
            chunk("sup", 40.0, 97.0, 6.0),
            chunk("Total", 5.0, 100.0, 10.0),
            chunk("42", 60.0, 100.0, 10.0),
        ];
        let rows = cluster_text_rows(&chunks, 2.0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].y, 100.0);
        assert_eq!(texts(&rows[0]), vec!["Total", "sup", "42"]);
    }

    #[test]
    fn test_rebase_tie_prefers_taller_class() {
        let chunks = vec![
            chunk("small", 5.0, 98.0, 6.0),
            chunk("big", 60.0, 100.0, 10.0),
        ];
        let rows = cluster_text_rows(&chunks, 2.0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].y, 100.0);
    }

    #[test]
    fn test_clustering_is_idempotent() {
        let chunks = vec![
            chunk("a", 5.0, 100.0, 10.0),
            chunk("b", 50.0, 101.5, 10.0),
            chunk("c", 5.0, 130.0, 10.0),
            chunk("d", 50.0, 160.0, 12.0),
            chunk("e", 90.0, 158.0, 12.0),
        ];
        let first = cluster_text_rows(&chunks, 2.0);

        let flattened: Vec<TextChunk> = first.clone().into_items().collect();
        let second = cluster_text_rows(&flattened, 2.0);

        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_input_yields_no_rows() {
        assert!(cluster_text_rows(&[], 2.0).is_empty());
        assert!(cluster_rectangle_rows(&[], 20.0, 10.0, 5.0).is_empty());
    }

    #[test]
    fn test_rectangle_rows_keep_multi_cell_rows() {
        let rects = vec![
            Rectangle::new(100.0, 142.0, 100.0, 20.0),
            Rectangle::new(200.0, 142.0, 100.0, 20.0),
            Rectangle::new(200.0, 142.0, 100.0, 20.0), // duplicate stroke
            Rectangle::new(100.0, 162.0, 100.0, 20.0),
            Rectangle::new(200.0, 162.0, 100.0, 20.0),
        ];
        let rows = cluster_rectangle_rows(&rects, 20.0, 10.0, 5.0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].y, 142.0);
        assert_eq!(rows[0].items.len(), 2);
        assert_eq!(rows[1].items.len(), 2);
    }

    #[test]
    fn test_rectangle_filters() {
        let rects = vec![
            Rectangle::new(10.0, -5.0, 100.0, 20.0),  // negative y
            Rectangle::new(10.0, 50.0, 2.0, 20.0),    // narrower than text
            Rectangle::new(10.0, 80.0, 100.0, 4.0),   // shorter than text
            Rectangle::new(10.0, 120.0, 100.0, 20.0), // kept
        ];
        let rows = cluster_rectangle_rows(&rects, 20.0, 10.0, 5.0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].y, 120.0);
    }

    #[test]
    fn test_oversized_crossing_rectangle_is_dropped() {
        let rects = vec![
            Rectangle::new(0.0, 100.0, 50.0, 20.0),
            Rectangle::new(50.0, 100.0, 50.0, 20.0),
            // 80 tall, straddling y=100 while crossing x=50
            Rectangle::new(40.0, 150.0, 30.0, 80.0),
        ];
        let rows = cluster_rectangle_rows(&rects, 20.0, 10.0, 5.0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].y, 100.0);
        assert_eq!(rows[0].items.len(), 2);
    }

    #[test]
    fn test_row_of_thin_separators_is_rebuilt_from_gaps() {
        // Only vertical separators at y=140 (width 0.5), previous row at 120
        let rects = vec![
            Rectangle::new(0.0, 120.0, 50.0, 20.0),
            Rectangle::new(50.0, 120.0, 50.0, 20.0),
            Rectangle::new(0.0, 140.0, 0.5, 20.0),
            Rectangle::new(50.0, 140.0, 0.5, 20.0),
            Rectangle::new(100.0, 140.0, 0.5, 20.0),
        ];
        let rows = cluster_rectangle_rows(&rects, 20.0, 10.0, 0.1);
        let rebuilt = rows.get(140.0).expect("row rebuilt from gaps");
        assert_eq!(rebuilt.len(), 2);
        assert_eq!(rebuilt[0], Rectangle::new(0.0, 140.0, 50.0, 20.0));
        assert_eq!(rebuilt[1], Rectangle::new(50.0, 140.0, 50.0, 20.0));
    }
}
