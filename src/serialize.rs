//! Delimited text output
//!
//! Turns template rows (or bare text rows when a band has no grid) into
//! delimiter-separated lines.

use crate::geometry::{cmp_f32, CellTemplate, TextChunk};
use crate::rows::Rows;

/// Chunks closer than this are glued together without a space
const GLUE_DISTANCE: f32 = 1.0;

/// Serialize template rows top to bottom, cells left to right. A cell spanning
/// `n` columns is followed by `n - 1` extra delimiters.
pub fn write_grid(rows: &Rows<CellTemplate>, delimiter: &str) -> String {
    let mut ordered: Vec<_> = rows.iter().collect();
    ordered.sort_by(|a, b| cmp_f32(a.y, b.y));

    let mut out = String::new();
    for row in ordered {
        let mut cells: Vec<&CellTemplate> = row.items.iter().collect();
        cells.sort_by(|a, b| cmp_f32(a.rect.x, b.rect.x));

        for (index, cell) in cells.iter().enumerate() {
            out.push_str(&cell_text(cell));
            for _ in 1..cell.horizontal_span {
                out.push_str(delimiter);
            }
            if index + 1 < cells.len() {
                out.push_str(delimiter);
            }
        }
        out.push('\n');
    }
    out
}

/// Text of one cell: chunks grouped into lines by exact Y, each line in X
/// order, lines joined by a single space.
pub fn cell_text(cell: &CellTemplate) -> String {
    let mut lines: Vec<(f32, Vec<&TextChunk>)> = Vec::new();
    for chunk in &cell.text {
        match lines.iter_mut().find(|(y, _)| *y == chunk.rect.y) {
            Some((_, line)) => line.push(chunk),
            None => lines.push((chunk.rect.y, vec![chunk])),
        }
    }
    lines.sort_by(|a, b| cmp_f32(a.0, b.0));

    let mut parts = Vec::with_capacity(lines.len());
    for (_, mut line) in lines {
        line.sort_by(|a, b| cmp_f32(a.rect.x, b.rect.x));
        let mut text = String::new();
        let mut previous: Option<&TextChunk> = None;
        for chunk in line {
            if let Some(prev) = previous {
                if (chunk.rect.x - prev.rect.right()).abs() >= GLUE_DISTANCE {
                    text.push(' ');
                }
            }
            text.push_str(&chunk.text);
            previous = Some(chunk);
        }
        parts.push(text);
    }
    parts.join(" ")
}

/// Grid-free output: each text row on one line, chunks joined by the
/// delimiter and a space.
pub fn write_plain_rows(rows: &Rows<TextChunk>, delimiter: &str) -> String {
    let separator = format!("{delimiter} ");
    let mut ordered: Vec<_> = rows.iter().collect();
    ordered.sort_by(|a, b| cmp_f32(a.y, b.y));

    let mut out = String::new();
    for row in ordered {
        let mut chunks: Vec<&TextChunk> = row.items.iter().collect();
        chunks.sort_by(|a, b| cmp_f32(a.rect.x, b.rect.x));
        let line: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        out.push_str(&line.join(&separator));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rectangle;

    fn chunk(text: &str, x: f32, y: f32, width: f32) -> TextChunk {
        TextChunk::new(text, Rectangle::new(x, y, width, 10.0))
    }

    fn cell(x: f32, y: f32, span: usize, chunks: Vec<TextChunk>) -> CellTemplate {
        let mut cell = CellTemplate::new(Rectangle::new(x, y, 50.0 * span as f32, 20.0), span, 1);
        cell.text = chunks;
        cell
    }

    #[test]
    fn test_two_by_two_grid() {
        let mut rows: Rows<CellTemplate> = Rows::new();
        // Inserted out of order on purpose
        rows.entry(140.0).extend([
            cell(50.0, 140.0, 1, vec![chunk("cellD", 55.0, 135.0, 20.0)]),
            cell(0.0, 140.0, 1, vec![chunk("cellC", 5.0, 135.0, 20.0)]),
        ]);
        rows.entry(120.0).extend([
            cell(0.0, 120.0, 1, vec![chunk("cellA", 5.0, 115.0, 20.0)]),
            cell(50.0, 120.0, 1, vec![chunk("cellB", 55.0, 115.0, 20.0)]),
        ]);

        assert_eq!(write_grid(&rows, ","), "cellA,cellB\ncellC,cellD\n");
    }

    #[test]
    fn test_glue_versus_space() {
        let glued = cell(
            0.0,
            20.0,
            1,
            vec![chunk("CD", 10.4, 15.0, 8.0), chunk("AB", 2.0, 15.0, 8.0)],
        );
        assert_eq!(cell_text(&glued), "ABCD");

        let spaced = cell(
            0.0,
            20.0,
            1,
            vec![chunk("AB", 2.0, 15.0, 8.0), chunk("EF", 12.0, 15.0, 8.0)],
        );
        assert_eq!(cell_text(&spaced), "AB EF");
    }

    #[test]
    fn test_wrapped_lines_in_one_cell() {
        let wrapped = cell(
            0.0,
            40.0,
            1,
            vec![chunk("second", 2.0, 30.0, 20.0), chunk("first", 2.0, 18.0, 20.0)],
        );
        assert_eq!(cell_text(&wrapped), "first second");
    }

    #[test]
    fn test_span_repeats_delimiter() {
        let mut rows: Rows<CellTemplate> = Rows::new();
        rows.entry(20.0)
            .push(cell(0.0, 20.0, 3, vec![chunk("Header", 5.0, 15.0, 30.0)]));
        rows.entry(40.0).extend([
            cell(0.0, 40.0, 1, vec![chunk("a", 5.0, 35.0, 5.0)]),
            cell(50.0, 40.0, 1, Vec::new()),
            cell(100.0, 40.0, 1, vec![chunk("c", 105.0, 35.0, 5.0)]),
        ]);

        assert_eq!(write_grid(&rows, ";"), "Header;;\na;;c\n");
    }

    #[test]
    fn test_plain_rows() {
        let mut rows: Rows<TextChunk> = Rows::new();
        rows.entry(30.0).push(chunk("below", 0.0, 30.0, 20.0));
        rows.entry(10.0).extend([
            chunk("World", 40.0, 10.0, 20.0),
            chunk("Hello", 0.0, 10.0, 20.0),
        ]);

        assert_eq!(write_plain_rows(&rows, ","), "Hello, World\nbelow\n");
    }

    #[test]
    fn test_empty_rows_write_nothing() {
        assert_eq!(write_grid(&Rows::new(), ","), "");
        assert_eq!(write_plain_rows(&Rows::new(), ","), "");
    }
}
