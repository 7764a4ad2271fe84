//! Page segmentation and per-band table reconstruction
//!
//! A page is cut into bands wherever consecutive content Y values are further
//! apart than twice the tallest text. Each band is clustered into rows, gets a
//! grid when it has usable rectangles, and is serialized on its own.

use crate::assign::{assign_by_containment, place_unassigned};
use crate::collector::CollectedPage;
use crate::geometry::{cmp_f32, most_common, Rectangle, TextChunk};
use crate::grid::Grid;
use crate::rows::{cluster_rectangle_rows, cluster_text_rows, Rows};
use crate::serialize::{write_grid, write_plain_rows};

/// Vertical slack for row clustering, as a fraction of the modal chunk height
const OVERFLOW_RATIO: f32 = 0.2;

/// A vertical slice of a page processed independently
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    /// First Y in the band (inclusive)
    pub begin: f32,
    /// Upper bound: exclusive for inner bands, inclusive for the last one
    pub end: f32,
    pub chunks: Vec<TextChunk>,
    pub rectangles: Vec<Rectangle>,
}

/// Gap that separates two bands: twice the ceiling of the tallest chunk
pub fn band_gap_threshold(chunks: &[TextChunk]) -> Option<f32> {
    chunks
        .iter()
        .map(|c| c.rect.height)
        .max_by(|a, b| cmp_f32(*a, *b))
        .map(|h| h.ceil() * 2.0)
}

/// Split a collected page into bands. Returns nothing for a page without
/// text. Content above `y = 0` never lands in a band.
pub fn split_bands(page: &CollectedPage) -> Vec<Band> {
    let Some(threshold) = band_gap_threshold(&page.chunks) else {
        return Vec::new();
    };

    let mut ys: Vec<f32> = page
        .chunks
        .iter()
        .map(|c| c.rect.y)
        .chain(page.rectangles.iter().map(|r| r.y))
        .collect();
    ys.sort_by(|a, b| cmp_f32(*a, *b));
    ys.dedup();

    let Some(&last) = ys.last() else {
        return Vec::new();
    };

    let slice = |begin: f32, end: f32, inclusive: bool| {
        let inside = |y: f32| y >= begin && (y < end || (inclusive && y == end));
        Band {
            begin,
            end,
            chunks: page
                .chunks
                .iter()
                .filter(|c| inside(c.rect.y))
                .cloned()
                .collect(),
            rectangles: page
                .rectangles
                .iter()
                .filter(|r| inside(r.y))
                .copied()
                .collect(),
        }
    };

    let mut bands = Vec::new();
    let mut begin = 0.0;
    for pair in ys.windows(2) {
        if pair[1] - pair[0] > threshold {
            bands.push(slice(begin, pair[1], false));
            begin = pair[1];
        }
    }
    bands.push(slice(begin, last, true));
    bands
}

/// Reconstruct and serialize one band. A band without text renders empty.
pub fn render_band(
    chunks: &[TextChunk],
    rectangles: &[Rectangle],
    char_width: f32,
    delimiter: &str,
) -> String {
    let Some(modal_text_height) = most_common(chunks.iter().map(|c| c.rect.height)) else {
        return String::new();
    };
    let overflow_delta = modal_text_height * OVERFLOW_RATIO;
    let min_height = chunks
        .iter()
        .map(|c| c.rect.height)
        .min_by(|a, b| cmp_f32(*a, *b))
        .unwrap_or(0.0);
    let min_width = chunks
        .iter()
        .map(|c| c.rect.width)
        .min_by(|a, b| cmp_f32(*a, *b))
        .unwrap_or(0.0);
    let modal_rect_height = most_common(rectangles.iter().map(|r| r.height)).unwrap_or(1.0);

    let mut text_rows = cluster_text_rows(chunks, overflow_delta);
    let rect_rows = if rectangles.is_empty() {
        Rows::new()
    } else {
        cluster_rectangle_rows(rectangles, modal_rect_height, min_height, min_width)
    };

    if rect_rows.is_empty() {
        log::debug!("band without usable rectangles: {} text rows", text_rows.len());
        return write_plain_rows(&text_rows, delimiter);
    }

    let mut grid = Grid::build(rect_rows);
    assign_by_containment(&mut grid.templates, &mut text_rows, char_width);
    let mut template_rows = grid.into_rows();
    place_unassigned(&mut template_rows, &mut text_rows, overflow_delta);

    write_grid(&template_rows, delimiter)
}

/// Render a whole page band by band, top to bottom
pub fn render_page(page: &CollectedPage, delimiter: &str) -> String {
    let bands = split_bands(page);
    log::debug!("page split into {} bands", bands.len());

    let mut out = String::new();
    for band in bands.iter().filter(|b| !b.chunks.is_empty()) {
        out.push_str(&render_band(
            &band.chunks,
            &band.rectangles,
            page.char_width,
            delimiter,
        ));
    }
    out
}
