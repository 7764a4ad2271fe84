//! Cell assignment
//!
//! Places text chunks into the cell templates of a grid. Chunks that fit no
//! template either get a synthesized column or end up in a cell of their own.

use crate::geometry::{cmp_f32, CellTemplate, Rectangle, TextChunk, TOLERANCE};
use crate::rows::Rows;

/// How far above a chunk a template's top edge may sit and still be tried
const TEMPLATE_REACH: f32 = 20.0;

/// Assign chunks to the first template that contains them, tolerating
/// `char_width` of horizontal overhang. Templates are tried in build order.
pub fn assign_by_containment(
    templates: &mut [CellTemplate],
    text_rows: &mut Rows<TextChunk>,
    char_width: f32,
) {
    text_rows.sort_by_y();
    for row in text_rows.iter_mut() {
        for chunk in row.items.iter_mut() {
            if chunk.assigned {
                continue;
            }
            for template in templates.iter_mut() {
                if template.rect.y < chunk.rect.bottom()
                    || template.rect.y - TEMPLATE_REACH > chunk.rect.y
                {
                    continue;
                }
                if template.contains(chunk, char_width) {
                    chunk.assigned = true;
                    template.text.push(chunk.clone());
                    break;
                }
            }
        }
    }
}

/// Place every chunk the containment pass left over.
///
/// A chunk goes to the first template row that vertically encloses it, into
/// the template whose `[x, right)` holds the chunk's left edge. When the row
/// has no such template, a new column is synthesized between the neighbouring
/// templates and added to every template row. Anything still unplaced becomes
/// a single-chunk template keyed at its text row, added after the whole text
/// row is processed.
pub fn place_unassigned(
    template_rows: &mut Rows<CellTemplate>,
    text_rows: &mut Rows<TextChunk>,
    overflow_delta: f32,
) {
    for row in text_rows.iter_mut() {
        let text_y = row.y;
        let mut leftovers = Vec::new();
        for chunk in row.items.iter_mut() {
            if chunk.assigned {
                continue;
            }
            chunk.assigned = true;
            if !place_chunk(template_rows, chunk, overflow_delta) {
                log::debug!("unplaced chunk {:?} kept at row {}", chunk.text, text_y);
                leftovers.push(CellTemplate::for_chunk(chunk.clone()));
            }
        }
        if !leftovers.is_empty() {
            template_rows.entry(text_y).extend(leftovers);
        }
    }
}

fn place_chunk(template_rows: &mut Rows<CellTemplate>, chunk: &TextChunk, overflow_delta: f32) -> bool {
    let Some(origin) = template_rows.iter().position(|row| {
        let Some(max_height) = row
            .items
            .iter()
            .map(|t| t.rect.height)
            .max_by(|a, b| cmp_f32(*a, *b))
        else {
            return false;
        };
        row.y >= chunk.rect.y && row.y - max_height <= chunk.rect.bottom()
    }) else {
        return false;
    };

    let row = &mut template_rows[origin];
    if let Some(template) = row
        .items
        .iter_mut()
        .find(|t| chunk.rect.x >= t.rect.x && chunk.rect.x < t.rect.right())
    {
        template.text.push(chunk.clone());
        return true;
    }

    let mut ordered: Vec<&Rectangle> = row.items.iter().map(|t| &t.rect).collect();
    ordered.sort_by(|a, b| cmp_f32(a.x, b.x));
    let next = ordered.iter().position(|r| r.x >= chunk.rect.x);
    let left = match next {
        Some(0) => 0.0,
        Some(i) => ordered[i - 1].right(),
        None => ordered.last().map_or(0.0, |r| r.right()),
    };
    let right = match next {
        Some(i) => ordered[i].x,
        None => chunk.rect.right(),
    };
    let origin_y = row.y;
    let height = chunk.rect.height + overflow_delta;

    log::debug!(
        "synthesized column [{}, {}) for chunk {:?}",
        left,
        right,
        chunk.text
    );

    for row in template_rows.iter_mut() {
        let Some(y) = row
            .items
            .iter()
            .map(|t| t.rect.y)
            .max_by(|a, b| cmp_f32(*a, *b))
        else {
            continue;
        };
        let mut cell = CellTemplate::new(Rectangle::new(left, y, right - left, height), 1, 1);
        if (row.y - origin_y).abs() < TOLERANCE {
            cell.text.push(chunk.clone());
        }
        row.items.push(cell);
    }
    true
}
