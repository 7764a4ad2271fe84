//! Grid construction from rectangle rows
//!
//! Derives column dividers from rectangle edges and turns every rectangle
//! into a cell template spanning the dividers it covers.

use crate::geometry::{cmp_f32, CellTemplate, Rectangle, TOLERANCE};
use crate::rows::Rows;

/// Dividers closer than this collapse into one
pub const DIVIDER_TOLERANCE: f32 = 2.0;

/// A template past the right edge by more than this ends the divider walk
const RIGHT_EDGE_SLACK: f32 = 1.0;

/// Column dividers and the cell templates built on them
#[derive(Debug, Clone)]
pub struct Grid {
    /// Normalized column boundaries, ascending
    pub vertical_dividers: Vec<f32>,
    /// Top and bottom edges of all cells. Not consumed by placement yet.
    pub horizontal_dividers: Vec<f32>,
    pub templates: Vec<CellTemplate>,
}

fn insert_unique(values: &mut Vec<f32>, value: f32) {
    if !values.contains(&value) {
        values.push(value);
    }
}

impl Grid {
    /// Build dividers and templates from clustered rectangle rows.
    ///
    /// A left edge shared by two or more rectangles is a true divider and
    /// contributes the rectangle's right edge too. When the band has more than
    /// one row, a left edge used by a single rectangle is demoted, and that
    /// rectangle leaves its row if the row has other cells.
    pub fn build(mut rect_rows: Rows<Rectangle>) -> Self {
        rect_rows.sort_by_y();

        let mut vertical: Vec<f32> = Vec::new();
        let mut horizontal: Vec<f32> = Vec::new();
        let mut by_left_edge: Vec<(f32, Vec<Rectangle>)> = Vec::new();

        for row in rect_rows.iter() {
            for rect in &row.items {
                insert_unique(&mut vertical, rect.x);
                insert_unique(&mut horizontal, rect.y);
                insert_unique(&mut horizontal, rect.bottom());
                match by_left_edge.iter_mut().find(|(x, _)| *x == rect.x) {
                    Some((_, group)) => group.push(*rect),
                    None => by_left_edge.push((rect.x, vec![*rect])),
                }
            }
        }

        let corroborated = rect_rows.len() > 1;
        for (x, group) in &by_left_edge {
            let first = group[0];
            if group.len() == 1 && corroborated {
                vertical.retain(|v| v != x);
                if let Some(row) = rect_rows.get_mut(first.y) {
                    if row.len() > 1 {
                        if let Some(pos) = row.iter().position(|r| {
                            (r.x - first.x).abs() < TOLERANCE
                                && (r.width - first.width).abs() < TOLERANCE
                        }) {
                            row.remove(pos);
                        }
                    }
                }
            } else {
                insert_unique(&mut vertical, first.right());
            }
        }

        let vertical_dividers = normalize_dividers(&vertical);
        horizontal.sort_by(|a, b| cmp_f32(*a, *b));

        let mut templates = Vec::new();
        for row in rect_rows.iter() {
            // Smallest cell height in the row is the unit for vertical spans
            let Some(unit_height) = row
                .items
                .iter()
                .map(|r| r.height)
                .min_by(|a, b| cmp_f32(*a, *b))
            else {
                continue;
            };
            for rect in &row.items {
                if let Some(template) = create_template(rect, &vertical_dividers, unit_height) {
                    templates.push(template);
                }
            }
        }

        log::debug!(
            "grid: {} dividers, {} templates over {} rows",
            vertical_dividers.len(),
            templates.len(),
            rect_rows.len()
        );

        Self {
            vertical_dividers,
            horizontal_dividers: horizontal,
            templates,
        }
    }

    /// Group templates into rows and pad every row that does not cover all
    /// divider columns with empty cells for the unclaimed columns.
    pub fn into_rows(self) -> Rows<CellTemplate> {
        let Grid {
            vertical_dividers: dividers,
            templates,
            ..
        } = self;

        let mut rows: Rows<CellTemplate> = Rows::new();
        for template in templates {
            rows.entry(template.rect.y).push(template);
        }

        let columns = dividers.len().saturating_sub(1);
        for row in rows.iter_mut() {
            if row.items.len() != columns {
                let average_height =
                    row.items.iter().map(|t| t.rect.height).sum::<f32>() / row.items.len() as f32;

                let mut claimed = vec![false; columns];
                for (column, divider) in dividers.iter().take(columns).enumerate() {
                    for template in row
                        .items
                        .iter()
                        .filter(|t| (t.rect.x - divider).abs() < DIVIDER_TOLERANCE)
                    {
                        for slot in claimed
                            .iter_mut()
                            .skip(column)
                            .take(template.horizontal_span)
                        {
                            *slot = true;
                        }
                    }
                }

                let y = row.y;
                row.items.extend(
                    claimed
                        .iter()
                        .enumerate()
                        .filter(|(_, taken)| !**taken)
                        .map(|(column, _)| {
                            let left = dividers[column];
                            let width = dividers[column + 1] - left;
                            CellTemplate::new(Rectangle::new(left, y, width, average_height), 1, 1)
                        }),
                );
            }
            row.items.sort_by(|a, b| cmp_f32(a.rect.x, b.rect.x));
        }

        rows.sort_by_y();
        rows
    }
}

/// Collapse dividers closer than [`DIVIDER_TOLERANCE`] by averaging them
/// into a shared bucket. The result is ascending and independent of input
/// order.
pub fn normalize_dividers(raw: &[f32]) -> Vec<f32> {
    let mut dividers = raw.to_vec();
    dividers.sort_by(|a, b| cmp_f32(*a, *b));

    let mut buckets: Vec<f32> = Vec::new();
    for divider in dividers {
        match buckets
            .iter_mut()
            .find(|b| (**b - divider).abs() < DIVIDER_TOLERANCE)
        {
            Some(bucket) => *bucket = (*bucket + divider) / 2.0,
            None => buckets.push(divider),
        }
    }
    buckets
}

/// Template for one rectangle: the divider matching its right edge decides
/// how many columns it spans. Falls back to a single-span template when the
/// walk passes the right edge without a match.
fn create_template(rect: &Rectangle, dividers: &[f32], unit_height: f32) -> Option<CellTemplate> {
    let vertical_span = if unit_height > 0.0 {
        (rect.height / unit_height) as usize
    } else {
        1
    };

    for (index, divider) in dividers.iter().enumerate().skip(1) {
        if (divider - rect.right()).abs() < DIVIDER_TOLERANCE {
            let mut span = 0;
            for previous in dividers[..index].iter().rev() {
                span += 1;
                if (previous - rect.x).abs() < DIVIDER_TOLERANCE {
                    break;
                }
            }
            return Some(CellTemplate::new(*rect, span, vertical_span));
        }
        if *divider > rect.right() + RIGHT_EDGE_SLACK {
            return Some(CellTemplate::new(*rect, 1, vertical_span));
        }
    }
    None
}
