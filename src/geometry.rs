//! Geometric primitives for table reconstruction
//!
//! All coordinates are in normalized page space: origin at the top-left once
//! the page rotation has been corrected. A rectangle is anchored at `(x, y)`
//! where `y` is its larger vertical edge, so `y - height` is the other one.

use std::cmp::Ordering;

/// Tolerance for point equality and row key comparison
pub const TOLERANCE: f32 = 1e-6;

/// 2D affine matrix `[a, b, c, d, e, f]`
pub type Matrix = [f32; 6];

/// The identity transform
pub const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Multiply two 2D transformation matrices
/// Matrix format: [a, b, c, d, e, f] representing:
/// | a  b  0 |
/// | c  d  0 |
/// | e  f  1 |
pub fn multiply_matrices(m1: &Matrix, m2: &Matrix) -> Matrix {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

/// Apply an affine matrix to a point
pub fn transform_point(m: &Matrix, x: f32, y: f32) -> (f32, f32) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

/// Ascending comparison for floats, treating NaN as equal
pub(crate) fn cmp_f32(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Most frequent value; ties go to the value seen first
pub(crate) fn most_common(values: impl IntoIterator<Item = f32>) -> Option<f32> {
    let mut counts: Vec<(f32, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some(entry) => entry.1 += 1,
            None => counts.push((value, 1)),
        }
    }

    let mut best: Option<(f32, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}

/// A point in page space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Equality within [`TOLERANCE`] on both axes
    pub fn is_equal(&self, other: &Point) -> bool {
        (self.x - other.x).abs() < TOLERANCE && (self.y - other.y).abs() < TOLERANCE
    }
}

/// An axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rectangle {
    pub x: f32,
    /// Top edge in normalized space
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rectangle {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y - self.height
    }

    /// Whether `other` straddles this rectangle's `y` edge while crossing
    /// its left or right edge.
    ///
    /// Not symmetric: `a.intersects(&b)` and `b.intersects(&a)` answer
    /// different questions, and a rectangle never intersects itself.
    pub fn intersects(&self, other: &Rectangle) -> bool {
        let straddles_y = other.y > self.y && other.bottom() < self.y;
        if !straddles_y {
            return false;
        }
        let crosses_left = other.x < self.x && other.right() > self.x;
        let crosses_right = other.x < self.right() && other.right() > self.right();
        crosses_left || crosses_right
    }
}

/// Anything placed on the page by a rectangle
pub trait Positioned {
    fn rect(&self) -> &Rectangle;
}

impl Positioned for Rectangle {
    fn rect(&self) -> &Rectangle {
        self
    }
}

/// A straight segment. Collected but not used as a divider yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub begin: Point,
    pub end: Point,
}

impl Line {
    pub fn new(begin: Point, end: Point) -> Self {
        Self { begin, end }
    }
}

/// One merged run of placed glyphs
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub rect: Rectangle,
    pub text: String,
    /// Set once the chunk has been placed into a cell
    pub assigned: bool,
}

impl TextChunk {
    pub fn new(text: impl Into<String>, rect: Rectangle) -> Self {
        Self {
            rect,
            text: text.into(),
            assigned: false,
        }
    }
}

impl Positioned for TextChunk {
    fn rect(&self) -> &Rectangle {
        &self.rect
    }
}

/// A reconstructed grid cell collecting the chunks placed inside it
#[derive(Debug, Clone, PartialEq)]
pub struct CellTemplate {
    pub rect: Rectangle,
    pub text: Vec<TextChunk>,
    /// Number of divider columns the cell covers
    pub horizontal_span: usize,
    pub vertical_span: usize,
}

impl CellTemplate {
    pub fn new(rect: Rectangle, horizontal_span: usize, vertical_span: usize) -> Self {
        Self {
            rect,
            text: Vec::new(),
            horizontal_span: horizontal_span.max(1),
            vertical_span: vertical_span.max(1),
        }
    }

    /// A single-span cell holding exactly one chunk
    pub fn for_chunk(chunk: TextChunk) -> Self {
        let mut cell = Self::new(chunk.rect, 1, 1);
        cell.text.push(chunk);
        cell
    }

    /// Containment that tolerates glyph overhang: `0.2 * chunk height`
    /// vertically and `error` horizontally.
    pub fn contains(&self, chunk: &TextChunk, error: f32) -> bool {
        let height_tolerance = chunk.rect.height * 0.2;
        chunk.rect.y <= self.rect.y + height_tolerance
            && chunk.rect.bottom() >= self.rect.bottom() - height_tolerance
            && chunk.rect.x >= self.rect.x - error
            && chunk.rect.right() <= self.rect.right() + error
    }
}

impl Positioned for CellTemplate {
    fn rect(&self) -> &Rectangle {
        &self.rect
    }
}
