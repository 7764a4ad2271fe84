//! Render event collection
//!
//! [`PageCollector`] listens to the drawing events of one page, resolves path
//! geometry into rectangles and lines, and merges glyph placements into text
//! chunks. All coordinates leave the collector in normalized page space.

use crate::geometry::{
    cmp_f32, transform_point, Line, Matrix, Point, Rectangle, TextChunk, TOLERANCE,
};
use crate::PdfError;

/// Page orientations the collector can normalize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// Upright page: Y is flipped against the page height
    None,
    /// Quarter turn: coordinates are kept as drawn
    Quarter,
}

impl Rotation {
    /// Map a `/Rotate` value to a supported orientation
    pub fn from_degrees(degrees: i64) -> Result<Self, PdfError> {
        match degrees.rem_euclid(360) {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Quarter),
            _ => Err(PdfError::UnsupportedRotation(degrees)),
        }
    }
}

/// Page metadata needed for normalization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageInfo {
    /// Rotation in degrees as declared by the page
    pub rotation: i64,
    pub width: f32,
    pub height: f32,
}

/// A path construction operator with its operands in user space
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathConstruction {
    MoveTo(f32, f32),
    LineTo(f32, f32),
    /// Any Bézier segment. Curves never count as table structure.
    Curve,
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    Close,
}

/// How a finished path is painted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPaint {
    /// `n`: the path is discarded without painting
    NoOp,
    Stroke,
    Fill,
    FillStroke,
}

/// One decoded text placement in page space (before normalization)
#[derive(Debug, Clone, PartialEq)]
pub struct TextRenderInfo {
    pub text: String,
    /// Baseline start and end
    pub baseline: (Point, Point),
    pub ascent_line: (Point, Point),
    pub descent_line: (Point, Point),
    /// Advance of a space glyph in the current font
    pub single_space_width: f32,
}

/// Receiver of page drawing events in content stream order
pub trait RenderListener {
    fn modify_path(&mut self, op: PathConstruction);
    fn render_path(&mut self, paint: PathPaint, ctm: &Matrix);
    fn render_text(&mut self, info: &TextRenderInfo);
}

/// Result of classifying the points of a painted path
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Rectangle(Rectangle),
    Line(Line),
    Unrecognized,
}

/// Classify a point path after mapping every point through `transform`.
///
/// Four points, or five with the last closing onto the first, yield the
/// bounding box of the first three. Otherwise four distinct points form a
/// rectangle read off the X-sorted corners, and two points form a line.
pub fn classify_shape<F>(points: &[Point], transform: F) -> Shape
where
    F: Fn(Point) -> Point,
{
    let closed = points.len() == 5 && points[0].is_equal(&points[4]);
    if closed || points.len() == 4 {
        let corners: Vec<Point> = points[..3].iter().map(|p| transform(*p)).collect();
        let min_x = corners.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
        let max_x = corners.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
        let min_y = corners.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        let max_y = corners.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
        return Shape::Rectangle(Rectangle::new(min_x, max_y, max_x - min_x, max_y - min_y));
    }

    if points.len() == 2 {
        return Shape::Line(Line::new(transform(points[0]), transform(points[1])));
    }

    let mut distinct: Vec<Point> = Vec::new();
    for point in points.iter().map(|p| transform(*p)) {
        if !distinct.contains(&point) {
            distinct.push(point);
        }
    }
    if distinct.len() == 4 {
        distinct.sort_by(|a, b| cmp_f32(a.x, b.x).then(cmp_f32(b.y, a.y)));
        let (first, second, third) = (distinct[0], distinct[1], distinct[2]);
        return Shape::Rectangle(Rectangle::new(
            second.x,
            second.y,
            third.x - first.x,
            (second.y - first.y).abs(),
        ));
    }

    Shape::Unrecognized
}

/// Everything collected from one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedPage {
    pub chunks: Vec<TextChunk>,
    pub rectangles: Vec<Rectangle>,
    pub lines: Vec<Line>,
    /// Half the single-space advance of the last text seen
    pub char_width: f32,
}

/// Per-page collector owning all accumulated geometry
#[derive(Debug)]
pub struct PageCollector {
    rotation: Rotation,
    width: f32,
    height: f32,
    points: Vec<Point>,
    pending_rects: Vec<Rectangle>,
    page: CollectedPage,
}

impl PageCollector {
    /// Fails for any rotation other than 0 or 90 degrees
    pub fn new(info: PageInfo) -> Result<Self, PdfError> {
        Ok(Self {
            rotation: Rotation::from_degrees(info.rotation)?,
            width: info.width,
            height: info.height,
            points: Vec::new(),
            pending_rects: Vec::new(),
            page: CollectedPage::default(),
        })
    }

    /// Map a user-space point into normalized page space
    pub fn transform(&self, point: Point, ctm: &Matrix) -> Point {
        let (x, y) = transform_point(ctm, point.x, point.y);
        match self.rotation {
            Rotation::None => Point::new(x, self.height - y),
            Rotation::Quarter => Point::new(x, y),
        }
    }

    /// Hand over everything collected so far
    pub fn finish(self) -> CollectedPage {
        log::debug!(
            "collected {} chunks, {} rectangles, {} lines",
            self.page.chunks.len(),
            self.page.rectangles.len(),
            self.page.lines.len()
        );
        self.page
    }

    fn push_chunk(&mut self, chunk: TextChunk, downward: bool, half_space: f32) {
        if let Some(last) = self.page.chunks.last_mut() {
            if (last.rect.y - chunk.rect.y).abs() < TOLERANCE {
                let spacing = (chunk.rect.x - last.rect.right()).abs();
                if spacing < half_space {
                    last.rect.width += chunk.rect.width;
                    last.text.push_str(&chunk.text);
                    return;
                }
            } else if downward && (last.rect.x - chunk.rect.x).abs() < TOLERANCE {
                let spacing = (chunk.rect.y - (last.rect.y + chunk.rect.height)).abs();
                if spacing < half_space {
                    last.rect.height += chunk.rect.height;
                    last.text.push_str(&chunk.text);
                    return;
                }
            }
        }
        self.page.chunks.push(chunk);
    }
}

impl RenderListener for PageCollector {
    fn modify_path(&mut self, op: PathConstruction) {
        match op {
            PathConstruction::MoveTo(x, y) | PathConstruction::LineTo(x, y) => {
                self.points.push(Point::new(x, y));
            }
            PathConstruction::Rect {
                x,
                y,
                width,
                height,
            } => {
                // Anchor on the corner with the smaller coordinates
                let (x, width) = if width < 0.0 { (x + width, -width) } else { (x, width) };
                let (y, height) = if height < 0.0 { (y + height, -height) } else { (y, height) };
                self.pending_rects.push(Rectangle::new(x, y, width, height));
            }
            PathConstruction::Curve | PathConstruction::Close => {}
        }
    }

    fn render_path(&mut self, paint: PathPaint, ctm: &Matrix) {
        if paint != PathPaint::NoOp {
            if self.pending_rects.is_empty() {
                let shape = classify_shape(&self.points, |p| self.transform(p, ctm));
                match shape {
                    Shape::Rectangle(rect) => self.page.rectangles.push(rect),
                    Shape::Line(line) => self.page.lines.push(line),
                    Shape::Unrecognized => {
                        if !self.points.is_empty() {
                            log::debug!("ignoring path with {} points", self.points.len());
                        }
                    }
                }
            } else {
                let scale_x = ctm[0].hypot(ctm[1]);
                let scale_y = ctm[2].hypot(ctm[3]);
                let max_dimension = self.width.max(self.height);
                for rect in std::mem::take(&mut self.pending_rects) {
                    let anchor = self.transform(Point::new(rect.x, rect.y), ctm);
                    let mut width = rect.width * scale_x;
                    if anchor.x + width > max_dimension {
                        width = max_dimension - anchor.x;
                    }
                    self.page.rectangles.push(Rectangle::new(
                        anchor.x,
                        anchor.y,
                        width,
                        rect.height * scale_y,
                    ));
                }
            }
        }
        self.points.clear();
        self.pending_rects.clear();
    }

    fn render_text(&mut self, info: &TextRenderInfo) {
        let half_space = info.single_space_width / 2.0;
        self.page.char_width = half_space;

        let bottom_left = info.descent_line.0;
        let top_right = info.ascent_line.1;
        let mut rect = match self.rotation {
            Rotation::None => Rectangle::new(
                bottom_left.x,
                self.height - bottom_left.y,
                top_right.x - bottom_left.x,
                (bottom_left.y - top_right.y).abs(),
            ),
            Rotation::Quarter => Rectangle::new(
                bottom_left.y,
                bottom_left.x,
                (top_right.y - bottom_left.y).abs(),
                (bottom_left.x - top_right.x).abs(),
            ),
        };

        let (start, end) = info.baseline;
        let (mut dx, mut dy) = (end.x - start.x, end.y - start.y);
        let length = dx.hypot(dy);
        if length == 0.0 {
            (dx, dy) = (1.0, 0.0);
        } else {
            (dx, dy) = (dx / length, dy / length);
        }
        let angle = (dy.atan2(dx) * 1000.0) as i32;
        let downward = angle != 0 && (dy + 1.0).abs() < TOLERANCE;
        if downward {
            rect.y += rect.height;
        }

        log::trace!("text {:?} at ({}, {})", info.text, rect.x, rect.y);
        self.push_chunk(TextChunk::new(info.text.clone(), rect), downward, half_space);
    }
}
