//! Content stream decoding using lopdf
//!
//! Walks a page's content stream, tracks the graphics and text state, and
//! feeds path and text events to a [`RenderListener`]. Text placements carry
//! their baseline, ascent and descent lines in user space.

use crate::collector::{
    CollectedPage, PageCollector, PageInfo, PathConstruction, PathPaint, RenderListener,
    TextRenderInfo,
};
use crate::geometry::{multiply_matrices, transform_point, Matrix, Point, IDENTITY};
use crate::layout::render_page;
use crate::PdfError;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;

/// US Letter, used when no `/MediaBox` is found
const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

/// Guard against cyclic `/Parent` chains
const MAX_PAGE_TREE_DEPTH: usize = 32;

/// Glyph metrics in thousandths of text space units
const DEFAULT_GLYPH_WIDTH: f32 = 500.0;
const DEFAULT_CID_WIDTH: f32 = 1000.0;
const DEFAULT_ASCENT: f32 = 750.0;
const DEFAULT_DESCENT: f32 = -250.0;

/// Extract one page as delimited text
pub fn extract_page(doc: &Document, page_id: ObjectId, delimiter: &str) -> Result<String, PdfError> {
    let page = collect_page(doc, page_id)?;
    Ok(render_page(&page, delimiter))
}

/// Collect the text chunks and path geometry of one page
pub fn collect_page(doc: &Document, page_id: ObjectId) -> Result<CollectedPage, PdfError> {
    let info = page_info(doc, page_id)?;
    let mut collector = PageCollector::new(info)?;
    replay_content(doc, page_id, &mut collector)?;
    Ok(collector.finish())
}

/// Rotation and size of a page, resolving inherited attributes
pub fn page_info(doc: &Document, page_id: ObjectId) -> Result<PageInfo, PdfError> {
    let page = doc.get_dictionary(page_id)?;

    let rotation = match inherited_attribute(doc, page, b"Rotate") {
        Some(obj) => obj.as_i64().map_err(|_| PdfError::InvalidStructure)?,
        None => 0,
    };

    let (width, height) = match inherited_attribute(doc, page, b"MediaBox") {
        Some(obj) => {
            let values: Vec<f32> = obj
                .as_array()
                .map_err(|_| PdfError::InvalidStructure)?
                .iter()
                .filter_map(|o| get_number(resolve(doc, o)))
                .collect();
            if values.len() < 4 {
                return Err(PdfError::InvalidStructure);
            }
            ((values[2] - values[0]).abs(), (values[3] - values[1]).abs())
        }
        None => DEFAULT_PAGE_SIZE,
    };

    Ok(PageInfo {
        rotation,
        width,
        height,
    })
}

/// Decode a page's content stream and replay it into `listener`
pub fn replay_content(
    doc: &Document,
    page_id: ObjectId,
    listener: &mut dyn RenderListener,
) -> Result<(), PdfError> {
    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();

    let content_data = doc
        .get_page_content(page_id)
        .map_err(|e| PdfError::Parse(e.to_string()))?;
    let content = Content::decode(&content_data).map_err(|e| PdfError::Parse(e.to_string()))?;

    let mut walker = ContentWalker::new(doc, fonts);
    walker.run(&content.operations, listener);
    Ok(())
}

/// Follow a reference to the object it points at
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn dict_get<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().map(|o| resolve(doc, o))
}

fn dict_number(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<f32> {
    dict_get(doc, dict, key).and_then(get_number)
}

/// Look up an attribute on the page or, failing that, on its ancestors
fn inherited_attribute<'a>(
    doc: &'a Document,
    page: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    let mut node = page;
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        if let Some(value) = dict_get(doc, node, key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Helper to get f32 from Object
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Widths and vertical metrics of one font
#[derive(Debug, Clone)]
struct FontMetrics {
    widths: BTreeMap<u32, f32>,
    default_width: f32,
    ascent: f32,
    descent: f32,
    /// Composite fonts address glyphs with two-byte codes
    two_byte: bool,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            widths: BTreeMap::new(),
            default_width: DEFAULT_GLYPH_WIDTH,
            ascent: DEFAULT_ASCENT,
            descent: DEFAULT_DESCENT,
            two_byte: false,
        }
    }
}

impl FontMetrics {
    fn load(doc: &Document, font: &Dictionary) -> Self {
        let mut metrics = FontMetrics::default();

        let is_type0 = font
            .get(b"Subtype")
            .and_then(|s| s.as_name())
            .map(|name| name == b"Type0")
            .unwrap_or(false);

        let descriptor_owner = if is_type0 {
            metrics.two_byte = true;
            metrics.default_width = DEFAULT_CID_WIDTH;
            let descendant = dict_get(doc, font, b"DescendantFonts")
                .and_then(|d| d.as_array().ok())
                .and_then(|a| a.first())
                .and_then(|d| resolve(doc, d).as_dict().ok());
            if let Some(descendant) = descendant {
                if let Some(dw) = dict_number(doc, descendant, b"DW") {
                    metrics.default_width = dw;
                }
                if let Some(w) = dict_get(doc, descendant, b"W").and_then(|w| w.as_array().ok()) {
                    metrics.widths = parse_cid_widths(doc, w);
                }
            }
            descendant
        } else {
            let first_char = dict_number(doc, font, b"FirstChar").unwrap_or(0.0) as u32;
            if let Some(widths) = dict_get(doc, font, b"Widths").and_then(|w| w.as_array().ok()) {
                for (offset, width) in widths.iter().enumerate() {
                    if let Some(width) = get_number(resolve(doc, width)) {
                        metrics.widths.insert(first_char + offset as u32, width);
                    }
                }
            }
            Some(font)
        };

        let descriptor = descriptor_owner
            .and_then(|owner| dict_get(doc, owner, b"FontDescriptor"))
            .and_then(|d| d.as_dict().ok());
        if let Some(descriptor) = descriptor {
            if !metrics.two_byte {
                if let Some(missing) = dict_number(doc, descriptor, b"MissingWidth") {
                    if missing > 0.0 {
                        metrics.default_width = missing;
                    }
                }
            }
            if let Some(ascent) = dict_number(doc, descriptor, b"Ascent").filter(|a| *a != 0.0) {
                metrics.ascent = ascent;
            }
            if let Some(descent) = dict_number(doc, descriptor, b"Descent").filter(|d| *d != 0.0) {
                metrics.descent = descent;
            }
        }

        metrics
    }

    fn width(&self, code: u32) -> f32 {
        self.widths.get(&code).copied().unwrap_or(self.default_width)
    }

    fn space_width(&self) -> f32 {
        match self.widths.get(&32) {
            Some(w) if *w > 0.0 => *w,
            _ => self.default_width,
        }
    }

    fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| match pair {
                    [hi, lo] => (u32::from(*hi) << 8) | u32::from(*lo),
                    [single] => u32::from(*single),
                    _ => 0,
                })
                .collect()
        } else {
            bytes.iter().map(|b| u32::from(*b)).collect()
        }
    }
}

/// Parse a CID `/W` array: `c [w1 w2 ...]` and `c_first c_last w` runs
fn parse_cid_widths(doc: &Document, array: &[Object]) -> BTreeMap<u32, f32> {
    let mut widths = BTreeMap::new();
    let mut i = 0;
    while i + 1 < array.len() {
        let Some(first) = get_number(resolve(doc, &array[i])) else {
            break;
        };
        let first = first as u32;
        match resolve(doc, &array[i + 1]) {
            Object::Array(run) => {
                for (offset, width) in run.iter().enumerate() {
                    if let Some(width) = get_number(resolve(doc, width)) {
                        widths.insert(first + offset as u32, width);
                    }
                }
                i += 2;
            }
            last => {
                let (Some(last), Some(width)) = (
                    get_number(last),
                    array.get(i + 2).and_then(|w| get_number(resolve(doc, w))),
                ) else {
                    break;
                };
                for code in first..=last as u32 {
                    widths.insert(code, width);
                }
                i += 3;
            }
        }
    }
    widths
}

/// Graphics state saved and restored by `q`/`Q`
#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Vec<u8>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    /// `Tz` as a fraction
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            font: Vec::new(),
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

fn translation(tx: f32, ty: f32) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

struct ContentWalker<'a> {
    doc: &'a Document,
    fonts: BTreeMap<Vec<u8>, &'a Dictionary>,
    metrics: BTreeMap<Vec<u8>, FontMetrics>,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
}

impl<'a> ContentWalker<'a> {
    fn new(doc: &'a Document, fonts: BTreeMap<Vec<u8>, &'a Dictionary>) -> Self {
        Self {
            doc,
            fonts,
            metrics: BTreeMap::new(),
            state: GraphicsState::default(),
            stack: Vec::new(),
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
        }
    }

    fn run(&mut self, operations: &[Operation], listener: &mut dyn RenderListener) {
        for op in operations {
            let nums: Vec<f32> = op.operands.iter().filter_map(get_number).collect();
            match op.operator.as_str() {
                "q" => self.stack.push(self.state.clone()),
                "Q" => match self.stack.pop() {
                    Some(saved) => self.state = saved,
                    None => log::warn!("unbalanced Q in content stream"),
                },
                "cm" => {
                    if let &[a, b, c, d, e, f] = nums.as_slice() {
                        self.state.ctm = multiply_matrices(&[a, b, c, d, e, f], &self.state.ctm);
                    }
                }

                // Path construction
                "m" => {
                    if let &[x, y] = nums.as_slice() {
                        listener.modify_path(PathConstruction::MoveTo(x, y));
                    }
                }
                "l" => {
                    if let &[x, y] = nums.as_slice() {
                        listener.modify_path(PathConstruction::LineTo(x, y));
                    }
                }
                "c" | "v" | "y" => listener.modify_path(PathConstruction::Curve),
                "re" => {
                    if let &[x, y, width, height] = nums.as_slice() {
                        listener.modify_path(PathConstruction::Rect {
                            x,
                            y,
                            width,
                            height,
                        });
                    }
                }
                "h" => listener.modify_path(PathConstruction::Close),

                // Path painting
                "S" => listener.render_path(PathPaint::Stroke, &self.state.ctm),
                "s" => {
                    listener.modify_path(PathConstruction::Close);
                    listener.render_path(PathPaint::Stroke, &self.state.ctm);
                }
                "f" | "F" | "f*" => listener.render_path(PathPaint::Fill, &self.state.ctm),
                "B" | "B*" => listener.render_path(PathPaint::FillStroke, &self.state.ctm),
                "b" | "b*" => {
                    listener.modify_path(PathConstruction::Close);
                    listener.render_path(PathPaint::FillStroke, &self.state.ctm);
                }
                "n" => listener.render_path(PathPaint::NoOp, &self.state.ctm),

                // Text objects and state
                "BT" => {
                    self.text_matrix = IDENTITY;
                    self.line_matrix = IDENTITY;
                }
                "Tf" => {
                    if let Some(Ok(name)) = op.operands.first().map(|o| o.as_name()) {
                        self.state.font = name.to_vec();
                    }
                    if let Some(size) = op.operands.get(1).and_then(get_number) {
                        self.state.font_size = size;
                    }
                }
                "Tc" => {
                    if let &[spacing] = nums.as_slice() {
                        self.state.char_spacing = spacing;
                    }
                }
                "Tw" => {
                    if let &[spacing] = nums.as_slice() {
                        self.state.word_spacing = spacing;
                    }
                }
                "Tz" => {
                    if let &[scale] = nums.as_slice() {
                        self.state.horizontal_scale = scale / 100.0;
                    }
                }
                "TL" => {
                    if let &[leading] = nums.as_slice() {
                        self.state.leading = leading;
                    }
                }
                "Ts" => {
                    if let &[rise] = nums.as_slice() {
                        self.state.rise = rise;
                    }
                }

                // Text positioning
                "Td" => {
                    if let &[tx, ty] = nums.as_slice() {
                        self.next_line(tx, ty);
                    }
                }
                "TD" => {
                    if let &[tx, ty] = nums.as_slice() {
                        self.state.leading = -ty;
                        self.next_line(tx, ty);
                    }
                }
                "Tm" => {
                    if let &[a, b, c, d, e, f] = nums.as_slice() {
                        self.line_matrix = [a, b, c, d, e, f];
                        self.text_matrix = self.line_matrix;
                    }
                }
                "T*" => self.next_line(0.0, -self.state.leading),

                // Text showing
                "Tj" => {
                    if let Some(operand) = op.operands.first() {
                        self.show_text(operand, listener);
                    }
                }
                "TJ" => {
                    if let Some(Ok(array)) = op.operands.first().map(|o| o.as_array()) {
                        for item in array {
                            match get_number(item) {
                                Some(adjustment) => {
                                    let tx = -adjustment / 1000.0
                                        * self.state.font_size
                                        * self.state.horizontal_scale;
                                    self.text_matrix =
                                        multiply_matrices(&translation(tx, 0.0), &self.text_matrix);
                                }
                                None => self.show_text(item, listener),
                            }
                        }
                    }
                }
                "'" => {
                    self.next_line(0.0, -self.state.leading);
                    if let Some(operand) = op.operands.first() {
                        self.show_text(operand, listener);
                    }
                }
                "\"" => {
                    if let (Some(aw), Some(ac)) = (
                        op.operands.first().and_then(get_number),
                        op.operands.get(1).and_then(get_number),
                    ) {
                        self.state.word_spacing = aw;
                        self.state.char_spacing = ac;
                    }
                    self.next_line(0.0, -self.state.leading);
                    if let Some(operand) = op.operands.get(2) {
                        self.show_text(operand, listener);
                    }
                }
                _ => {}
            }
        }
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = multiply_matrices(&translation(tx, ty), &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    /// Emit one text placement for a string operand and advance the text
    /// matrix past it. Whitespace-only strings only advance.
    fn show_text(&mut self, operand: &Object, listener: &mut dyn RenderListener) {
        let Object::String(bytes, _) = operand else {
            return;
        };

        if !self.metrics.contains_key(&self.state.font) {
            let loaded = match self.fonts.get(&self.state.font) {
                Some(font) => FontMetrics::load(self.doc, font),
                None => {
                    log::warn!(
                        "font resource {:?} not found, using default metrics",
                        String::from_utf8_lossy(&self.state.font)
                    );
                    FontMetrics::default()
                }
            };
            self.metrics.insert(self.state.font.clone(), loaded);
        }
        let Some(metrics) = self.metrics.get(&self.state.font) else {
            return;
        };

        let state = &self.state;
        let mut advance = 0.0;
        for code in metrics.codes(bytes) {
            let mut glyph = metrics.width(code) / 1000.0 * state.font_size + state.char_spacing;
            if code == 32 && !metrics.two_byte {
                glyph += state.word_spacing;
            }
            advance += glyph * state.horizontal_scale;
        }

        let text = extract_text_from_operand(operand, self.doc, &self.fonts, &state.font)
            .unwrap_or_default();
        if !text.trim().is_empty() {
            let space = (metrics.space_width() / 1000.0 * state.font_size
                + state.char_spacing
                + state.word_spacing)
                * state.horizontal_scale;
            let ascent = state.rise + metrics.ascent / 1000.0 * state.font_size;
            let descent = state.rise + metrics.descent / 1000.0 * state.font_size;

            let rendering = multiply_matrices(&self.text_matrix, &state.ctm);
            let at = |x: f32, y: f32| {
                let (px, py) = transform_point(&rendering, x, y);
                Point::new(px, py)
            };
            let origin = at(0.0, 0.0);
            let space_end = at(space, 0.0);

            let info = TextRenderInfo {
                text,
                baseline: (at(0.0, state.rise), at(advance, state.rise)),
                ascent_line: (at(0.0, ascent), at(advance, ascent)),
                descent_line: (at(0.0, descent), at(advance, descent)),
                single_space_width: (space_end.x - origin.x).hypot(space_end.y - origin.y),
            };
            log::debug!("show {:?} at ({}, {})", info.text, origin.x, origin.y);
            listener.render_text(&info);
        }

        self.text_matrix = multiply_matrices(&translation(advance, 0.0), &self.text_matrix);
    }
}

/// Extract text from a text operand, handling encoding
fn extract_text_from_operand(
    obj: &Object,
    doc: &Document,
    fonts: &BTreeMap<Vec<u8>, &Dictionary>,
    current_font: &[u8],
) -> Option<String> {
    if let Object::String(bytes, _) = obj {
        // Try to decode using font encoding
        if let Some(font_dict) = fonts.get(current_font) {
            if let Ok(encoding) = font_dict.get_font_encoding(doc) {
                if let Ok(text) = Document::decode_text(&encoding, bytes) {
                    return Some(text);
                }
            }
        }

        // Fallback: try UTF-16BE then Latin-1
        if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
            let utf16: Vec<u16> = bytes[2..]
                .chunks_exact(2)
                .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
                .collect();
            return Some(String::from_utf16_lossy(&utf16));
        }

        // Latin-1 fallback
        Some(bytes.iter().map(|&b| b as char).collect())
    } else {
        None
    }
}
