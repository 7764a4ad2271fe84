//! Integration tests for PDF table extraction

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use pdf_tables::{
    collect_page, extract_tables, extract_tables_mem, ExtractOptions, PdfError, Rectangle,
    PAGE_BREAK,
};

// Helper to build a document with one A4 page per entry
fn build_pdf(pages: Vec<(Vec<Operation>, i64)>) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids: Vec<Object> = Vec::new();
    for (operations, rotate) in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Rotate" => rotate,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

fn cell(x: i64, y: i64, width: i64, height: i64) -> Vec<Operation> {
    vec![
        Operation::new("re", vec![x.into(), y.into(), width.into(), height.into()]),
        Operation::new("S", vec![]),
    ]
}

fn text(value: &str, x: i64, baseline: i64) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 10.into()]),
        Operation::new(
            "Tm",
            vec![1.into(), 0.into(), 0.into(), 1.into(), x.into(), baseline.into()],
        ),
        Operation::new("Tj", vec![Object::string_literal(value)]),
        Operation::new("ET", vec![]),
    ]
}

/// Two columns of 100x20 cells starting at (100, 700), filled row by row
fn table(rows: &[[&str; 2]]) -> Vec<Operation> {
    let mut ops = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        let y = 700 - 20 * index as i64;
        ops.extend(cell(100, y, 100, 20));
        ops.extend(cell(200, y, 100, 20));
        ops.extend(text(row[0], 105, y + 6));
        ops.extend(text(row[1], 205, y + 6));
    }
    ops
}

fn first_page(doc: &Document) -> ObjectId {
    *doc.get_pages().values().next().unwrap()
}

fn save_to_temp(doc: &mut Document) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table.pdf");
    doc.save(&path).unwrap();
    (dir, path)
}

// ============================================================================
// Collection Tests
// ============================================================================

#[test]
fn test_collect_normalizes_rectangles() {
    let doc = build_pdf(vec![(cell(100, 700, 100, 20), 0)]);
    let page = collect_page(&doc, first_page(&doc)).unwrap();

    assert!(page.chunks.is_empty());
    assert_eq!(page.rectangles, vec![Rectangle::new(100.0, 142.0, 100.0, 20.0)]);
}

#[test]
fn test_collect_text_chunks() {
    let doc = build_pdf(vec![(text("Name", 105, 706), 0)]);
    let page = collect_page(&doc, first_page(&doc)).unwrap();

    assert_eq!(page.chunks.len(), 1);
    let chunk = &page.chunks[0];
    assert_eq!(chunk.text, "Name");
    assert_eq!(chunk.rect.x, 105.0);
    // Descent line at 706 - 2.5, flipped against the page height
    assert_eq!(chunk.rect.y, 138.5);
    assert_eq!(chunk.rect.height, 10.0);
    assert!(!chunk.assigned);
}

// ============================================================================
// Extraction Tests
// ============================================================================

#[test]
fn test_extract_simple_table() {
    let mut doc = build_pdf(vec![(table(&[["Name", "Qty"], ["Apple", "5"]]), 0)]);
    let (_dir, path) = save_to_temp(&mut doc);

    let result = extract_tables(&path, &ExtractOptions::default()).unwrap();
    assert_eq!(result.page_count, 1);
    assert_eq!(result.pages[0], "Name,Qty\nApple,5\n");
}

#[test]
fn test_extract_custom_delimiter() {
    let mut doc = build_pdf(vec![(table(&[["Name", "Qty"], ["Apple", "5"]]), 0)]);
    let (_dir, path) = save_to_temp(&mut doc);

    let options = ExtractOptions {
        delimiter: ";".to_string(),
    };
    let result = extract_tables(&path, &options).unwrap();
    assert_eq!(result.to_text(), "Name;Qty\nApple;5\n");
}

#[test]
fn test_extract_spanning_header() {
    let mut ops = cell(100, 720, 200, 20);
    ops.extend(text("Fruit", 105, 726));
    ops.extend(table(&[["Name", "Qty"], ["Apple", "5"]]));
    let mut doc = build_pdf(vec![(ops, 0)]);
    let (_dir, path) = save_to_temp(&mut doc);

    let result = extract_tables(&path, &ExtractOptions::default()).unwrap();
    assert_eq!(result.pages[0], "Fruit,\nName,Qty\nApple,5\n");
}

#[test]
fn test_extract_text_without_grid() {
    let mut ops = text("Hello", 100, 700);
    ops.extend(text("World", 200, 700));
    let mut doc = build_pdf(vec![(ops, 0)]);
    let (_dir, path) = save_to_temp(&mut doc);

    let result = extract_tables(&path, &ExtractOptions::default()).unwrap();
    assert_eq!(result.pages[0], "Hello, World\n");
}

#[test]
fn test_separate_blocks_become_separate_bands() {
    let mut ops = table(&[["Name", "Qty"], ["Apple", "5"]]);
    ops.extend(text("Footer", 100, 100));
    let mut doc = build_pdf(vec![(ops, 0)]);
    let (_dir, path) = save_to_temp(&mut doc);

    let result = extract_tables(&path, &ExtractOptions::default()).unwrap();
    assert_eq!(result.pages[0], "Name,Qty\nApple,5\nFooter\n");
}

#[test]
fn test_pages_joined_with_page_break() {
    let mut doc = build_pdf(vec![
        (table(&[["a", "b"]]), 0),
        (Vec::new(), 0),
        (text("last", 100, 700), 0),
    ]);
    let (_dir, path) = save_to_temp(&mut doc);

    let result = extract_tables(&path, &ExtractOptions::default()).unwrap();
    assert_eq!(result.page_count, 3);
    assert_eq!(result.pages[1], "");
    assert_eq!(
        result.to_text(),
        format!("a,b\n{}{}last\n", PAGE_BREAK, PAGE_BREAK)
    );
}

#[test]
fn test_extract_from_memory() {
    let mut doc = build_pdf(vec![(table(&[["Name", "Qty"]]), 0)]);
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();

    let result = extract_tables_mem(&buffer, &ExtractOptions::default()).unwrap();
    assert_eq!(result.pages, vec!["Name,Qty\n".to_string()]);
}

#[test]
fn test_quarter_turn_page_is_supported() {
    let mut doc = build_pdf(vec![(table(&[["Name", "Qty"]]), 90)]);
    let (_dir, path) = save_to_temp(&mut doc);

    let result = extract_tables(&path, &ExtractOptions::default()).unwrap();
    assert_eq!(result.page_count, 1);
    // Text swaps axes while cells keep their drawn position, so the two
    // labels land in separate grid-free bands at Y 105 and 205
    assert_eq!(result.pages[0], "Name\nQty\n");
}

#[test]
fn test_collect_quarter_turn_page() {
    let mut ops = cell(100, 700, 100, 20);
    ops.extend(text("Name", 105, 706));
    let doc = build_pdf(vec![(ops, 90)]);
    let page = collect_page(&doc, first_page(&doc)).unwrap();

    assert_eq!(page.rectangles, vec![Rectangle::new(100.0, 700.0, 100.0, 20.0)]);
    let chunk = &page.chunks[0];
    assert_eq!(chunk.text, "Name");
    // Descent start (105, 703.5) with X and Y swapped
    assert_eq!(chunk.rect.x, 703.5);
    assert_eq!(chunk.rect.y, 105.0);
    assert_eq!(chunk.rect.width, 10.0);
    assert_eq!(chunk.rect.height, 20.0);
}

// ============================================================================
// Error Tests
// ============================================================================

#[test]
fn test_unsupported_rotation_fails() {
    let mut doc = build_pdf(vec![(table(&[["Name", "Qty"]]), 180)]);
    let (_dir, path) = save_to_temp(&mut doc);

    let result = extract_tables(&path, &ExtractOptions::default());
    assert!(matches!(result, Err(PdfError::UnsupportedRotation(180))));
}

#[test]
fn test_missing_file_fails() {
    let result = extract_tables("/nonexistent/tables.pdf", &ExtractOptions::default());
    assert!(result.is_err());
}

#[test]
fn test_garbage_buffer_fails() {
    let result = extract_tables_mem(b"not a pdf", &ExtractOptions::default());
    assert!(result.is_err());
}
