//! Table reconstruction from PDF drawing primitives using lopdf
//!
//! This module provides:
//! - Collection of text placements and rectangles from page content streams
//! - Grid inference from cell rectangles, with column and row spans
//! - Delimiter-separated output, one line per table row

pub mod assign;
pub mod collector;
pub mod extractor;
pub mod geometry;
pub mod grid;
pub mod layout;
pub mod rows;
pub mod serialize;

pub use collector::{CollectedPage, PageCollector, PageInfo, RenderListener, Rotation};
pub use extractor::{collect_page, extract_page};
pub use geometry::{CellTemplate, Line, Point, Rectangle, TextChunk};
pub use layout::render_page;

use lopdf::{Document, ObjectId};
use rayon::prelude::*;
use std::path::Path;

/// Marker written before every page except the first
pub const PAGE_BREAK: &str = "[---PageBreak---]\n";

/// Options for table extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Column separator
    pub delimiter: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
        }
    }
}

/// Result of extracting every page of a document
#[derive(Debug)]
pub struct TableExtractResult {
    /// Delimited text per page, in page order
    pub pages: Vec<String>,
    /// Page count
    pub page_count: u32,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

impl TableExtractResult {
    /// All pages joined with [`PAGE_BREAK`]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (index, page) in self.pages.iter().enumerate() {
            if index > 0 {
                out.push_str(PAGE_BREAK);
            }
            out.push_str(page);
        }
        out
    }
}

/// Extract tables from every page of a PDF file
pub fn extract_tables<P: AsRef<Path>>(
    path: P,
    options: &ExtractOptions,
) -> Result<TableExtractResult, PdfError> {
    let start = std::time::Instant::now();
    let doc = Document::load(path)?;
    extract_tables_from_doc(&doc, options, start)
}

/// Extract tables from a PDF held in memory
pub fn extract_tables_mem(
    buffer: &[u8],
    options: &ExtractOptions,
) -> Result<TableExtractResult, PdfError> {
    let start = std::time::Instant::now();
    let doc = Document::load_mem(buffer)?;
    extract_tables_from_doc(&doc, options, start)
}

fn extract_tables_from_doc(
    doc: &Document,
    options: &ExtractOptions,
    start: std::time::Instant,
) -> Result<TableExtractResult, PdfError> {
    let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
    log::debug!("extracting tables from {} pages", pages.len());

    // Every page gets its own collector, so pages run independently
    let texts = pages
        .par_iter()
        .map(|(page_num, page_id)| {
            extract_page(doc, *page_id, &options.delimiter).map_err(|e| {
                log::warn!("page {}: {}", page_num, e);
                e
            })
        })
        .collect::<Result<Vec<String>, PdfError>>()?;

    Ok(TableExtractResult {
        page_count: texts.len() as u32,
        pages: texts,
        processing_time_ms: start.elapsed().as_millis() as u64,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Invalid PDF structure")]
    InvalidStructure,
    #[error("Unsupported page rotation: {0} degrees")]
    UnsupportedRotation(i64),
}

impl From<lopdf::Error> for PdfError {
    fn from(e: lopdf::Error) -> Self {
        PdfError::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delimiter() {
        assert_eq!(ExtractOptions::default().delimiter, ",");
    }

    #[test]
    fn test_page_break_between_pages_only() {
        let result = TableExtractResult {
            pages: vec!["a,b\n".to_string(), String::new(), "c\n".to_string()],
            page_count: 3,
            processing_time_ms: 0,
        };
        assert_eq!(
            result.to_text(),
            "a,b\n[---PageBreak---]\n[---PageBreak---]\nc\n"
        );
    }
}
