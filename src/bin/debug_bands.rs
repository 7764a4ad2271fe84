//! Debug tool: Print content Y positions and the bands they form
//!
//! Usage: debug_bands <pdf_file> [page_number]
//!
//! Shows, per page, every distinct Y value of text and rectangles, the gap
//! from the previous value, and which gaps split the page into bands.

use clap::Parser;
use lopdf::Document;
use pdf_tables::collect_page;
use pdf_tables::layout::{band_gap_threshold, split_bands};
use std::path::PathBuf;
use std::process;

/// Show how pages are cut into bands
#[derive(Parser, Debug)]
#[command(name = "debug_bands")]
#[command(version, about, long_about = None)]
struct Args {
    /// PDF file to inspect
    pdf: PathBuf,

    /// Only show this page (1-indexed)
    page: Option<u32>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let doc = match Document::load(&args.pdf) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error loading PDF: {}", e);
            process::exit(1);
        }
    };

    for (page_num, page_id) in doc.get_pages() {
        if args.page.is_some_and(|p| p != page_num) {
            continue;
        }

        let page = match collect_page(&doc, page_id) {
            Ok(page) => page,
            Err(e) => {
                eprintln!("Page {}: {}", page_num, e);
                continue;
            }
        };

        println!("=== Page {} ===", page_num);
        println!(
            "{} chunks, {} rectangles, {} lines",
            page.chunks.len(),
            page.rectangles.len(),
            page.lines.len()
        );

        let Some(threshold) = band_gap_threshold(&page.chunks) else {
            println!("(no text)");
            println!();
            continue;
        };
        println!("Band threshold: gap > {:.1}", threshold);

        let mut ys: Vec<f32> = page
            .chunks
            .iter()
            .map(|c| c.rect.y)
            .chain(page.rectangles.iter().map(|r| r.y))
            .collect();
        ys.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        ys.dedup();

        let mut prev_y: Option<f32> = None;
        for y in &ys {
            let texts: Vec<&str> = page
                .chunks
                .iter()
                .filter(|c| c.rect.y == *y)
                .map(|c| c.text.as_str())
                .collect();
            let rects = page.rectangles.iter().filter(|r| r.y == *y).count();

            match prev_y {
                Some(prev) => {
                    let gap = y - prev;
                    let marker = if gap > threshold { " <-- BAND" } else { "" };
                    println!(
                        "  y={:>8.1} gap={:>7.1} rects={:<3} {:?}{}",
                        y, gap, rects, texts, marker
                    );
                }
                None => println!("  y={:>8.1}             rects={:<3} {:?}", y, rects, texts),
            }
            prev_y = Some(*y);
        }

        for (index, band) in split_bands(&page).iter().enumerate() {
            println!(
                "  band {}: [{:.1}, {:.1}] {} chunks, {} rectangles",
                index,
                band.begin,
                band.end,
                band.chunks.len(),
                band.rectangles.len()
            );
        }
        println!();
    }
}
