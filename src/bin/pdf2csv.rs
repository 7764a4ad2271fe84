//! CLI tool for extracting tables from a PDF as delimited text
//!
//! Writes one line per table row, columns joined by the delimiter, and a
//! page-break marker between pages.

use clap::Parser;
use pdf_tables::{extract_tables, ExtractOptions};
use std::fs;
use std::path::PathBuf;
use std::process;

/// Extract tabular data from a PDF document
#[derive(Parser, Debug)]
#[command(name = "pdf2csv")]
#[command(version, about, long_about = None)]
struct Args {
    /// PDF file to parse
    #[arg(short = 'f', long)]
    input_file: PathBuf,

    /// Column delimiter
    #[arg(short, long, default_value = ",")]
    delimiter: String,

    /// Output file, replaced if it exists (stdout when omitted)
    #[arg(short, long)]
    output_file: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let is_pdf = args
        .input_file
        .extension()
        .map(|ext| ext == "pdf")
        .unwrap_or(false);
    if !is_pdf {
        eprintln!("Only pdf files supported: {}", args.input_file.display());
        process::exit(1);
    }

    let options = ExtractOptions {
        delimiter: args.delimiter,
    };

    let result = match extract_tables(&args.input_file, &options) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    log::info!(
        "{}: {} pages in {}ms",
        args.input_file.display(),
        result.page_count,
        result.processing_time_ms
    );

    let text = result.to_text();
    match &args.output_file {
        Some(path) => {
            if let Err(e) = fs::write(path, &text) {
                eprintln!("Failed to write {}: {}", path.display(), e);
                process::exit(1);
            }
        }
        None => print!("{}", text),
    }
}
