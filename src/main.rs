//! folio - EPUB to PDF converter

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Serialize;

use folio::epub::parse_structure;
use folio::{ChromiumEngine, Conversion, ConvertOptions, Converter, PageSize, SourcePackage};

#[derive(Parser)]
#[command(name = "folio")]
#[command(version, about = "Convert EPUB books to paginated PDF", long_about = None)]
#[command(after_help = "EXAMPLES:
    folio book.epub               Convert to <title>.pdf next to the input
    folio book.epub out.pdf       Convert to out.pdf
    folio -i book.epub            Show book metadata
    folio --json book.epub        Print a JSON summary of the conversion")]
struct Cli {
    /// Input file (EPUB)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file (PDF); defaults to the sanitized title beside the input
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Show book metadata without converting
    #[arg(short, long)]
    info: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Suppress output messages
    #[arg(short, long)]
    quiet: bool,

    /// Chromium or Chrome executable used for rendering
    #[arg(long, value_name = "PATH", env = "FOLIO_CHROME")]
    chrome: Option<PathBuf>,

    /// Seconds a single chapter may take to render
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    timeout: u64,

    /// Paper size
    #[arg(long, value_enum, default_value_t = PageSizeArg::A4)]
    page_size: PageSizeArg,

    /// Body font size in points
    #[arg(long, value_name = "PT", default_value_t = 11.0)]
    font_size: f32,

    /// Body line height, relative to the font size
    #[arg(long, default_value_t = 1.6)]
    line_height: f32,
}

#[derive(Clone, Copy, ValueEnum)]
enum PageSizeArg {
    A4,
    Letter,
}

impl From<PageSizeArg> for PageSize {
    fn from(arg: PageSizeArg) -> Self {
        match arg {
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::Letter => PageSize::Letter,
        }
    }
}

#[derive(Serialize)]
struct InfoSummary {
    file: String,
    title: String,
    author: String,
    language: String,
    identifier: String,
    publisher: Option<String>,
    units: usize,
    navigation_titles: usize,
    warnings: Vec<String>,
}

#[derive(Serialize)]
struct ConversionSummary<'a> {
    output: String,
    title: &'a str,
    author: &'a str,
    page_count: usize,
    chapters: Vec<ChapterSummary<'a>>,
    warnings: &'a [String],
}

#[derive(Serialize)]
struct ChapterSummary<'a> {
    title: &'a str,
    start_page: usize,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.quiet || cli.json);

    let result = if cli.info {
        show_info(&cli)
    } else {
        convert(&cli)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn read_input(path: &Path) -> Result<Vec<u8>, String> {
    let is_epub = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("epub"));
    if !is_epub {
        return Err(format!("{}: only .epub files are supported", path.display()));
    }
    fs::read(path).map_err(|e| format!("{}: {e}", path.display()))
}

fn show_info(cli: &Cli) -> Result<(), String> {
    let bytes = read_input(&cli.input)?;
    let mut package = SourcePackage::open(bytes).map_err(|e| e.to_string())?;
    let structure = parse_structure(&mut package).map_err(|e| e.to_string())?;
    let meta = &structure.metadata;

    let summary = InfoSummary {
        file: cli.input.display().to_string(),
        title: meta.title().to_string(),
        author: meta.author(),
        language: meta.language.clone(),
        identifier: meta.identifier.clone(),
        publisher: meta.publisher.clone(),
        units: structure.spine.len(),
        navigation_titles: structure.toc_titles.len(),
        warnings: structure.warnings.clone(),
    };

    if cli.json {
        return print_json(&summary);
    }

    println!("File: {}", summary.file);
    println!("Title: {}", summary.title);
    println!("Author: {}", summary.author);
    if !summary.language.is_empty() {
        println!("Language: {}", summary.language);
    }
    if !summary.identifier.is_empty() {
        println!("Identifier: {}", summary.identifier);
    }
    if let Some(ref publisher) = summary.publisher {
        println!("Publisher: {publisher}");
    }
    println!("Content units: {}", summary.units);
    println!("Navigation titles: {}", summary.navigation_titles);
    for warning in &summary.warnings {
        println!("Warning: {warning}");
    }

    Ok(())
}

fn convert(cli: &Cli) -> Result<(), String> {
    let bytes = read_input(&cli.input)?;

    let engine = match &cli.chrome {
        Some(path) => ChromiumEngine::new(path),
        None => ChromiumEngine::discover()
            .ok_or("no Chromium or Chrome found on PATH; pass --chrome or set FOLIO_CHROME")?,
    };
    let options = ConvertOptions::default()
        .with_page_size(cli.page_size.into())
        .with_font_size(cli.font_size)
        .with_line_height(cli.line_height)
        .with_render_timeout(Duration::from_secs(cli.timeout));

    let conversion = Converter::new(engine)
        .with_options(options)
        .convert(bytes)
        .map_err(|e| e.to_string())?;

    let output = match &cli.output {
        Some(path) => path.clone(),
        None => cli.input.with_file_name(conversion.file_name()),
    };
    write_atomically(&output, &conversion.document)?;

    if cli.json {
        return print_json(&summarize(&conversion, &output));
    }
    if !cli.quiet {
        println!(
            "Wrote {} ({} pages, {} chapters)",
            output.display(),
            conversion.page_count,
            conversion.chapters.len()
        );
        for warning in &conversion.warnings {
            println!("Warning: {warning}");
        }
    }

    Ok(())
}

/// Write through a temporary file in the target directory so a failed write
/// never leaves a partial document behind.
fn write_atomically(path: &Path, data: &[u8]) -> Result<(), String> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let describe = |e: std::io::Error| format!("{}: {e}", path.display());

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(describe)?;
    file.write_all(data).map_err(describe)?;
    file.as_file().sync_all().map_err(describe)?;
    file.persist(path).map_err(|e| describe(e.error))?;
    Ok(())
}

fn summarize<'a>(conversion: &'a Conversion, output: &Path) -> ConversionSummary<'a> {
    ConversionSummary {
        output: output.display().to_string(),
        title: &conversion.title,
        author: &conversion.author,
        page_count: conversion.page_count,
        chapters: conversion
            .chapters
            .iter()
            .map(|c| ChapterSummary {
                title: &c.title,
                start_page: c.start_page,
            })
            .collect(),
        warnings: &conversion.warnings,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}
