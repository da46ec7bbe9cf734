//! The conversion pipeline: package in, merged and outlined PDF out.
//!
//! Units are converted strictly in spine order. A unit that cannot be read,
//! rendered or merged is skipped with a warning; only failures to open or
//! parse the package, and failures to finalize the output, abort the run.

mod options;

pub use options::{ConvertOptions, DEFAULT_CREATOR, DEFAULT_RENDER_TIMEOUT};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{info, warn};

use crate::book::{ChapterRecord, ManifestEntry};
use crate::epub::parse_structure;
use crate::error::{Error, Result};
use crate::package::SourcePackage;
use crate::pdf::{DocumentInfo, Outline, OutputDocument};
use crate::prepare::{UnitContext, prepare};
use crate::render::{RenderClient, RenderEngine};
use crate::util::sanitize_filename;

/// A finished conversion.
#[derive(Debug, Clone)]
pub struct Conversion {
    /// The serialized PDF.
    pub document: Vec<u8>,
    pub page_count: usize,
    pub title: String,
    pub author: String,
    /// One record per unit that produced pages, in spine order.
    pub chapters: Vec<ChapterRecord>,
    /// Everything that was skipped or tolerated along the way.
    pub warnings: Vec<String>,
}

impl Conversion {
    /// Suggested file name for the document, derived from the title.
    pub fn file_name(&self) -> String {
        format!("{}.pdf", sanitize_filename(&self.title))
    }
}

/// Cooperative cancellation, checked between content units.
///
/// Clones share one flag.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    cancelled: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Converts packages with one render engine.
///
/// Each call owns its package, render session and output document, so a
/// converter can serve independent requests from several threads when the
/// engine allows it.
///
/// # Example
///
/// ```no_run
/// use folio::{ChromiumEngine, Converter};
///
/// let engine = ChromiumEngine::discover().expect("no browser on PATH");
/// let bytes = std::fs::read("book.epub")?;
/// let conversion = Converter::new(engine).convert(bytes)?;
/// std::fs::write(conversion.file_name(), &conversion.document)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Converter<E: RenderEngine> {
    engine: E,
    options: ConvertOptions,
}

impl<E: RenderEngine> Converter<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            options: ConvertOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ConvertOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Convert a complete package.
    pub fn convert(&self, bytes: impl Into<Vec<u8>>) -> Result<Conversion> {
        self.convert_with_cancel(bytes, &Cancellation::new())
    }

    /// Convert a complete package, giving up with [`Error::Cancelled`] at the
    /// next unit boundary once `cancel` fires.
    pub fn convert_with_cancel(&self, bytes: impl Into<Vec<u8>>, cancel: &Cancellation) -> Result<Conversion> {
        let started = Instant::now();
        cancel.check()?;

        let mut package = SourcePackage::open(bytes)?;
        let structure = parse_structure(&mut package)?;
        let metadata = &structure.metadata;
        let title = metadata.title().to_string();
        let author = metadata.author();
        info!(
            "Converting '{title}' by {author}: {} content units",
            structure.spine.len()
        );

        let mut client = RenderClient::new(
            &self.engine,
            self.options.style,
            metadata.language.clone(),
            self.options.render_timeout,
        );
        let mut output = OutputDocument::new();
        let mut chapters: Vec<ChapterRecord> = Vec::new();
        let mut warnings = structure.warnings.clone();

        for item in &structure.spine {
            cancel.check()?;
            let Some(entry) = structure.entry(item) else {
                continue;
            };

            let ctx = UnitContext {
                structure: &structure,
                ordinal: chapters.len() + 1,
            };
            match convert_unit(&mut package, entry, &ctx, &mut client, &mut output) {
                Ok(UnitOutcome::Chapter(chapter)) => chapters.push(chapter),
                Ok(UnitOutcome::Empty) => {
                    warn!("Skipping unit '{}': no content", entry.id);
                    warnings.push(format!("skipped unit '{}': no content", entry.id));
                }
                Ok(UnitOutcome::NoPages) => {
                    warn!("Skipping unit '{}': rendered no pages", entry.id);
                    warnings.push(format!("skipped unit '{}': rendered no pages", entry.id));
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Skipping unit '{}': {e}", entry.id);
                    warnings.push(format!("skipped unit '{}': {e}", entry.id));
                }
                Err(e) => return Err(e),
            }
        }
        cancel.check()?;
        drop(client);

        let outline = Outline::build(&chapters, output.page_ids());
        output.set_outline(&outline)?;
        let page_count = output.page_count();
        let document = output.finish(&DocumentInfo {
            title: title.clone(),
            author: author.clone(),
            language: metadata.language.clone(),
            creator: self.options.creator.clone(),
        })?;

        info!(
            "Converted '{title}': {} chapters, {page_count} pages, {} warnings in {:?}",
            chapters.len(),
            warnings.len(),
            started.elapsed()
        );

        Ok(Conversion {
            document,
            page_count,
            title,
            author,
            chapters,
            warnings,
        })
    }
}

/// What became of one content unit.
enum UnitOutcome {
    Chapter(ChapterRecord),
    /// Nothing to show after preparation; never rendered.
    Empty,
    /// Rendered, but the engine produced zero pages.
    NoPages,
}

/// Prepare, render and merge one unit.
fn convert_unit<E: RenderEngine + ?Sized>(
    package: &mut SourcePackage,
    entry: &ManifestEntry,
    ctx: &UnitContext<'_>,
    client: &mut RenderClient<'_, E>,
    output: &mut OutputDocument,
) -> Result<UnitOutcome> {
    let unit = prepare(package, entry, ctx)?;
    if unit.is_empty() {
        return Ok(UnitOutcome::Empty);
    }

    let fragment = client.render(&unit)?;
    let start_page = output.page_count();
    if output.append(fragment)? == 0 {
        return Ok(UnitOutcome::NoPages);
    }

    Ok(UnitOutcome::Chapter(ChapterRecord {
        id: unit.id,
        title: unit.title,
        start_page,
    }))
}
