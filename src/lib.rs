//! # folio
//!
//! Convert EPUB packages into paginated PDF documents with a navigable
//! outline.
//!
//! Each spine item is prepared (package media inlined, publisher styling
//! replaced by a fixed print style), paginated by an external render engine
//! and merged into one output document. Every unit that produced pages gets
//! a bookmark pointing at its first page.
//!
//! ## Quick Start
//!
//! ```no_run
//! use folio::{ChromiumEngine, ConvertOptions, Converter, PageSize};
//!
//! let engine = ChromiumEngine::new("/usr/bin/chromium");
//! let converter = Converter::new(engine)
//!     .with_options(ConvertOptions::default().with_page_size(PageSize::Letter));
//!
//! let conversion = converter.convert(std::fs::read("book.epub")?)?;
//! println!("{} pages", conversion.page_count);
//! std::fs::write(conversion.file_name(), &conversion.document)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Partial failure
//!
//! A unit whose markup cannot be read, whose rendering crashes or times out,
//! or whose output cannot be merged is skipped; the reason ends up in
//! [`Conversion::warnings`]. Only an unusable package or a failure to
//! finalize the document fails the conversion.

pub mod book;
pub mod epub;
pub mod error;
pub mod package;
pub mod pdf;
pub mod pipeline;
pub mod prepare;
pub mod render;
pub mod style;
pub(crate) mod util;

pub use book::{ChapterRecord, ContentUnit, ManifestEntry, MediaAsset, Metadata, SpineItem, Structure};
pub use error::{Error, Result};
pub use package::{SourcePackage, resolve_relative_path};
pub use pipeline::{Cancellation, Conversion, ConvertOptions, Converter};
pub use render::{ChromiumEngine, RenderEngine, RenderSession, RenderSurface};
pub use style::{HouseStyle, Margins, PageFormat, PageSize, Typography};
pub use util::sanitize_filename;
