//! Shared fixtures: in-memory EPUB packages and a render engine that builds
//! PDFs with lopdf instead of launching a browser.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use folio::{Cancellation, PageFormat, RenderEngine, RenderSession, RenderSurface, Result};

/// Text that makes [`StubEngine`] report a crash for the unit containing it.
pub const CRASH_MARKER: &str = "stub:crash";

/// Text that makes [`StubEngine`] report a timeout for the unit containing it.
pub const HANG_MARKER: &str = "stub:hang";

// ============================================================================
// EPUB Builder
// ============================================================================

struct Chapter {
    id: String,
    href: String,
    body: Vec<u8>,
}

/// Builds an EPUB 2 package in memory.
#[derive(Default)]
pub struct EpubBuilder {
    title: Option<String>,
    authors: Vec<String>,
    language: Option<String>,
    chapters: Vec<Chapter>,
    spine: Vec<String>,
    files: Vec<(String, String, Vec<u8>)>,
    nav: Vec<(String, String)>,
    skip_container: bool,
    skip_opf: bool,
}

impl EpubBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn author(mut self, author: &str) -> Self {
        self.authors.push(author.to_string());
        self
    }

    pub fn language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    /// A complete XHTML document in the manifest and the spine.
    pub fn chapter(mut self, id: &str, href: &str, body: &str) -> Self {
        let xhtml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>{id}</title><link rel="stylesheet" href="style.css"/></head>
<body>
{body}
</body>
</html>"#
        );
        self.chapters.push(Chapter {
            id: id.to_string(),
            href: href.to_string(),
            body: xhtml.into_bytes(),
        });
        self.spine.push(id.to_string());
        self
    }

    /// A unit whose whole XHTML document is given verbatim.
    pub fn document(mut self, id: &str, href: &str, xhtml: &str) -> Self {
        self.chapters.push(Chapter {
            id: id.to_string(),
            href: href.to_string(),
            body: xhtml.as_bytes().to_vec(),
        });
        self.spine.push(id.to_string());
        self
    }

    /// A spine reference with no manifest entry.
    pub fn dangling_spine_ref(mut self, id: &str) -> Self {
        self.spine.push(id.to_string());
        self
    }

    /// Any other manifest file, relative to the package descriptor.
    pub fn file(mut self, href: &str, media_type: &str, data: &[u8]) -> Self {
        self.files
            .push((href.to_string(), media_type.to_string(), data.to_vec()));
        self
    }

    /// An NCX navigation point.
    pub fn nav(mut self, title: &str, src: &str) -> Self {
        self.nav.push((title.to_string(), src.to_string()));
        self
    }

    pub fn without_container(mut self) -> Self {
        self.skip_container = true;
        self
    }

    pub fn without_package_document(mut self) -> Self {
        self.skip_opf = true;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let deflated =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file("mimetype", stored).unwrap();
        zip.write_all(b"application/epub+zip").unwrap();

        if !self.skip_container {
            zip.start_file("META-INF/container.xml", deflated).unwrap();
            zip.write_all(
                br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#,
            )
            .unwrap();
        }

        if !self.skip_opf {
            zip.start_file("OEBPS/content.opf", deflated).unwrap();
            zip.write_all(self.opf().as_bytes()).unwrap();
        }

        if !self.nav.is_empty() {
            zip.start_file("OEBPS/toc.ncx", deflated).unwrap();
            zip.write_all(self.ncx().as_bytes()).unwrap();
        }

        for chapter in &self.chapters {
            zip.start_file(format!("OEBPS/{}", chapter.href), deflated)
                .unwrap();
            zip.write_all(&chapter.body).unwrap();
        }
        for (href, _, data) in &self.files {
            zip.start_file(format!("OEBPS/{href}"), deflated).unwrap();
            zip.write_all(data).unwrap();
        }

        zip.finish().unwrap().into_inner()
    }

    fn opf(&self) -> String {
        let mut metadata = String::new();
        if let Some(title) = &self.title {
            metadata.push_str(&format!("    <dc:title>{title}</dc:title>\n"));
        }
        for author in &self.authors {
            metadata.push_str(&format!("    <dc:creator>{author}</dc:creator>\n"));
        }
        if let Some(language) = &self.language {
            metadata.push_str(&format!("    <dc:language>{language}</dc:language>\n"));
        }

        let mut manifest = String::new();
        for chapter in &self.chapters {
            manifest.push_str(&format!(
                "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
                chapter.id, chapter.href
            ));
        }
        for (i, (href, media_type, _)) in self.files.iter().enumerate() {
            manifest.push_str(&format!(
                "    <item id=\"file{i}\" href=\"{href}\" media-type=\"{media_type}\"/>\n"
            ));
        }
        let toc = if self.nav.is_empty() {
            ""
        } else {
            manifest.push_str(
                "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n",
            );
            " toc=\"ncx\""
        };

        let spine: String = self
            .spine
            .iter()
            .map(|id| format!("    <itemref idref=\"{id}\"/>\n"))
            .collect();

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
{metadata}  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine{toc}>
{spine}  </spine>
</package>"#
        )
    }

    fn ncx(&self) -> String {
        let points: String = self
            .nav
            .iter()
            .enumerate()
            .map(|(i, (title, src))| {
                format!(
                    "    <navPoint id=\"n{i}\" playOrder=\"{}\"><navLabel><text>{title}</text></navLabel><content src=\"{src}\"/></navPoint>\n",
                    i + 1
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <navMap>
{points}  </navMap>
</ncx>"#
        )
    }
}

// ============================================================================
// Stub Render Engine
// ============================================================================

/// Paginates one page per `<p>` element (at least one page).
///
/// Every document it is asked to render is kept for inspection.
#[derive(Default)]
pub struct StubEngine {
    pub launches: AtomicUsize,
    pub documents: Arc<Mutex<Vec<String>>>,
    /// Sessions launched and not yet dropped.
    pub live_sessions: Arc<AtomicUsize>,
    /// Fired after every successful render.
    pub cancel_after_render: Option<Cancellation>,
}

impl StubEngine {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn live_sessions(&self) -> usize {
        self.live_sessions.load(Ordering::SeqCst)
    }

    pub fn documents(&self) -> Vec<String> {
        self.documents.lock().unwrap().clone()
    }
}

impl RenderEngine for StubEngine {
    fn name(&self) -> &str {
        "stub"
    }

    fn launch(&self) -> Result<Box<dyn RenderSession>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        self.live_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubSession {
            documents: Arc::clone(&self.documents),
            live: Arc::clone(&self.live_sessions),
            cancel: self.cancel_after_render.clone(),
        }))
    }
}

struct StubSession {
    documents: Arc<Mutex<Vec<String>>>,
    live: Arc<AtomicUsize>,
    cancel: Option<Cancellation>,
}

impl RenderSession for StubSession {
    fn open_surface(&mut self) -> Result<Box<dyn RenderSurface + '_>> {
        Ok(Box::new(StubSurface {
            documents: &self.documents,
            cancel: self.cancel.as_ref(),
        }))
    }
}

impl Drop for StubSession {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

struct StubSurface<'s> {
    documents: &'s Mutex<Vec<String>>,
    cancel: Option<&'s Cancellation>,
}

impl RenderSurface for StubSurface<'_> {
    fn render(&mut self, document: &str, format: &PageFormat, timeout: Duration) -> Result<Vec<u8>> {
        self.documents.lock().unwrap().push(document.to_string());
        if document.contains(CRASH_MARKER) {
            return Err(folio::Error::RenderCrash("stub engine crashed".into()));
        }
        if document.contains(HANG_MARKER) {
            return Err(folio::Error::RenderTimeout(timeout));
        }
        let (width, height) = format.size.dimensions_pt();
        let pdf = paginated_pdf(paragraph_count(document).max(1), width, height);
        if let Some(cancel) = self.cancel {
            cancel.cancel();
        }
        Ok(pdf)
    }
}

/// `<p>` start tags, with or without attributes.
pub fn paragraph_count(document: &str) -> usize {
    document.matches("<p>").count() + document.matches("<p ").count()
}

/// A PDF with `pages` pages of the given size, each labelled with its number.
pub fn paginated_pdf(pages: usize, width: f32, height: f32) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for i in 1..=pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("Page {i}"))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
        }
        .into(),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}
