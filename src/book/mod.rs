use std::collections::HashMap;

/// Title reported when the package declares none.
pub const DEFAULT_TITLE: &str = "Untitled";

/// Author reported when the package declares none.
pub const DEFAULT_AUTHOR: &str = "Unknown Author";

/// Book metadata (Dublin Core subset used by the output document)
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub title: String,
    pub authors: Vec<String>,
    pub language: String,
    pub identifier: String,
    pub publisher: Option<String>,
}

impl Metadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.authors.push(author.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Declared title, or [`DEFAULT_TITLE`].
    pub fn title(&self) -> &str {
        let title = self.title.trim();
        if title.is_empty() { DEFAULT_TITLE } else { title }
    }

    /// Declared creators joined by ", ", or [`DEFAULT_AUTHOR`].
    pub fn author(&self) -> String {
        let authors: Vec<&str> = self
            .authors
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect();
        if authors.is_empty() {
            DEFAULT_AUTHOR.to_string()
        } else {
            authors.join(", ")
        }
    }
}

/// A manifest item: one file the package descriptor declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub id: String,
    /// Full archive path (href resolved against the package descriptor).
    pub path: String,
    pub media_type: String,
}

/// An item in the reading order (spine)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    pub id: String,
}

/// Everything the structure parse yields for one package.
#[derive(Debug, Clone, Default)]
pub struct Structure {
    pub metadata: Metadata,
    /// Manifest entries keyed by id.
    pub manifest: HashMap<String, ManifestEntry>,
    /// Spine items whose id resolves in the manifest, in reading order.
    pub spine: Vec<SpineItem>,
    /// Navigation titles keyed by content document path.
    pub toc_titles: HashMap<String, String>,
    /// Problems that were tolerated during the parse.
    pub warnings: Vec<String>,
}

impl Structure {
    /// Manifest entry for a spine item.
    pub fn entry(&self, item: &SpineItem) -> Option<&ManifestEntry> {
        self.manifest.get(&item.id)
    }

    /// Manifest entry whose full path equals `path`.
    pub fn entry_by_path(&self, path: &str) -> Option<&ManifestEntry> {
        self.manifest.values().find(|entry| entry.path == path)
    }
}

/// One spine-ordered chunk of markup, ready for rendering.
#[derive(Debug, Clone)]
pub struct ContentUnit {
    pub id: String,
    pub title: String,
    /// Body markup with media inlined and foreign styling removed.
    pub markup: String,
    /// Archive path the markup was read from.
    pub path: String,
}

impl ContentUnit {
    /// True when the unit has neither text nor media worth a page.
    pub fn is_empty(&self) -> bool {
        let lower = self.markup.to_ascii_lowercase();
        if ["<img", "<image", "<svg", "<table", "<hr", "<video"]
            .iter()
            .any(|tag| lower.contains(tag))
        {
            return false;
        }

        let mut in_tag = false;
        for c in self.markup.chars() {
            match c {
                '<' => in_tag = true,
                '>' => in_tag = false,
                c if !in_tag && !c.is_whitespace() => return false,
                _ => {}
            }
        }
        true
    }
}

/// Raw media bytes read from the package.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    pub data: Vec<u8>,
    pub media_type: String,
}

/// Where a content unit landed in the merged document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterRecord {
    pub id: String,
    pub title: String,
    /// Zero-based index into the merged document's pages.
    pub start_page: usize,
}
