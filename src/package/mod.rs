//! Read-only access to the zip container of an EPUB.

mod path;

pub use path::resolve_relative_path;

use std::io::{Cursor, Read};

use log::{debug, warn};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::{Error, Result};

/// Path of the container index every EPUB carries.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

const MIMETYPE_PATH: &str = "mimetype";
const EPUB_MIMETYPE: &[u8] = b"application/epub+zip";

/// An opened source package.
///
/// Entry names are the archive's own case-sensitive paths. The archive is
/// held in memory and released when the package is dropped.
pub struct SourcePackage {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl SourcePackage {
    /// Open a package from its raw bytes.
    ///
    /// Fails with [`Error::InvalidPackage`] when the bytes are not a zip
    /// archive or the container index is missing.
    pub fn open(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(bytes.into()))
            .map_err(|e| Error::InvalidPackage(format!("not a zip archive: {e}")))?;

        let mut package = Self { archive };
        if !package.has_entry(CONTAINER_PATH) {
            return Err(Error::InvalidPackage(format!("missing {CONTAINER_PATH}")));
        }

        match package.read_entry(MIMETYPE_PATH) {
            Ok(mimetype) if mimetype.trim_ascii() == EPUB_MIMETYPE => {}
            Ok(mimetype) => warn!(
                "Unexpected mimetype entry: {}",
                String::from_utf8_lossy(&mimetype).trim()
            ),
            Err(_) => warn!("Package has no mimetype entry"),
        }

        debug!("Opened package with {} entries", package.archive.len());
        Ok(package)
    }

    /// Whether an entry with exactly this name exists.
    pub fn has_entry(&self, path: &str) -> bool {
        self.archive.index_for_name(path).is_some()
    }

    /// All entry names in archive order.
    pub fn entry_names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    /// Read an entry's decompressed bytes.
    pub fn read_entry(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut file = self.archive.by_name(path).map_err(|e| match e {
            ZipError::FileNotFound => Error::EntryNotFound(path.to_string()),
            other => Error::EntryNotFound(format!("{path}: {other}")),
        })?;

        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        Ok(data)
    }
}


#[cfg(test)]
mod tests {
    use super::test_helpers::{CONTAINER_XML, build_zip};
    use super::*;

    #[test]
    fn test_open_rejects_garbage() {
        let err = SourcePackage::open(b"definitely not a zip".to_vec())
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidPackage(_)));
    }

    #[test]
    fn test_open_requires_container() {
        let bytes = build_zip(&[("mimetype", b"application/epub+zip")]);
        let err = SourcePackage::open(bytes).err().unwrap();
        assert!(matches!(err, Error::InvalidPackage(msg) if msg.contains("container.xml")));
    }

    #[test]
    fn test_read_entry() {
        let bytes = build_zip(&[
            ("mimetype", b"application/epub+zip"),
            ("META-INF/container.xml", CONTAINER_XML),
            ("OEBPS/Text/ch1.xhtml", b"<p>hi</p>"),
        ]);
        let mut package = SourcePackage::open(bytes).unwrap();

        assert_eq!(package.read_entry("OEBPS/Text/ch1.xhtml").unwrap(), b"<p>hi</p>");
        assert!(package.has_entry("META-INF/container.xml"));
        assert_eq!(package.entry_names().len(), 3);
    }

    #[test]
    fn test_read_entry_is_case_sensitive() {
        let bytes = build_zip(&[
            ("META-INF/container.xml", CONTAINER_XML),
            ("OEBPS/Cover.jpg", b"jpeg"),
        ]);
        let mut package = SourcePackage::open(bytes).unwrap();

        let err = package.read_entry("OEBPS/cover.jpg").unwrap_err();
        assert!(matches!(err, Error::EntryNotFound(p) if p == "OEBPS/cover.jpg"));
    }
}
