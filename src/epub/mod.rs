//! Structure parsing: container index, package descriptor, spine and NCX.

mod parser;

pub use parser::{NavEntry, OpfData, OpfItem, parse_container_xml, parse_ncx, parse_opf};
pub(crate) use parser::unescape;

use std::collections::HashMap;

use log::{debug, warn};

use crate::book::{ManifestEntry, SpineItem, Structure};
use crate::error::{Error, Result};
use crate::package::{CONTAINER_PATH, SourcePackage, resolve_relative_path};
use crate::util::decode_document;

/// Parse the package structure: metadata, manifest and reading order.
///
/// Spine references to ids the manifest does not declare are skipped; each
/// one is logged and recorded in [`Structure::warnings`]. An unreadable NCX
/// only costs the navigation titles.
pub fn parse_structure(package: &mut SourcePackage) -> Result<Structure> {
    // 1. Find the OPF path from container.xml
    let container = package
        .read_entry(CONTAINER_PATH)
        .map_err(|e| Error::InvalidStructure(format!("cannot read container index: {e}")))?;
    let opf_path = parse_container_xml(&decode_document(&container))?;

    // 2. Parse the OPF
    let opf_bytes = package.read_entry(&opf_path).map_err(|_| {
        Error::InvalidStructure(format!("package document '{opf_path}' is missing"))
    })?;
    let OpfData {
        metadata,
        manifest: items,
        spine_ids,
        toc_id,
    } = parse_opf(&decode_document(&opf_bytes))?;

    // 3. Manifest with full archive paths
    let mut manifest = HashMap::with_capacity(items.len());
    for item in items {
        let path = resolve_relative_path(&opf_path, &decode_href(&item.href));
        if manifest.contains_key(&item.id) {
            warn!("Duplicate manifest id '{}', keeping the first", item.id);
            continue;
        }
        manifest.insert(
            item.id.clone(),
            ManifestEntry {
                id: item.id,
                path,
                media_type: item.media_type,
            },
        );
    }

    // 4. Spine, tolerating dangling references
    let mut spine = Vec::with_capacity(spine_ids.len());
    let mut warnings = Vec::new();
    for id in spine_ids {
        if manifest.contains_key(&id) {
            spine.push(SpineItem { id });
        } else {
            let message = format!("spine references unknown manifest id '{id}'");
            warn!("Skipping unit: {message}");
            warnings.push(message);
        }
    }

    // 5. Navigation titles from the NCX, if any
    let toc_titles = match toc_id.as_ref().and_then(|id| manifest.get(id)) {
        Some(ncx) => read_toc_titles(package, &ncx.path),
        None => HashMap::new(),
    };

    debug!(
        "Parsed '{}': {} manifest entries, {} spine items, {} navigation titles",
        metadata.title(),
        manifest.len(),
        spine.len(),
        toc_titles.len()
    );

    Ok(Structure {
        metadata,
        manifest,
        spine,
        toc_titles,
        warnings,
    })
}

/// First NCX title for each content document, keyed by full archive path.
fn read_toc_titles(package: &mut SourcePackage, ncx_path: &str) -> HashMap<String, String> {
    let entries = match package
        .read_entry(ncx_path)
        .and_then(|bytes| parse_ncx(&decode_document(&bytes)))
    {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Ignoring table of contents {ncx_path}: {e}");
            return HashMap::new();
        }
    };

    let mut titles = HashMap::new();
    for entry in entries {
        let src = entry.src.split('#').next().unwrap_or_default();
        let path = resolve_relative_path(ncx_path, &decode_href(src));
        titles.entry(path).or_insert(entry.title);
    }
    titles
}

/// Percent-decode an href into an archive path.
pub(crate) fn decode_href(href: &str) -> String {
    percent_encoding::percent_decode_str(href.trim())
        .decode_utf8_lossy()
        .into_owned()
}
