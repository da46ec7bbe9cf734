//! EPUB parsing utilities (OPF, NCX, container.xml)

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::book::Metadata;
use crate::error::{Error, Result};

/// Parsed OPF package data, with hrefs still relative to the OPF.
#[derive(Debug, Default)]
pub struct OpfData {
    pub metadata: Metadata,
    /// Manifest items in declaration order.
    pub manifest: Vec<OpfItem>,
    pub spine_ids: Vec<String>,
    /// Manifest id of the NCX named by `<spine toc="...">`.
    pub toc_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpfItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
}

/// A navPoint flattened in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavEntry {
    pub title: String,
    pub src: String,
}

/// Parse META-INF/container.xml to find the OPF path.
pub fn parse_container_xml(content: &str) -> Result<String> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name(e.name().as_ref()) == b"rootfile" =>
            {
                if let Some(path) = attribute(&e, b"full-path")
                    && !path.trim().is_empty()
                {
                    return Ok(path.trim().to_string());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::InvalidStructure(format!(
                    "container.xml is not well-formed: {e}"
                )));
            }
            _ => {}
        }
    }

    Err(Error::InvalidStructure(
        "No rootfile found in container.xml".into(),
    ))
}

/// Parse OPF package document.
///
/// A document without a `<manifest>` or `<spine>` is rejected.
pub fn parse_opf(content: &str) -> Result<OpfData> {
    // Text is trimmed per element, not per event, so spaces around entities survive
    let mut reader = Reader::from_str(content);

    let mut opf = OpfData::default();
    let mut saw_manifest = false;
    let mut saw_spine = false;

    let mut in_metadata = false;
    let mut current_element: Option<Vec<u8>> = None;
    let mut buf_text = String::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::InvalidStructure(format!("package document is not well-formed: {e}")))?;

        let is_start = matches!(event, Event::Start(_));

        match event {
            Event::Start(e) | Event::Empty(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                match local {
                    b"metadata" => in_metadata = is_start,
                    b"title" | b"creator" | b"language" | b"identifier" | b"publisher"
                        if in_metadata && is_start =>
                    {
                        current_element = Some(local.to_vec());
                        buf_text.clear();
                    }
                    b"manifest" => saw_manifest = true,
                    b"spine" => {
                        saw_spine = true;
                        opf.toc_id = attribute(&e, b"toc");
                    }
                    b"item" => {
                        if let Some(id) = attribute(&e, b"id").filter(|id| !id.is_empty()) {
                            opf.manifest.push(OpfItem {
                                id,
                                href: attribute(&e, b"href").unwrap_or_default(),
                                media_type: attribute(&e, b"media-type").unwrap_or_default(),
                            });
                        }
                    }
                    b"itemref" => {
                        if let Some(idref) = attribute(&e, b"idref") {
                            opf.spine_ids.push(idref);
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                if current_element.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::CData(e) => {
                if current_element.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if current_element.is_some()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    buf_text.push_str(&resolved);
                }
            }
            Event::End(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                if local == b"metadata" {
                    in_metadata = false;
                }

                if let Some(elem) = current_element.take() {
                    let text = buf_text.trim().to_string();
                    let meta = &mut opf.metadata;
                    match elem.as_slice() {
                        b"title" if meta.title.is_empty() => meta.title = text,
                        b"creator" if !text.is_empty() => meta.authors.push(text),
                        b"language" if meta.language.is_empty() => meta.language = text,
                        b"identifier" if meta.identifier.is_empty() => meta.identifier = text,
                        b"publisher" if meta.publisher.is_none() => meta.publisher = Some(text),
                        _ => {}
                    }
                    buf_text.clear();
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_manifest {
        return Err(Error::InvalidStructure("package document has no manifest".into()));
    }
    if !saw_spine {
        return Err(Error::InvalidStructure("package document has no spine".into()));
    }

    Ok(opf)
}

/// Parse an NCX table of contents into navPoints in document order.
///
/// Nesting is flattened: a parent precedes its children.
pub fn parse_ncx(content: &str) -> Result<Vec<NavEntry>> {
    let mut reader = Reader::from_str(content);

    // One label per open navPoint
    let mut labels: Vec<Option<String>> = Vec::new();
    let mut entries = Vec::new();
    let mut in_text = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::InvalidStructure(format!("NCX is not well-formed: {e}")))?;

        match event {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"navPoint" => labels.push(None),
                b"text" => in_text = true,
                b"content" => push_nav_entry(&e, &labels, &mut entries),
                _ => {}
            },
            Event::Empty(e) => {
                if local_name(e.name().as_ref()) == b"content" {
                    push_nav_entry(&e, &labels, &mut entries);
                }
            }
            Event::Text(e) => {
                if in_text && let Some(label) = labels.last_mut() {
                    label
                        .get_or_insert_with(String::new)
                        .push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if in_text
                    && let Some(label) = labels.last_mut()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    label.get_or_insert_with(String::new).push_str(&resolved);
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"text" => in_text = false,
                b"navPoint" => {
                    labels.pop();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

fn push_nav_entry(e: &BytesStart<'_>, labels: &[Option<String>], entries: &mut Vec<NavEntry>) {
    let Some(Some(label)) = labels.last() else {
        return;
    };
    let title = label.trim();
    if let Some(src) = attribute(e, b"src")
        && !title.is_empty()
    {
        entries.push(NavEntry {
            title: title.to_string(),
            src,
        });
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Value of the attribute `key` with XML entities resolved.
fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| unescape(&String::from_utf8_lossy(&attr.value)))
}

/// Extract local name from namespaced XML name (e.g., "dc:title" -> "title").
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Replace entity references in raw attribute or markup text.
pub(crate) fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        match after.find(';').and_then(|semi| Some((semi, resolve_entity(&after[..semi])?))) {
            Some((semi, resolved)) => {
                out.push_str(&resolved);
                rest = &after[semi + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Resolve XML entity references.
fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        "nbsp" => return Some("\u{a0}".to_string()),
        "mdash" => return Some("\u{2014}".to_string()),
        "ndash" => return Some("\u{2013}".to_string()),
        "hellip" => return Some("\u{2026}".to_string()),
        "lsquo" => return Some("\u{2018}".to_string()),
        "rsquo" => return Some("\u{2019}".to_string()),
        "ldquo" => return Some("\u{201C}".to_string()),
        "rdquo" => return Some("\u{201D}".to_string()),
        _ => {}
    }

    let code = if let Some(hex) = entity.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        entity.strip_prefix('#')?.parse::<u32>().ok()?
    };
    char::from_u32(code).map(|c| c.to_string())
}
