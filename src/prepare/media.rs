//! Media lookup and data URI encoding for one content unit.

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::{debug, warn};

use crate::book::{MediaAsset, Structure};
use crate::epub::decode_href;
use crate::package::{SourcePackage, resolve_relative_path};

const OCTET_STREAM: &str = "application/octet-stream";

/// Whether `src` points inside the package, i.e. is neither a network
/// reference, inline data nor another URL scheme.
pub fn is_package_reference(src: &str) -> bool {
    let src = src.trim();
    if src.is_empty() || src.starts_with('#') || src.starts_with("//") {
        return false;
    }

    // A scheme is letters/digits/+-. before the first ':' and ahead of any '/'
    match src.find(':') {
        Some(colon) => {
            let scheme = &src[..colon];
            let is_scheme = !scheme.is_empty()
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c));
            !is_scheme
        }
        None => true,
    }
}

/// Resolves media references of one content unit and caches what it reads.
///
/// Created per unit and dropped with it, so nothing read for one unit is
/// visible to the next.
pub struct MediaResolver<'a> {
    package: &'a mut SourcePackage,
    structure: &'a Structure,
    unit_path: &'a str,
    cache: HashMap<String, MediaAsset>,
    inlined: usize,
    missing: usize,
}

impl<'a> MediaResolver<'a> {
    pub fn new(package: &'a mut SourcePackage, structure: &'a Structure, unit_path: &'a str) -> Self {
        Self {
            package,
            structure,
            unit_path,
            cache: HashMap::new(),
            inlined: 0,
            missing: 0,
        }
    }

    /// The data URI replacing `src`, or `None` when `src` is left alone.
    ///
    /// Unresolvable references are logged and left untouched.
    pub fn data_uri(&mut self, src: &str) -> Option<String> {
        if !is_package_reference(src) {
            return None;
        }

        let target = src.split(['#', '?']).next().unwrap_or_default();
        let path = resolve_relative_path(self.unit_path, &decode_href(target));

        if !self.cache.contains_key(&path) {
            let data = match self.package.read_entry(&path) {
                Ok(data) => data,
                Err(e) => {
                    warn!("{}: cannot inline '{src}': {e}", self.unit_path);
                    self.missing += 1;
                    return None;
                }
            };
            let declared = self.structure.entry_by_path(&path).map(|e| e.media_type.as_str());
            let media_type = guess_media_type(&path, &data, declared);
            self.cache.insert(path.clone(), MediaAsset { data, media_type });
        }

        let asset = self.cache.get(&path)?;
        self.inlined += 1;
        Some(encode_data_uri(asset))
    }
}

impl Drop for MediaResolver<'_> {
    fn drop(&mut self) {
        if self.inlined + self.missing > 0 {
            debug!(
                "{}: inlined {} media references ({} distinct), {} unresolved",
                self.unit_path,
                self.inlined,
                self.cache.len(),
                self.missing
            );
        }
    }
}

pub fn encode_data_uri(asset: &MediaAsset) -> String {
    format!("data:{};base64,{}", asset.media_type, STANDARD.encode(&asset.data))
}

/// Best-effort media type: the manifest declaration, then the extension,
/// then magic bytes.
pub fn guess_media_type(path: &str, data: &[u8], declared: Option<&str>) -> String {
    if let Some(declared) = declared.map(str::trim).filter(|t| !t.is_empty()) {
        return declared.to_string();
    }
    if let Some(guess) = mime_guess::from_path(path).first_raw() {
        return guess.to_string();
    }
    sniff_media_type(data).unwrap_or(OCTET_STREAM).to_string()
}

fn sniff_media_type(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else if data.starts_with(b"GIF8") {
        Some("image/gif")
    } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else if data.starts_with(b"<svg") || (data.starts_with(b"<?xml") && contains(data, b"<svg")) {
        Some("image/svg+xml")
    } else {
        None
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
