//! Text decoding and naming helpers shared by the pipeline stages.

use std::borrow::Cow;

/// Name used when a title sanitizes to nothing.
const FALLBACK_FILE_STEM: &str = "converted_document";

/// Longest file stem [`sanitize_filename`] produces.
const MAX_FILE_STEM: usize = 50;

/// Decode bytes to a string, handling various encodings.
///
/// 1. UTF-8 (a BOM is stripped)
/// 2. the hint encoding, usually from `<?xml encoding="..."?>`
/// 3. Windows-1252, common in old ebooks
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Decode an XML or XHTML document using its declared encoding as the hint.
pub fn decode_document(bytes: &[u8]) -> Cow<'_, str> {
    decode_text(bytes, extract_xml_encoding(bytes))
}

/// Extract encoding from XML declaration.
///
/// Only the first 100 bytes are inspected.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    let check_len = bytes.len().min(100);
    let prefix = &bytes[..check_len];

    let xml_start = prefix.windows(5).position(|w| w == b"<?xml")?;
    let after_xml = &prefix[xml_start..];

    let enc_pos = after_xml
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let after_enc = &after_xml[enc_pos + 9..];

    let (&quote, rest) = after_enc.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let value_end = rest.iter().position(|&b| b == quote)?;
    std::str::from_utf8(&rest[..value_end]).ok()
}

/// Turn a book title into a safe attachment file stem.
///
/// Every character outside `[A-Za-z0-9]` becomes `_` and the result is cut
/// to 50 characters.
pub fn sanitize_filename(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(MAX_FILE_STEM)
        .collect();

    if stem.chars().all(|c| c == '_') {
        FALLBACK_FILE_STEM.to_string()
    } else {
        stem
    }
}
