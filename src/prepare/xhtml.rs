//! XHTML to HTML-parser-safe markup.
//!
//! An HTML tokenizer reads `<title/>` or `<script src="a.js"/>` as an open
//! tag and swallows the rest of the document as raw text. Self-closing
//! elements other than HTML void elements are written back as explicit
//! open/close pairs.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::Event;

/// Elements that never have content in HTML and must stay self-closing;
/// `<br></br>` would read as two line breaks.
const VOID_ELEMENTS: &[&[u8]] = &[
    b"area", b"base", b"br", b"col", b"embed", b"hr", b"img", b"input", b"link", b"meta",
    b"param", b"source", b"track", b"wbr",
];

/// Expand self-closing non-void elements.
///
/// Returns `None` when the markup is not well-formed XML; the caller then
/// keeps the original text.
pub fn expand_empty_elements(markup: &str) -> Option<String> {
    let mut reader = Reader::from_str(markup);
    let mut writer = Writer::new(Vec::with_capacity(markup.len() + markup.len() / 16));

    loop {
        match reader.read_event().ok()? {
            Event::Eof => break,
            Event::Empty(e) if !is_void(e.local_name().as_ref()) => {
                writer.write_event(Event::Start(e.borrow())).ok()?;
                writer.write_event(Event::End(e.to_end())).ok()?;
            }
            event => writer.write_event(event).ok()?,
        }
    }

    String::from_utf8(writer.into_inner()).ok()
}

fn is_void(name: &[u8]) -> bool {
    VOID_ELEMENTS.iter().any(|void| void.eq_ignore_ascii_case(name))
}
