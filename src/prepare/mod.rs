//! Content unit preparation: media inlining, style stripping, title lookup.

mod media;
mod xhtml;

pub use media::{MediaResolver, encode_data_uri, guess_media_type, is_package_reference};
pub use xhtml::expand_empty_elements;

use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

use log::debug;
use lol_html::html_content::Element;
use lol_html::{HandlerResult, RewriteStrSettings, doc_comments, element, rewrite_str, text};

use crate::book::{ContentUnit, ManifestEntry, Structure};
use crate::epub::unescape;
use crate::error::{Error, Result};
use crate::package::SourcePackage;
use crate::util::decode_document;

/// What the preparer needs to know beyond the unit itself.
#[derive(Debug, Clone, Copy)]
pub struct UnitContext<'a> {
    pub structure: &'a Structure,
    /// 1-based number of the chapter this unit becomes if it renders.
    pub ordinal: usize,
}

/// Prepare one content unit for rendering.
///
/// Package media referenced by `img` and SVG `image` elements is inlined as
/// data URIs; references that do not resolve are left as they are. Linked
/// stylesheets, `<style>` blocks and `style` attributes are removed, as are
/// the head, comments and the doctype. Only the body's content remains.
pub fn prepare(
    package: &mut SourcePackage,
    entry: &ManifestEntry,
    ctx: &UnitContext<'_>,
) -> Result<ContentUnit> {
    let unreadable = |reason: String| Error::UnreadableUnit {
        id: entry.id.clone(),
        reason,
    };

    let bytes = package
        .read_entry(&entry.path)
        .map_err(|e| unreadable(e.to_string()))?;
    let mut source = decode_document(&bytes);
    if is_xhtml(entry) {
        match expand_empty_elements(&source) {
            Some(expanded) => source = Cow::Owned(expanded),
            None => debug!("Unit '{}' is not well-formed XML, reading it as HTML", entry.id),
        }
    }

    let heading = Rc::new(RefCell::new(FirstHeading::default()));
    let mut media = MediaResolver::new(package, ctx.structure, &entry.path);

    let rewritten = {
        let media = &mut media;
        rewrite_str(
            &source,
            RewriteStrSettings {
                element_content_handlers: vec![
                    element!("head", |el| {
                        el.remove();
                        Ok(())
                    }),
                    element!("html, body", |el| {
                        el.remove_and_keep_content();
                        Ok(())
                    }),
                    element!("style", |el| {
                        el.remove();
                        Ok(())
                    }),
                    element!("link[rel]", |el| {
                        if el.get_attribute("rel").is_some_and(|rel| is_stylesheet_rel(&rel)) {
                            el.remove();
                        }
                        Ok(())
                    }),
                    element!("*[style]", |el| {
                        el.remove_attribute("style");
                        Ok(())
                    }),
                    element!("img[src], image", move |el| inline_media(el, media)),
                    element!("h1, h2", {
                        let heading = Rc::clone(&heading);
                        move |_| {
                            heading.borrow_mut().seen += 1;
                            Ok(())
                        }
                    }),
                    text!("h1, h2", {
                        let heading = Rc::clone(&heading);
                        move |chunk| {
                            heading.borrow_mut().push(chunk.as_str());
                            Ok(())
                        }
                    }),
                ],
                document_content_handlers: vec![doc_comments!(|c| {
                    c.remove();
                    Ok(())
                })],
                ..RewriteStrSettings::default()
            },
        )
        .map_err(|e| unreadable(e.to_string()))?
    };
    drop(media);

    let title = ctx
        .structure
        .toc_titles
        .get(&entry.path)
        .cloned()
        .or_else(|| heading.borrow().title())
        .unwrap_or_else(|| format!("Unit {}", ctx.ordinal));

    Ok(ContentUnit {
        id: entry.id.clone(),
        title,
        markup: strip_prolog(&rewritten).trim_end().to_string(),
        path: entry.path.clone(),
    })
}

fn inline_media(el: &mut Element<'_, '_>, media: &mut MediaResolver<'_>) -> HandlerResult {
    let attr = if el.tag_name().eq_ignore_ascii_case("img") {
        "src"
    } else if el.has_attribute("xlink:href") {
        "xlink:href"
    } else {
        "href"
    };

    if let Some(src) = el.get_attribute(attr)
        && let Some(uri) = media.data_uri(&unescape(&src))
    {
        el.set_attribute(attr, &uri)?;
    }
    Ok(())
}

fn is_xhtml(entry: &ManifestEntry) -> bool {
    entry.media_type.eq_ignore_ascii_case("application/xhtml+xml")
        || entry.path.to_ascii_lowercase().ends_with(".xhtml")
}

fn is_stylesheet_rel(rel: &str) -> bool {
    rel.split_ascii_whitespace()
        .any(|token| token.eq_ignore_ascii_case("stylesheet"))
}

/// Drop the XML declaration and doctype left over once the head is gone.
fn strip_prolog(markup: &str) -> &str {
    let mut rest = markup.trim_start();
    loop {
        let is_prolog = rest.starts_with("<?")
            || rest
                .get(..9)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case("<!doctype"));
        match rest.find('>') {
            Some(end) if is_prolog => rest = rest[end + 1..].trim_start(),
            _ => return rest,
        }
    }
}

/// Text of the first `h1`/`h2` in the unit.
#[derive(Default)]
struct FirstHeading {
    seen: usize,
    text: String,
}

impl FirstHeading {
    fn push(&mut self, chunk: &str) {
        if self.seen == 1 {
            self.text.push_str(chunk);
        }
    }

    fn title(&self) -> Option<String> {
        let text = unescape(&self.text);
        let title = text.split_whitespace().collect::<Vec<_>>().join(" ");
        (!title.is_empty()).then_some(title)
    }
}
