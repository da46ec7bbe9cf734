//! The merged output document: page tree, fragment merging and outline.
//!
//! Everything here edits the PDF object graph directly with lopdf:
//! - [`OutputDocument::append`] deep-copies a fragment's pages
//! - [`Outline`] is the typed bookmark list, serialized by
//!   [`OutputDocument::set_outline`]
//! - [`OutputDocument::finish`] writes the document info and serializes

mod merge;
mod outline;

pub use outline::{Outline, OutlineEntry};

use lopdf::{Document, Object, ObjectId, StringFormat, dictionary};

use crate::error::{Error, Result};

/// One rendered content unit: a standalone paginated document.
///
/// Consumed by [`OutputDocument::append`].
pub struct RenderedFragment {
    document: Document,
    page_ids: Vec<ObjectId>,
}

impl RenderedFragment {
    /// Decode the bytes a render engine produced.
    pub fn from_pdf(bytes: &[u8]) -> Result<Self> {
        let document = Document::load_mem(bytes)?;
        // get_pages is keyed by 1-based page number, so values are in page order
        let page_ids = document.get_pages().into_values().collect();
        Ok(Self { document, page_ids })
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }
}

/// Document-level metadata written on finish.
#[derive(Debug, Clone, Default)]
pub struct DocumentInfo {
    pub title: String,
    pub author: String,
    pub language: String,
    pub creator: String,
}

/// The document all fragments are merged into.
pub struct OutputDocument {
    doc: Document,
    catalog_id: ObjectId,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
}

impl OutputDocument {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        Self {
            doc,
            catalog_id,
            pages_id,
            page_ids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Page object ids in page order.
    pub fn page_ids(&self) -> &[ObjectId] {
        &self.page_ids
    }

    /// Write the document info and serialize.
    ///
    /// The document is consumed; on error nothing is returned.
    pub fn finish(mut self, info: &DocumentInfo) -> Result<Vec<u8>> {
        if self.page_ids.is_empty() {
            return Err(Error::Output("no content unit produced any pages".into()));
        }

        let info_id = self.doc.add_object(dictionary! {
            "Title" => text_string(&info.title),
            "Author" => text_string(&info.author),
            "Creator" => text_string(&info.creator),
            "Producer" => text_string(concat!("folio ", env!("CARGO_PKG_VERSION"))),
        });
        self.doc.trailer.set("Info", info_id);

        if !info.language.trim().is_empty() {
            self.catalog_mut()?
                .set("Lang", text_string(info.language.trim()));
        }

        let mut bytes = Vec::new();
        self.doc
            .save_to(&mut bytes)
            .map_err(|e| Error::Output(e.to_string()))?;
        Ok(bytes)
    }

    fn catalog_mut(&mut self) -> Result<&mut lopdf::Dictionary> {
        Ok(self.doc.get_object_mut(self.catalog_id)?.as_dict_mut()?)
    }
}

impl Default for OutputDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode `text` as a PDF text string: literal when ASCII, otherwise
/// UTF-16BE with a byte order mark.
pub fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }

    let mut bytes = Vec::with_capacity(2 + text.len() * 2);
    bytes.extend_from_slice(&[0xFE, 0xFF]);
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, StringFormat, dictionary};

    /// A PDF with `num_pages` pages, each showing "`label` N".
    ///
    /// MediaBox and Resources live on the page tree node, so copies must
    /// resolve inherited attributes.
    pub fn pdf_with_pages(num_pages: usize, label: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = vec![];
        for i in 1..=num_pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![100.into(), 700.into()]),
                    Operation::new(
                        "Tj",
                        vec![Object::String(
                            format!("{label} {i}").into_bytes(),
                            StringFormat::Literal,
                        )],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => num_pages as i64,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Resources" => resources_id,
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
}

#[cfg(test)]
mod tests {
    use super::test_helpers::pdf_with_pages;
    use super::*;

    #[test]
    fn test_fragment_page_count() {
        let fragment = RenderedFragment::from_pdf(&pdf_with_pages(3, "Page")).unwrap();
        assert_eq!(fragment.page_count(), 3);
    }

    #[test]
    fn test_fragment_rejects_garbage() {
        assert!(matches!(
            RenderedFragment::from_pdf(b"not a pdf"),
            Err(Error::Pdf(_))
        ));
    }

    #[test]
    fn test_text_string() {
        assert_eq!(text_string("Plain"), Object::string_literal("Plain"));
        assert_eq!(
            text_string("é"),
            Object::String(vec![0xFE, 0xFF, 0x00, 0xE9], StringFormat::Hexadecimal)
        );
    }

    #[test]
    fn test_finish_writes_info() {
        let mut output = OutputDocument::new();
        let fragment = RenderedFragment::from_pdf(&pdf_with_pages(2, "Page")).unwrap();
        output.append(fragment).unwrap();

        let bytes = output
            .finish(&DocumentInfo {
                title: "Agnes Grey".into(),
                author: "Anne Brontë".into(),
                language: "en".into(),
                creator: "folio".into(),
            })
            .unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
        let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_object(info_id).unwrap().as_dict().unwrap();
        assert_eq!(info.get(b"Title").unwrap(), &Object::string_literal("Agnes Grey"));
        assert_eq!(info.get(b"Author").unwrap(), &text_string("Anne Brontë"));
        let catalog = doc.catalog().unwrap();
        assert_eq!(catalog.get(b"Lang").unwrap(), &Object::string_literal("en"));
    }

    #[test]
    fn test_finish_rejects_empty_document() {
        let err = OutputDocument::new()
            .finish(&DocumentInfo::default())
            .unwrap_err();
        assert!(matches!(err, Error::Output(_)));
    }
}
