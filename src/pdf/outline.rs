//! Document outline (bookmarks), one entry per chapter.

use log::warn;
use lopdf::{Object, ObjectId, dictionary};

use super::{OutputDocument, text_string};
use crate::book::ChapterRecord;
use crate::error::Result;

/// One bookmark. Siblings are linked by index into [`Outline::entries`].
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineEntry {
    pub title: String,
    /// Destination page in the output document.
    pub page: ObjectId,
    pub prev: Option<usize>,
    pub next: Option<usize>,
}

/// A flat, doubly-linked list of bookmarks in chapter order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outline {
    entries: Vec<OutlineEntry>,
}

impl Outline {
    /// One entry per chapter whose start page exists in `pages`.
    pub fn build(chapters: &[ChapterRecord], pages: &[ObjectId]) -> Self {
        let mut entries: Vec<OutlineEntry> = Vec::with_capacity(chapters.len());

        for chapter in chapters {
            let Some(&page) = pages.get(chapter.start_page) else {
                warn!(
                    "Chapter '{}' starts on page {} of {}; leaving it out of the outline",
                    chapter.title,
                    chapter.start_page + 1,
                    pages.len()
                );
                continue;
            };

            let index = entries.len();
            let prev = index.checked_sub(1);
            if let Some(prev) = prev {
                entries[prev].next = Some(index);
            }
            entries.push(OutlineEntry {
                title: chapter.title.clone(),
                page,
                prev,
                next: None,
            });
        }

        Self { entries }
    }

    pub fn entries(&self) -> &[OutlineEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn first(&self) -> Option<&OutlineEntry> {
        self.entries.first()
    }

    pub fn last(&self) -> Option<&OutlineEntry> {
        self.entries.last()
    }

    /// Check the sibling links: the first entry has no `prev`, the last no
    /// `next`, and every `next` is answered by the matching `prev`. Following
    /// `next` from the first entry visits every entry exactly once.
    pub fn is_well_formed(&self) -> bool {
        let n = self.entries.len();
        if n == 0 {
            return true;
        }
        if self.entries[0].prev.is_some() || self.entries[n - 1].next.is_some() {
            return false;
        }

        let mut visited = 0;
        let mut current = Some(0);
        while let Some(i) = current {
            visited += 1;
            if visited > n {
                return false;
            }
            let next = self.entries[i].next;
            if let Some(j) = next
                && (j >= n || self.entries[j].prev != Some(i))
            {
                return false;
            }
            current = next;
        }
        visited == n
    }
}

impl OutputDocument {
    /// Serialize `outline` into the document and point the catalog at it.
    ///
    /// An empty outline removes any existing one. Returns the id of the
    /// outline root.
    pub fn set_outline(&mut self, outline: &Outline) -> Result<Option<ObjectId>> {
        if outline.is_empty() {
            let catalog = self.catalog_mut()?;
            catalog.remove(b"Outlines");
            catalog.remove(b"PageMode");
            return Ok(None);
        }

        let root_id = self.doc.new_object_id();
        let ids: Vec<ObjectId> = outline
            .entries()
            .iter()
            .map(|_| self.doc.new_object_id())
            .collect();

        for (entry, &id) in outline.entries().iter().zip(&ids) {
            let mut dict = dictionary! {
                "Title" => text_string(&entry.title),
                "Parent" => root_id,
                "Dest" => vec![
                    Object::Reference(entry.page),
                    "XYZ".into(),
                    Object::Null,
                    Object::Null,
                    Object::Null,
                ],
            };
            if let Some(prev) = entry.prev {
                dict.set("Prev", ids[prev]);
            }
            if let Some(next) = entry.next {
                dict.set("Next", ids[next]);
            }
            self.doc.objects.insert(id, dict.into());
        }

        self.doc.objects.insert(
            root_id,
            dictionary! {
                "Type" => "Outlines",
                "First" => ids[0],
                "Last" => ids[ids.len() - 1],
                "Count" => ids.len() as i64,
            }
            .into(),
        );

        let catalog = self.catalog_mut()?;
        catalog.set("Outlines", root_id);
        catalog.set("PageMode", "UseOutlines");
        Ok(Some(root_id))
    }
}

#[cfg(test)]
mod tests {
    use lopdf::Document;

    use super::*;
    use crate::pdf::RenderedFragment;
    use crate::pdf::test_helpers::pdf_with_pages;

    fn chapter(id: &str, title: &str, start_page: usize) -> ChapterRecord {
        ChapterRecord {
            id: id.into(),
            title: title.into(),
            start_page,
        }
    }

    fn pages(n: u32) -> Vec<ObjectId> {
        (1..=n).map(|i| (i, 0)).collect()
    }

    #[test]
    fn test_build_links_siblings() {
        let chapters = [chapter("a", "One", 0), chapter("b", "Two", 2), chapter("c", "Three", 3)];
        let outline = Outline::build(&chapters, &pages(5));

        assert_eq!(outline.len(), 3);
        assert!(outline.is_well_formed());
        assert_eq!(outline.first().unwrap().title, "One");
        assert_eq!(outline.last().unwrap().title, "Three");
        assert_eq!(outline.entries()[1].page, (3, 0));
        assert_eq!(outline.entries()[1].prev, Some(0));
        assert_eq!(outline.entries()[1].next, Some(2));
    }

    #[test]
    fn test_build_skips_out_of_range() {
        let chapters = [chapter("a", "One", 0), chapter("b", "Gone", 7), chapter("c", "Two", 1)];
        let outline = Outline::build(&chapters, &pages(2));

        let titles: Vec<&str> = outline.entries().iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Two"]);
        assert!(outline.is_well_formed());
    }

    #[test]
    fn test_empty_outline() {
        let outline = Outline::build(&[], &pages(3));
        assert!(outline.is_empty());
        assert!(outline.is_well_formed());
    }

    #[test]
    fn test_malformed_links_are_detected() {
        let mut outline = Outline::build(&[chapter("a", "One", 0), chapter("b", "Two", 1)], &pages(2));
        outline.entries[1].prev = None;
        assert!(!outline.is_well_formed());

        let mut cyclic = Outline::build(&[chapter("a", "One", 0), chapter("b", "Two", 1)], &pages(2));
        cyclic.entries[1].next = Some(0);
        assert!(!cyclic.is_well_formed());
    }

    #[test]
    fn test_set_outline_serializes_chain() {
        let mut output = OutputDocument::new();
        output
            .append(RenderedFragment::from_pdf(&pdf_with_pages(3, "Page")).unwrap())
            .unwrap();
        let chapters = [chapter("a", "Première", 0), chapter("b", "Second", 2)];
        let outline = Outline::build(&chapters, output.page_ids());
        let root_id = output.set_outline(&outline).unwrap().unwrap();

        let doc = &output.doc;
        let root = doc.get_object(root_id).unwrap().as_dict().unwrap();
        assert_eq!(root.get(b"Count").unwrap().as_i64().unwrap(), 2);
        let first_id = root.get(b"First").unwrap().as_reference().unwrap();
        let last_id = root.get(b"Last").unwrap().as_reference().unwrap();

        let first = doc.get_object(first_id).unwrap().as_dict().unwrap();
        assert_eq!(first.get(b"Title").unwrap(), &text_string("Première"));
        assert!(first.get(b"Prev").is_err());
        assert_eq!(first.get(b"Next").unwrap().as_reference().unwrap(), last_id);
        let dest = first.get(b"Dest").unwrap().as_array().unwrap();
        assert_eq!(dest[0].as_reference().unwrap(), output.page_ids()[0]);
        assert_eq!(dest[1].as_name().unwrap(), b"XYZ");

        let last = doc.get_object(last_id).unwrap().as_dict().unwrap();
        assert_eq!(last.get(b"Prev").unwrap().as_reference().unwrap(), first_id);
        assert!(last.get(b"Next").is_err());

        let catalog = doc.catalog().unwrap();
        assert_eq!(catalog.get(b"Outlines").unwrap().as_reference().unwrap(), root_id);
        assert_eq!(catalog.get(b"PageMode").unwrap().as_name().unwrap(), b"UseOutlines");
    }

    #[test]
    fn test_outline_survives_serialization() {
        let mut output = OutputDocument::new();
        output
            .append(RenderedFragment::from_pdf(&pdf_with_pages(2, "Page")).unwrap())
            .unwrap();
        let outline = Outline::build(&[chapter("a", "Only", 1)], output.page_ids());
        output.set_outline(&outline).unwrap();
        let bytes = output.finish(&Default::default()).unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let root_id = doc.catalog().unwrap().get(b"Outlines").unwrap().as_reference().unwrap();
        let root = doc.get_object(root_id).unwrap().as_dict().unwrap();
        let entry_id = root.get(b"First").unwrap().as_reference().unwrap();
        let entry = doc.get_object(entry_id).unwrap().as_dict().unwrap();
        let dest = entry.get(b"Dest").unwrap().as_array().unwrap();
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        assert_eq!(dest[0].as_reference().unwrap(), pages[1]);
    }
}
