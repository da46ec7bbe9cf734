//! Appending rendered fragments to the output page tree.

use std::collections::HashMap;

use log::debug;
use lopdf::{Dictionary, Document, Object, ObjectId};

use super::{OutputDocument, RenderedFragment};
use crate::error::Result;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Bound on page tree depth when looking up inherited attributes.
const MAX_TREE_DEPTH: usize = 64;

impl OutputDocument {
    /// Append every page of `fragment`, in order, after the existing pages.
    ///
    /// Returns the number of pages added. The fragment is copied whole or
    /// not at all: on error the output document is left as it was.
    pub fn append(&mut self, fragment: RenderedFragment) -> Result<usize> {
        if fragment.page_ids.is_empty() {
            return Ok(0);
        }

        let mut copier = ObjectCopier::new(&fragment.document, &mut self.doc);
        let copied = match copier.copy_pages(&fragment.page_ids, self.pages_id) {
            Ok(copied) => copied,
            Err(e) => {
                copier.discard();
                return Err(e);
            }
        };
        let objects = copier.id_map.len();

        self.page_ids.extend_from_slice(&copied);
        let kids: Vec<Object> = self.page_ids.iter().map(|&id| Object::Reference(id)).collect();
        let pages = self.doc.get_object_mut(self.pages_id)?.as_dict_mut()?;
        pages.set("Kids", kids);
        pages.set("Count", self.page_ids.len() as i64);

        debug!("Appended {} pages ({} objects)", copied.len(), objects);
        Ok(copied.len())
    }
}

/// Copies objects from one document into another under fresh ids.
struct ObjectCopier<'a> {
    source: &'a Document,
    target: &'a mut Document,
    id_map: HashMap<ObjectId, ObjectId>,
}

impl<'a> ObjectCopier<'a> {
    fn new(source: &'a Document, target: &'a mut Document) -> Self {
        Self {
            source,
            target,
            id_map: HashMap::new(),
        }
    }

    /// Copy `pages` and everything they reference, attaching each copy to
    /// `parent`. Returns the new page ids in order.
    fn copy_pages(&mut self, pages: &[ObjectId], parent: ObjectId) -> Result<Vec<ObjectId>> {
        // Reserve page ids first so references between pages (link
        // annotations) resolve to the copies instead of pulling in the
        // source page tree.
        let reserved: Vec<ObjectId> = pages
            .iter()
            .map(|&page_id| {
                let new_id = self.target.add_object(Object::Null);
                self.id_map.insert(page_id, new_id);
                new_id
            })
            .collect();

        for (&page_id, &new_id) in pages.iter().zip(&reserved) {
            let mut page = self.source.get_object(page_id)?.as_dict()?.clone();
            for key in INHERITABLE {
                if !page.has(key)
                    && let Some(value) = inherited_attribute(self.source, &page, key)
                {
                    page.set(key.to_vec(), value.clone());
                }
            }
            page.remove(b"Parent");

            let mut page = self.remap_dictionary(page)?;
            page.set("Parent", parent);
            self.target.objects.insert(new_id, Object::Dictionary(page));
        }

        Ok(reserved)
    }

    /// Copy one object and, recursively, everything it references.
    fn copy_object(&mut self, source_id: ObjectId) -> Result<ObjectId> {
        if let Some(&target_id) = self.id_map.get(&source_id) {
            return Ok(target_id);
        }

        // Map the id before recursing; the page tree and annotations are
        // full of cycles.
        let new_id = self.target.add_object(Object::Null);
        self.id_map.insert(source_id, new_id);

        // A dangling reference is the null object
        let obj = match self.source.get_object(source_id) {
            Ok(obj) => obj.clone(),
            Err(_) => Object::Null,
        };
        let obj = self.remap_references(obj)?;
        self.target.objects.insert(new_id, obj);

        Ok(new_id)
    }

    fn remap_references(&mut self, obj: Object) -> Result<Object> {
        match obj {
            Object::Reference(id) => Ok(Object::Reference(self.copy_object(id)?)),
            Object::Array(arr) => {
                let arr = arr
                    .into_iter()
                    .map(|o| self.remap_references(o))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Object::Array(arr))
            }
            Object::Dictionary(dict) => Ok(Object::Dictionary(self.remap_dictionary(dict)?)),
            Object::Stream(mut stream) => {
                stream.dict = self.remap_dictionary(stream.dict)?;
                Ok(Object::Stream(stream))
            }
            obj => Ok(obj),
        }
    }

    fn remap_dictionary(&mut self, mut dict: Dictionary) -> Result<Dictionary> {
        for (_, value) in dict.iter_mut() {
            let taken = std::mem::replace(value, Object::Null);
            *value = self.remap_references(taken)?;
        }
        Ok(dict)
    }

    /// Remove everything copied so far.
    fn discard(&mut self) {
        for id in self.id_map.values() {
            self.target.objects.remove(id);
        }
        self.id_map.clear();
    }
}

/// Look `key` up on the ancestors of `page`.
fn inherited_attribute<'d>(doc: &'d Document, page: &Dictionary, key: &[u8]) -> Option<&'d Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_object(parent).and_then(Object::as_dict).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}
