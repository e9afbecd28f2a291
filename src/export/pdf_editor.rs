//! `DocumentEditor` backed by lopdf
//!
//! Pages are copied between documents through a graft map: the first copy
//! from a given source brings every source object over under fresh ids and
//! rewrites references. Later copies from the same source reuse those
//! objects, so three bands cut from one page share a single copy of its
//! content streams and resources. Unreachable objects are pruned on save.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use thiserror::Error;

use super::exporter::DocumentEditor;
use crate::geometry::CropRegion;

/// Attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Boxes rewritten on every exported page so no viewer falls back to a larger one
const PAGE_BOXES: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"BleedBox", b"TrimBox"];

/// Guard against cyclic `Parent` chains in malformed files
const MAX_TREE_DEPTH: usize = 64;

const OUTPUT_VERSION: &str = "1.5";

static NEXT_DOCUMENT_KEY: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Error)]
pub enum PdfEditError {
    #[error("PDF engine: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("failed to write PDF: {0}")]
    Io(#[from] std::io::Error),

    #[error("document has no page {0}")]
    PageOutOfRange(usize),

    #[error("page object {0:?} is not a dictionary")]
    MalformedPage(ObjectId),

    #[error("page {0} has no usable MediaBox")]
    MissingMediaBox(usize),
}

type GraftMap = BTreeMap<ObjectId, ObjectId>;

/// A lopdf document plus the graft maps of every source copied into it
pub struct PdfDocument {
    inner: Document,
    key: u64,
    grafts: HashMap<u64, GraftMap>,
}

impl PdfDocument {
    fn wrap(inner: Document) -> Self {
        Self {
            inner,
            key: NEXT_DOCUMENT_KEY.fetch_add(1, Ordering::Relaxed),
            grafts: HashMap::new(),
        }
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.inner.get_pages().len()
    }
}

/// Handle to a copied page that is not yet attached to the page tree
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PdfPage {
    id: ObjectId,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LopdfEditor;

impl LopdfEditor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl DocumentEditor for LopdfEditor {
    type Document = PdfDocument;
    type Page = PdfPage;
    type Error = PdfEditError;

    fn load(&self, bytes: &[u8]) -> Result<PdfDocument, PdfEditError> {
        let inner = Document::load_mem(bytes)?;
        debug!(
            "Loaded PDF {} with {} pages and {} objects",
            inner.version,
            inner.get_pages().len(),
            inner.objects.len()
        );
        Ok(PdfDocument::wrap(inner))
    }

    fn create_empty(&self) -> PdfDocument {
        let mut inner = Document::with_version(OUTPUT_VERSION);
        let pages_id = inner.new_object_id();
        inner.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => Vec::<Object>::new(),
                "Count" => Object::Integer(0),
            }),
        );
        let catalog_id = inner.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        inner.trailer.set("Root", catalog_id);
        PdfDocument::wrap(inner)
    }

    fn copy_page(
        &self,
        target: &mut PdfDocument,
        source: &PdfDocument,
        page_index: usize,
    ) -> Result<PdfPage, PdfEditError> {
        let source_id = page_id(&source.inner, page_index)?;
        let mut page = source
            .inner
            .get_dictionary(source_id)
            .map_err(|_| PdfEditError::MalformedPage(source_id))?
            .clone();

        for key in INHERITABLE {
            if page.has(key) {
                continue;
            }
            if let Some(value) = inherited_attribute(&source.inner, source_id, key) {
                page.set(key.to_vec(), value);
            }
        }
        // Parent is set on append; annotations are bound to their original page
        page.remove(b"Parent");
        page.remove(b"Annots");

        let map = match target.grafts.entry(source.key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(graft_objects(&mut target.inner, &source.inner)),
        };
        let mut object = Object::Dictionary(page);
        remap_references(&mut object, map);

        let id = target.inner.add_object(object);
        debug!("Copied source page {page_index} ({source_id:?}) to {id:?}");
        Ok(PdfPage { id })
    }

    fn set_crop_region(
        &self,
        target: &mut PdfDocument,
        page: &PdfPage,
        region: CropRegion,
    ) -> Result<(), PdfEditError> {
        let rect: Vec<Object> = region
            .to_box()
            .iter()
            .map(|value| Object::Real(*value as f32))
            .collect();
        let dict = target.inner.get_object_mut(page.id)?.as_dict_mut()?;
        for key in PAGE_BOXES {
            dict.set(key.to_vec(), Object::Array(rect.clone()));
        }
        Ok(())
    }

    fn append_page(&self, target: &mut PdfDocument, page: PdfPage) -> Result<(), PdfEditError> {
        let root = pages_root(&target.inner)?;

        let pages = target.inner.get_object_mut(root)?.as_dict_mut()?;
        let kids = pages.get_mut(b"Kids")?.as_array_mut()?;
        kids.push(Object::Reference(page.id));
        let count = kids.len() as i64;
        pages.set("Count", Object::Integer(count));

        target
            .inner
            .get_object_mut(page.id)?
            .as_dict_mut()?
            .set("Parent", Object::Reference(root));
        Ok(())
    }

    fn serialize(&self, target: &mut PdfDocument) -> Result<Vec<u8>, PdfEditError> {
        let pruned = target.inner.prune_objects();
        debug!("Pruned {} unreachable objects before save", pruned.len());
        // Graft maps point at ids that may have just been pruned
        target.grafts.clear();
        target.inner.compress();

        let mut buffer = Vec::new();
        target.inner.save_to(&mut buffer)?;
        Ok(buffer)
    }

    fn page_size(
        &self,
        document: &PdfDocument,
        page_index: usize,
    ) -> Result<(f64, f64), PdfEditError> {
        let id = page_id(&document.inner, page_index)?;
        let media_box = inherited_attribute(&document.inner, id, b"MediaBox")
            .ok_or(PdfEditError::MissingMediaBox(page_index))?;
        let media_box = resolve(&document.inner, media_box)?;

        let corners: Vec<f64> = media_box
            .as_array()
            .map_err(|_| PdfEditError::MissingMediaBox(page_index))?
            .iter()
            .filter_map(|value| number(&resolve(&document.inner, value.clone()).ok()?))
            .collect();
        let [x0, y0, x1, y1] = corners[..] else {
            return Err(PdfEditError::MissingMediaBox(page_index));
        };

        Ok(((x1 - x0).abs(), (y1 - y0).abs()))
    }
}

fn page_id(document: &Document, page_index: usize) -> Result<ObjectId, PdfEditError> {
    document
        .get_pages()
        .values()
        .nth(page_index)
        .copied()
        .ok_or(PdfEditError::PageOutOfRange(page_index))
}

fn pages_root(document: &Document) -> Result<ObjectId, PdfEditError> {
    let catalog_id = document.trailer.get(b"Root")?.as_reference()?;
    let pages_id = document
        .get_dictionary(catalog_id)?
        .get(b"Pages")?
        .as_reference()?;
    Ok(pages_id)
}

/// Look `key` up on the page, then on each ancestor in the page tree
fn inherited_attribute(document: &Document, page: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = document.get_dictionary(page).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value.clone());
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = document.get_dictionary(parent).ok()?;
    }
    None
}

fn resolve(document: &Document, object: Object) -> Result<Object, PdfEditError> {
    match object {
        Object::Reference(id) => Ok(document.get_object(id)?.clone()),
        other => Ok(other),
    }
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(f64::from(*value)),
        _ => None,
    }
}

/// Copy every object of `source` into `target` under fresh ids.
///
/// Returns the old-to-new id map. References to objects missing from the
/// source become `null` so they cannot alias unrelated target objects.
fn graft_objects(target: &mut Document, source: &Document) -> GraftMap {
    let map: GraftMap = source
        .objects
        .keys()
        .map(|&old_id| (old_id, target.new_object_id()))
        .collect();

    for (old_id, object) in &source.objects {
        let mut copy = object.clone();
        remap_references(&mut copy, &map);
        if let Some(&new_id) = map.get(old_id) {
            target.objects.insert(new_id, copy);
        }
    }

    debug!("Grafted {} objects into target document", map.len());
    map
}

fn remap_references(object: &mut Object, map: &GraftMap) {
    match object {
        Object::Reference(id) => {
            *object = match map.get(id) {
                Some(&new_id) => Object::Reference(new_id),
                None => Object::Null,
            };
        }
        Object::Array(items) => {
            for item in items.iter_mut() {
                remap_references(item, map);
            }
        }
        Object::Dictionary(dict) => remap_dictionary(dict, map),
        Object::Stream(stream) => remap_dictionary(&mut stream.dict, map),
        _ => {}
    }
}

fn remap_dictionary(dict: &mut Dictionary, map: &GraftMap) {
    for (_, value) in dict.iter_mut() {
        remap_references(value, map);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::pdf_fixtures::{single_page_pdf, two_page_pdf};

    fn region(bottom: f64, height: f64) -> CropRegion {
        CropRegion {
            left: 0.0,
            bottom,
            width: 612.0,
            height,
        }
    }

    fn boxes_of(document: &Document, id: ObjectId) -> Vec<Vec<f64>> {
        let dict = document.get_dictionary(id).unwrap();
        PAGE_BOXES
            .iter()
            .map(|key| {
                dict.get(key)
                    .unwrap()
                    .as_array()
                    .unwrap()
                    .iter()
                    .filter_map(number)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn reads_page_size_from_media_box() {
        let editor = LopdfEditor::new();
        let document = editor.load(&single_page_pdf(612.0, 792.0)).unwrap();
        assert_eq!(editor.page_size(&document, 0).unwrap(), (612.0, 792.0));
        assert!(matches!(
            editor.page_size(&document, 3),
            Err(PdfEditError::PageOutOfRange(3))
        ));
    }

    #[test]
    fn media_box_is_inherited_from_page_tree() {
        let editor = LopdfEditor::new();
        let document = editor.load(&two_page_pdf(400.0, 500.0)).unwrap();
        assert_eq!(editor.page_size(&document, 1).unwrap(), (400.0, 500.0));
        let first = page_id(&document.inner, 0).unwrap();
        assert!(inherited_attribute(&document.inner, first, b"MediaBox").is_some());
    }

    #[test]
    fn garbage_input_fails_to_load() {
        let editor = LopdfEditor::new();
        assert!(matches!(
            editor.load(b"definitely not a pdf"),
            Err(PdfEditError::Pdf(_))
        ));
    }

    #[test]
    fn copies_share_grafted_content() {
        let editor = LopdfEditor::new();
        let source = editor.load(&single_page_pdf(612.0, 792.0)).unwrap();
        let mut output = editor.create_empty();

        let first = editor.copy_page(&mut output, &source, 0).unwrap();
        let objects_after_first = output.inner.objects.len();
        let second = editor.copy_page(&mut output, &source, 0).unwrap();

        assert_ne!(first, second);
        assert_eq!(output.inner.objects.len(), objects_after_first + 1);

        let contents = |page: PdfPage| {
            output
                .inner
                .get_dictionary(page.id)
                .unwrap()
                .get(b"Contents")
                .unwrap()
                .as_reference()
                .unwrap()
        };
        assert_eq!(contents(first), contents(second));
    }

    #[test]
    fn crop_sets_all_four_boxes() {
        let editor = LopdfEditor::new();
        let source = editor.load(&single_page_pdf(612.0, 792.0)).unwrap();
        let mut output = editor.create_empty();
        let page = editor.copy_page(&mut output, &source, 0).unwrap();

        editor
            .set_crop_region(&mut output, &page, region(264.0, 264.0))
            .unwrap();

        for rect in boxes_of(&output.inner, page.id) {
            assert_eq!(rect, vec![0.0, 264.0, 612.0, 528.0]);
        }
    }

    #[test]
    fn append_and_serialize_round_trip() {
        let editor = LopdfEditor::new();
        let source = editor.load(&single_page_pdf(612.0, 792.0)).unwrap();
        let mut output = editor.create_empty();

        for (bottom, height) in [(528.0, 264.0), (264.0, 264.0), (0.0, 264.0)] {
            let page = editor.copy_page(&mut output, &source, 0).unwrap();
            editor
                .set_crop_region(&mut output, &page, region(bottom, height))
                .unwrap();
            editor.append_page(&mut output, page).unwrap();
        }

        let bytes = editor.serialize(&mut output).unwrap();
        let reloaded = editor.load(&bytes).unwrap();
        assert_eq!(reloaded.page_count(), 3);

        let pages: Vec<ObjectId> = reloaded.inner.get_pages().values().copied().collect();
        assert_eq!(
            boxes_of(&reloaded.inner, pages[0])[0],
            vec![0.0, 528.0, 612.0, 792.0]
        );
        assert_eq!(
            boxes_of(&reloaded.inner, pages[2])[3],
            vec![0.0, 0.0, 612.0, 264.0]
        );
    }
}
