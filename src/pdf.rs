//! PDF document handle backed by lopdf
//!
//! This module reads what the outline extractor needs from a PDF file:
//! - the page tree, for mapping page objects to page numbers
//! - named destinations, from both the `Names` tree and the old `Dests` dictionary
//! - the raw outline tree, with each entry's destination left unresolved

use crate::encoding::{decode_name_string, decode_pdf_string};
use crate::error::{OutlineResolutionError, ShelfmarkError};
use crate::outline::{Destination, OutlineDocument, PageTarget, RawOutlineItem};
use log::debug;
use lopdf::{Document, Object, ObjectId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Indirect references followed before giving up on a destination
const MAX_REFERENCE_DEPTH: usize = 16;

const UNTITLED: &str = "Untitled";

/// A loaded PDF with its page map and named destinations precomputed
pub struct PdfDocument {
    doc: Document,
    pages: BTreeMap<u32, ObjectId>,
    named_dests: HashMap<String, Destination>,
}

impl PdfDocument {
    /// Load a PDF from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ShelfmarkError> {
        let path = path.as_ref();
        debug!("loading PDF {}", path.display());
        let doc = Document::load(path)?;
        Ok(Self::from_document(doc))
    }

    pub fn from_document(doc: Document) -> Self {
        let pages = doc.get_pages();
        let named_dests = build_named_destinations(&doc);
        debug!(
            "PDF has {} pages and {} named destinations",
            pages.len(),
            named_dests.len()
        );
        Self {
            doc,
            pages,
            named_dests,
        }
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Document title from the Info dictionary
    pub fn title(&self) -> Option<String> {
        match self.doc.trailer.get(b"Info").ok()? {
            Object::Reference(info_ref) => self
                .doc
                .get_dictionary(*info_ref)
                .ok()?
                .get(b"Title")
                .ok()
                .and_then(decode_pdf_string),
            Object::Dictionary(info) => info.get(b"Title").ok().and_then(decode_pdf_string),
            _ => None,
        }
    }
}

impl OutlineDocument for PdfDocument {
    async fn outline(&self) -> Result<Option<Vec<RawOutlineItem>>, OutlineResolutionError> {
        Ok(read_outline(&self.doc))
    }

    async fn resolve_named_destination(
        &self,
        name: &str,
    ) -> Result<Option<Destination>, OutlineResolutionError> {
        Ok(self.named_dests.get(name).cloned())
    }

    async fn page_index(&self, target: &PageTarget) -> Result<u32, OutlineResolutionError> {
        match *target {
            PageTarget::Object(num, generation) => self
                .pages
                .iter()
                .find(|&(_, &obj_id)| obj_id == (num, generation))
                .map(|(&page_num, _)| page_num - 1)
                .ok_or(OutlineResolutionError::UnknownPage(num, generation)),
            PageTarget::Index(index) if index < self.page_count() => Ok(index),
            PageTarget::Index(index) => Err(OutlineResolutionError::PageOutOfRange(index)),
        }
    }
}

/// Build a map of named destinations
///
/// Parses both the new-style Names dictionary and the old-style Dests
/// dictionary. Entries whose value is not a usable destination are skipped.
pub fn build_named_destinations(doc: &Document) -> HashMap<String, Destination> {
    let mut named_dests = HashMap::new();

    let catalog = match doc.catalog() {
        Ok(c) => c,
        Err(_) => return named_dests,
    };

    if let Some(names_dict) = catalog
        .get(b"Names")
        .ok()
        .and_then(|obj| resolve_dictionary(doc, obj))
        && let Some(dests_tree) = names_dict
            .get(b"Dests")
            .ok()
            .and_then(|obj| resolve_dictionary(doc, obj))
    {
        let mut visited = HashSet::new();
        if let Ok(Object::Reference(root_ref)) = names_dict.get(b"Dests") {
            visited.insert(*root_ref);
        }
        parse_name_tree(doc, dests_tree, &mut visited, &mut named_dests);
    }

    if let Some(dests_dict) = catalog
        .get(b"Dests")
        .ok()
        .and_then(|obj| resolve_dictionary(doc, obj))
    {
        for (name, value) in dests_dict.iter() {
            if let Some(Destination::Explicit(target)) = parse_destination(doc, value) {
                let name = String::from_utf8_lossy(name).to_string();
                named_dests.insert(name, Destination::Explicit(target));
            }
        }
    }

    named_dests
}

/// Walk a name tree, collecting leaf `Names` pairs from every `Kids` branch
///
/// `visited` holds the referenced nodes already walked; the root may be inline.
fn parse_name_tree(
    doc: &Document,
    node: &lopdf::Dictionary,
    visited: &mut HashSet<ObjectId>,
    named_dests: &mut HashMap<String, Destination>,
) {
    if let Ok(Object::Array(names)) = node.get(b"Names") {
        for pair in names.chunks_exact(2) {
            if let Some(name) = decode_name_string(&pair[0])
                && let Some(Destination::Explicit(target)) = parse_destination(doc, &pair[1])
            {
                named_dests.insert(name, Destination::Explicit(target));
            }
        }
    }

    if let Ok(Object::Array(kids)) = node.get(b"Kids") {
        for kid in kids {
            if let Object::Reference(kid_ref) = kid
                && visited.insert(*kid_ref)
                && let Ok(kid_node) = doc.get_dictionary(*kid_ref)
            {
                parse_name_tree(doc, kid_node, visited, named_dests);
            }
        }
    }
}

/// Interpret a destination object without resolving it to a page
///
/// Accepted shapes:
/// - `[page_ref /XYZ ...]` or `[page_index /Fit]` arrays
/// - a string or name, naming a destination
/// - a dictionary with a `D` entry
/// - an indirect reference to any of the above
pub fn parse_destination(doc: &Document, dest: &Object) -> Option<Destination> {
    parse_destination_at_depth(doc, dest, 0)
}

fn parse_destination_at_depth(doc: &Document, dest: &Object, depth: usize) -> Option<Destination> {
    if depth > MAX_REFERENCE_DEPTH {
        return None;
    }
    match dest {
        Object::Array(arr) => match arr.first()? {
            Object::Reference((num, generation)) => {
                Some(Destination::Explicit(PageTarget::Object(*num, *generation)))
            }
            Object::Integer(index) => u32::try_from(*index)
                .ok()
                .map(|i| Destination::Explicit(PageTarget::Index(i))),
            _ => None,
        },
        Object::String(..) | Object::Name(_) => decode_name_string(dest).map(Destination::Named),
        Object::Dictionary(dict) => dict
            .get(b"D")
            .ok()
            .and_then(|d| parse_destination_at_depth(doc, d, depth + 1)),
        Object::Reference(ref_id) => doc
            .get_object(*ref_id)
            .ok()
            .and_then(|resolved| parse_destination_at_depth(doc, resolved, depth + 1)),
        _ => None,
    }
}

/// Read the outline tree, or `None` when the catalog has no outline
pub fn read_outline(doc: &Document) -> Option<Vec<RawOutlineItem>> {
    let catalog = doc.catalog().ok()?;
    let outlines = catalog
        .get(b"Outlines")
        .ok()
        .and_then(|obj| resolve_dictionary(doc, obj))?;

    let first_ref = match outlines.get(b"First") {
        Ok(Object::Reference(r)) => *r,
        _ => return Some(Vec::new()),
    };

    let mut visited = HashSet::new();
    Some(read_sibling_chain(doc, first_ref, &mut visited))
}

/// Follow a `First`/`Next` chain; `visited` guards against cycles
fn read_sibling_chain(
    doc: &Document,
    first: ObjectId,
    visited: &mut HashSet<ObjectId>,
) -> Vec<RawOutlineItem> {
    let mut items = Vec::new();
    let mut current = Some(first);

    while let Some(item_id) = current {
        if !visited.insert(item_id) {
            debug!("outline cycle at object {:?}", item_id);
            break;
        }
        let Ok(dict) = doc.get_dictionary(item_id) else {
            break;
        };

        let title = dict
            .get(b"Title")
            .ok()
            .and_then(|t| resolve_object(doc, t))
            .and_then(decode_pdf_string)
            .unwrap_or_else(|| UNTITLED.to_string());

        let dest = dict
            .get(b"Dest")
            .ok()
            .and_then(|d| parse_destination(doc, d))
            .or_else(|| action_destination(doc, dict));

        let children = match dict.get(b"First") {
            Ok(Object::Reference(child_ref)) => read_sibling_chain(doc, *child_ref, visited),
            _ => Vec::new(),
        };

        items.push(RawOutlineItem {
            title,
            dest,
            page: None,
            children,
        });

        current = match dict.get(b"Next") {
            Ok(Object::Reference(next_ref)) => Some(*next_ref),
            _ => None,
        };
    }

    items
}

/// Destination of a GoTo action (`/A << /S /GoTo /D ... >>`)
fn action_destination(doc: &Document, item: &lopdf::Dictionary) -> Option<Destination> {
    let action = item
        .get(b"A")
        .ok()
        .and_then(|a| resolve_dictionary(doc, a))?;
    action
        .get(b"D")
        .ok()
        .and_then(|d| parse_destination(doc, d))
}

fn resolve_object<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(r) => doc.get_object(*r).ok(),
        other => Some(other),
    }
}

fn resolve_dictionary<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a lopdf::Dictionary> {
    match resolve_object(doc, obj)? {
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}
