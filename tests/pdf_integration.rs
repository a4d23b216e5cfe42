//! Integration tests for PDF outline extraction
//!
//! These tests build PDF files in memory with lopdf and run them through
//! the full load/extract pipeline.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use shelfmark_lib::encoding::decode_pdf_string;
use shelfmark_lib::outline::{OutlineDocument, extract_outline};
use shelfmark_lib::pdf::PdfDocument;
use shelfmark_lib::types::OutlineNode;
use std::io::Write;
use tempfile::NamedTempFile;

/// Create a simple PDF document with specified number of pages
fn create_simple_pdf(num_pages: u32) -> Document {
    let mut doc = Document::with_version("1.5");
    let mut pages_kids: Vec<Object> = Vec::new();
    let pages_id = doc.new_object_id();

    for i in 1..=num_pages {
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            format!("BT /F1 12 Tf 100 700 Td (Page {}) Tj ET", i).into_bytes(),
        ));

        let mut page_dict = Dictionary::new();
        page_dict.set("Type", Object::Name(b"Page".to_vec()));
        page_dict.set("Parent", Object::Reference(pages_id));
        page_dict.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ]),
        );
        page_dict.set("Contents", Object::Reference(content_id));

        let page_id = doc.add_object(page_dict);
        pages_kids.push(Object::Reference(page_id));
    }

    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
    pages_dict.set("Kids", Object::Array(pages_kids));
    pages_dict.set("Count", Object::Integer(num_pages as i64));
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));

    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    doc
}

fn catalog_id(doc: &Document) -> ObjectId {
    match doc.trailer.get(b"Root") {
        Ok(Object::Reference(id)) => *id,
        _ => panic!("No catalog found"),
    }
}

fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().values().cloned().collect()
}

fn outline_item(title: Vec<u8>) -> Dictionary {
    let mut item = Dictionary::new();
    item.set("Title", Object::String(title, StringFormat::Literal));
    item
}

fn fit_dest(page: ObjectId) -> Object {
    Object::Array(vec![Object::Reference(page), Object::Name(b"Fit".to_vec())])
}

/// Link `items` as a sibling chain under a new Outlines root
fn install_outline(doc: &mut Document, items: Vec<(ObjectId, Dictionary)>) {
    let outlines_id = doc.new_object_id();
    let ids: Vec<ObjectId> = items.iter().map(|(id, _)| *id).collect();

    for (i, (id, mut dict)) in items.into_iter().enumerate() {
        dict.set("Parent", Object::Reference(outlines_id));
        if let Some(next) = ids.get(i + 1) {
            dict.set("Next", Object::Reference(*next));
        }
        if i > 0 {
            dict.set("Prev", Object::Reference(ids[i - 1]));
        }
        doc.objects.insert(id, Object::Dictionary(dict));
    }

    let mut outlines = Dictionary::new();
    outlines.set("Type", Object::Name(b"Outlines".to_vec()));
    if let (Some(first), Some(last)) = (ids.first(), ids.last()) {
        outlines.set("First", Object::Reference(*first));
        outlines.set("Last", Object::Reference(*last));
    }
    outlines.set("Count", Object::Integer(ids.len() as i64));
    doc.objects
        .insert(outlines_id, Object::Dictionary(outlines));

    let catalog_id = catalog_id(doc);
    if let Ok(Object::Dictionary(cat_dict)) = doc.get_object_mut(catalog_id) {
        cat_dict.set("Outlines", Object::Reference(outlines_id));
    }
}

/// Create a PDF with TOC (outline) structure
fn create_pdf_with_toc() -> Document {
    let mut doc = create_simple_pdf(5);
    let pages = page_ids(&doc);

    let child_id = doc.new_object_id();
    let first_id = doc.new_object_id();
    let second_id = doc.new_object_id();

    let mut child = outline_item(b"Section 1.1".to_vec());
    child.set("Dest", fit_dest(pages[1]));
    child.set("Parent", Object::Reference(first_id));
    doc.objects.insert(child_id, Object::Dictionary(child));

    let mut first = outline_item(b"Chapter 1".to_vec());
    first.set("Dest", fit_dest(pages[0]));
    first.set("First", Object::Reference(child_id));
    first.set("Last", Object::Reference(child_id));

    let mut second = outline_item(b"Chapter 2".to_vec());
    second.set("Dest", fit_dest(pages[2]));

    install_outline(&mut doc, vec![(first_id, first), (second_id, second)]);
    doc
}

/// Create a PDF whose outline points through a named destination and a GoTo action
fn create_pdf_with_named_destinations() -> Document {
    let mut doc = create_simple_pdf(6);
    let pages = page_ids(&doc);

    let mut dests_tree = Dictionary::new();
    dests_tree.set(
        "Names",
        Object::Array(vec![
            Object::String(b"appendix".to_vec(), StringFormat::Literal),
            fit_dest(pages[5]),
        ]),
    );
    let dests_tree_id = doc.add_object(dests_tree);

    let mut names = Dictionary::new();
    names.set("Dests", Object::Reference(dests_tree_id));
    let names_id = doc.add_object(names);
    let catalog_id = catalog_id(&doc);
    if let Ok(Object::Dictionary(cat_dict)) = doc.get_object_mut(catalog_id) {
        cat_dict.set("Names", Object::Reference(names_id));
    }

    let named_id = doc.new_object_id();
    let mut named = outline_item(b"Appendix".to_vec());
    named.set(
        "Dest",
        Object::String(b"appendix".to_vec(), StringFormat::Literal),
    );

    let action_id = doc.new_object_id();
    let mut action = Dictionary::new();
    action.set("S", Object::Name(b"GoTo".to_vec()));
    action.set("D", fit_dest(pages[3]));
    let mut via_action = outline_item(b"Results".to_vec());
    via_action.set("A", Object::Dictionary(action));

    let missing_id = doc.new_object_id();
    let mut missing = outline_item(b"Dangling".to_vec());
    missing.set("Dest", Object::Name(b"nowhere".to_vec()));

    install_outline(
        &mut doc,
        vec![
            (named_id, named),
            (action_id, via_action),
            (missing_id, missing),
        ],
    );
    doc
}

/// Create UTF-16BE encoded string with BOM
fn create_utf16be_string(s: &str) -> Vec<u8> {
    let mut bytes = vec![0xFE, 0xFF];
    for unit in s.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    bytes
}

/// Save document to a temporary file
fn save_to_temp_file(doc: &mut Document) -> NamedTempFile {
    let mut temp_file = NamedTempFile::with_suffix(".pdf").expect("Failed to create temp file");
    doc.save_to(temp_file.as_file_mut())
        .expect("Failed to save PDF");
    temp_file.as_file_mut().flush().expect("Failed to flush");
    temp_file
}

fn titles_and_pages(nodes: &[OutlineNode]) -> Vec<(&str, u32)> {
    nodes.iter().map(|n| (n.title.as_str(), n.page)).collect()
}

#[tokio::test]
async fn test_extract_outline_empty_pdf() {
    let doc = PdfDocument::from_document(create_simple_pdf(3));
    assert_eq!(doc.page_count(), 3);
    assert!(doc.outline().await.unwrap().is_none());
    assert!(extract_outline(&doc).await.is_empty());
}

#[tokio::test]
async fn test_extract_outline_with_chapters() {
    let doc = PdfDocument::from_document(create_pdf_with_toc());
    let outline = extract_outline(&doc).await;

    assert_eq!(
        titles_and_pages(&outline),
        vec![("Chapter 1", 1), ("Chapter 2", 3)]
    );
    assert_eq!(outline[0].original_index, 0);
    assert_eq!(outline[1].original_index, 1);

    assert_eq!(titles_and_pages(&outline[0].children), vec![("Section 1.1", 2)]);
    assert!(outline[1].children.is_empty());
}

#[tokio::test]
async fn test_named_destinations_and_actions() {
    let doc = PdfDocument::from_document(create_pdf_with_named_destinations());
    let outline = extract_outline(&doc).await;

    // The dangling entry falls back to its sibling position
    assert_eq!(
        titles_and_pages(&outline),
        vec![("Appendix", 6), ("Results", 4), ("Dangling", 3)]
    );
}

#[tokio::test]
async fn test_japanese_outline_titles() {
    let mut doc = create_simple_pdf(2);
    let pages = page_ids(&doc);

    let first_id = doc.new_object_id();
    let mut first = outline_item(create_utf16be_string("第1章 はじめに"));
    first.set("Dest", fit_dest(pages[1]));
    install_outline(&mut doc, vec![(first_id, first)]);

    let mut info = Dictionary::new();
    info.set(
        "Title",
        Object::String(create_utf16be_string("日本語タイトル"), StringFormat::Literal),
    );
    let info_id = doc.add_object(info);
    doc.trailer.set("Info", Object::Reference(info_id));

    let doc = PdfDocument::from_document(doc);
    assert_eq!(doc.title(), Some("日本語タイトル".to_string()));

    let outline = extract_outline(&doc).await;
    assert_eq!(titles_and_pages(&outline), vec![("第1章 はじめに", 2)]);
}

#[test]
fn test_decode_info_title() {
    let title = Object::String(create_utf16be_string("著者名"), StringFormat::Literal);
    assert_eq!(decode_pdf_string(&title), Some("著者名".to_string()));
}

#[tokio::test]
async fn test_pdf_file_roundtrip() {
    let mut doc = create_pdf_with_toc();
    let temp_file = save_to_temp_file(&mut doc);

    let reloaded = PdfDocument::load(temp_file.path()).expect("Failed to reload PDF");
    assert_eq!(reloaded.page_count(), 5);

    let outline = extract_outline(&reloaded).await;
    assert_eq!(outline.len(), 2, "Reloaded PDF should have 2 outline entries");
    assert_eq!(outline[0].title, "Chapter 1");
    assert_eq!(outline[0].children[0].page, 2);
}

#[test]
fn test_load_missing_file_fails() {
    let result = PdfDocument::load("/nonexistent/book.pdf");
    assert!(result.is_err());
}
