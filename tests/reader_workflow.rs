//! End-to-end reader workflow against an on-disk database
//!
//! A PDF with a two-entry outline is opened, the reader edits its outline
//! and annotations, and a second session reopens the same database.

use lopdf::{Dictionary, Document, Object, Stream, StringFormat};
use shelfmark_lib::geometry::{PageGeometry, PageOrigin, ScreenRect};
use shelfmark_lib::reader::{ReaderController, SelectionOutcome, TextSelection};
use shelfmark_lib::settings::MemoryPreferences;
use shelfmark_lib::types::{HighlightColor, Scope};
use shelfmark_lib::{PdfDocument, ReaderConfig, SqliteStore};

/// Eight pages, outline "Intro" -> page 1 and "Method" -> page 4
fn create_book() -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();
    for i in 1..=8 {
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            format!("BT /F1 12 Tf 100 700 Td (Page {}) Tj ET", i).into_bytes(),
        ));
        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set("Contents", Object::Reference(content_id));
        kids.push(Object::Reference(doc.add_object(page)));
    }
    let page_refs = kids.clone();

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Kids", Object::Array(kids));
    pages.set("Count", Object::Integer(8));
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let outlines_id = doc.new_object_id();
    let intro_id = doc.new_object_id();
    let method_id = doc.new_object_id();

    let mut intro = Dictionary::new();
    intro.set("Title", Object::String(b"Intro".to_vec(), StringFormat::Literal));
    intro.set("Dest", Object::Array(vec![page_refs[0].clone()]));
    intro.set("Parent", Object::Reference(outlines_id));
    intro.set("Next", Object::Reference(method_id));

    let mut method = Dictionary::new();
    method.set("Title", Object::String(b"Method".to_vec(), StringFormat::Literal));
    method.set("Dest", Object::Array(vec![page_refs[3].clone()]));
    method.set("Parent", Object::Reference(outlines_id));
    method.set("Prev", Object::Reference(intro_id));

    doc.objects.insert(intro_id, Object::Dictionary(intro));
    doc.objects.insert(method_id, Object::Dictionary(method));

    let mut outlines = Dictionary::new();
    outlines.set("Type", Object::Name(b"Outlines".to_vec()));
    outlines.set("First", Object::Reference(intro_id));
    outlines.set("Last", Object::Reference(method_id));
    doc.objects.insert(outlines_id, Object::Dictionary(outlines));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    catalog.set("Outlines", Object::Reference(outlines_id));
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc
}

fn open_store(path: &std::path::Path) -> SqliteStore {
    let store = SqliteStore::open(path).expect("Failed to open database");
    store.ensure_book(1, "Workflow").expect("Failed to register book");
    store
}

#[tokio::test]
async fn test_edits_survive_a_new_session() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("shelfmark.db");
    let doc = PdfDocument::from_document(create_book());
    let scope = Scope::new(1, "alice");

    {
        let mut reader = ReaderController::new(
            open_store(&db_path),
            MemoryPreferences::default(),
            ReaderConfig::default(),
            scope.clone(),
        );
        reader.open_document(&doc, doc.page_count()).await.unwrap();
        assert_eq!(reader.merged_outline().len(), 2);

        reader
            .convert_native_to_custom(1, Some("Methods"))
            .await
            .unwrap();
        reader.go_to_page(6);
        reader.add_bookmark(None).await.unwrap();

        reader.set_scale(2.0);
        reader.set_highlight_color(HighlightColor::Blue).unwrap();
        reader.toggle_highlight_mode();
        let outcome = reader
            .handle_selection(TextSelection {
                text: "important".to_string(),
                page: 6,
                rect: ScreenRect {
                    left: 240.0,
                    top: 420.0,
                    width: 100.0,
                    height: 24.0,
                },
                page_geometry: Some(PageGeometry {
                    left: 40.0,
                    top: 20.0,
                    width: 1224.0,
                    height: 1584.0,
                }),
            })
            .await
            .unwrap();
        assert!(matches!(outcome, SelectionOutcome::Highlighted(_)));
    }

    let mut reader = ReaderController::new(
        open_store(&db_path),
        MemoryPreferences::default(),
        ReaderConfig::default(),
        scope,
    );
    reader.open_document(&doc, doc.page_count()).await.unwrap();

    let merged: Vec<(&str, u32, bool)> = reader
        .merged_outline()
        .iter()
        .map(|e| (e.title.as_str(), e.page, e.is_custom()))
        .collect();
    assert_eq!(
        merged,
        vec![
            ("Intro", 1, false),
            ("Methods", 4, true),
            ("Page 6", 6, true)
        ]
    );

    // Captured at 2x, shown at 1x
    let overlays = reader.highlight_overlays(6, PageOrigin { left: 10.0, top: 10.0 });
    assert_eq!(overlays.len(), 1);
    assert_eq!(
        overlays[0].1,
        ScreenRect {
            left: 110.0,
            top: 210.0,
            width: 50.0,
            height: 12.0
        }
    );
    assert_eq!(overlays[0].0.color, HighlightColor::Blue);
}

#[tokio::test]
async fn test_other_reader_sees_only_native_outline() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("shelfmark.db");
    let doc = PdfDocument::from_document(create_book());

    let mut alice = ReaderController::new(
        open_store(&db_path),
        MemoryPreferences::default(),
        ReaderConfig::default(),
        Scope::new(1, "alice"),
    );
    alice.open_document(&doc, doc.page_count()).await.unwrap();
    alice.convert_native_to_custom(0, Some("Preface")).await.unwrap();

    let mut bob = ReaderController::new(
        open_store(&db_path),
        MemoryPreferences::default(),
        ReaderConfig::default(),
        Scope::new(1, "bob"),
    );
    bob.open_document(&doc, doc.page_count()).await.unwrap();
    let titles: Vec<&str> = bob
        .merged_outline()
        .iter()
        .map(|e| e.title.as_str())
        .collect();
    assert_eq!(titles, vec!["Intro", "Method"]);
}
