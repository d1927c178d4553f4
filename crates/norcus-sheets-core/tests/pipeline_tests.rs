//! Integration tests for the conversion pipeline.

mod common;

use common::{modified, shift_modified, TestFixture, ARCHIVE};
use std::fs;
use std::sync::atomic::Ordering;

#[test]
fn test_document_without_images_is_converted() {
    let fixture = TestFixture::new();
    let doc = fixture.document("FolderA/Song.pdf", 3);
    let pipeline = fixture.pipeline(false);

    assert!(pipeline.sync_document(&doc, false));
    assert_eq!(
        fixture.images("FolderA"),
        vec!["Song-001.png", "Song-002.png", "Song-003.png"]
    );
    assert!(doc.exists());
}

#[test]
fn test_single_page_has_no_counter() {
    let fixture = TestFixture::new();
    let doc = fixture.document("FolderA/Song.pdf", 1);
    assert!(fixture.pipeline(false).sync_document(&doc, false));
    assert_eq!(fixture.images("FolderA"), vec!["Song.png"]);
}

#[test]
fn test_fresh_images_are_kept() {
    let fixture = TestFixture::new();
    let doc = fixture.document("FolderA/Song.pdf", 2);
    let pipeline = fixture.pipeline(false);
    assert!(pipeline.sync_document(&doc, false));
    let before = modified(&fixture.path("FolderA/Song-001.png"));

    assert!(!pipeline.sync_document(&doc, false));
    assert_eq!(fixture.renderer.render_count(), 1);
    assert_eq!(modified(&fixture.path("FolderA/Song-001.png")), before);
}

#[test]
fn test_force_always_regenerates() {
    let fixture = TestFixture::new();
    let doc = fixture.document("FolderA/Song.pdf", 2);
    let pipeline = fixture.pipeline(false);

    assert!(pipeline.sync_document(&doc, true));
    assert!(pipeline.sync_document(&doc, true));
    assert_eq!(fixture.renderer.render_count(), 2);
    assert_eq!(fixture.images("FolderA").len(), 2);
}

#[test]
fn test_newer_document_replaces_images() {
    let fixture = TestFixture::new();
    let doc = fixture.document("FolderA/Song.pdf", 3);
    let pipeline = fixture.pipeline(false);
    assert!(pipeline.sync_document(&doc, false));

    // The document shrinks to two pages and gets newer than its images
    fs::write(&doc, "2").unwrap();
    shift_modified(&doc, 60);

    assert!(pipeline.sync_document(&doc, false));
    assert_eq!(fixture.images("FolderA"), vec!["Song-001.png", "Song-002.png"]);
    assert_eq!(modified(&fixture.path("FolderA/Song-001.png")), modified(&doc));
}

#[test]
fn test_duplicate_marked_images_are_replaced() {
    let fixture = TestFixture::new();
    let doc = fixture.document("FolderA/Song.pdf", 1);
    let stale = fixture.file("FolderA/Song (1).png", "old");
    shift_modified(&stale, -60);

    assert!(fixture.pipeline(false).sync_document(&doc, false));
    assert!(!stale.exists());
    assert_eq!(fixture.images("FolderA"), vec!["Song.png"]);
}

#[test]
fn test_other_documents_images_untouched() {
    let fixture = TestFixture::new();
    let doc = fixture.document("FolderA/Song.pdf", 1);
    fixture.file("FolderA/Song Two.png", "other");
    fixture.file("FolderA/Songbook-001.png", "other");

    assert!(fixture.pipeline(false).sync_document(&doc, true));
    assert_eq!(
        fixture.images("FolderA"),
        vec!["Song Two.png", "Song.png", "Songbook-001.png"]
    );
}

#[test]
fn test_converted_document_is_archived() {
    let fixture = TestFixture::new();
    let doc = fixture.document("FolderA/Song.pdf", 2);
    let old_copy = fixture.file(&format!("FolderA/{}/Song.pdf", ARCHIVE), "9");
    let pipeline = fixture.pipeline(true);

    assert!(pipeline.sync_document(&doc, false));
    assert!(!doc.exists());
    assert_eq!(fs::read_to_string(&old_copy).unwrap(), "2");
    assert_eq!(fixture.images("FolderA").len(), 2);

    // The archived copy is up to date with the images in the parent folder
    assert!(!pipeline.sync_document(&old_copy, false));
    let check = pipeline.check_page_count(&old_copy).unwrap();
    assert!(check.is_consistent());
}

#[test]
fn test_renderer_failure_keeps_images() {
    let fixture = TestFixture::new();
    let doc = fixture.document("FolderA/Song.pdf", 2);
    let pipeline = fixture.pipeline(false);
    assert!(pipeline.sync_document(&doc, false));

    fixture.renderer.fail.store(true, Ordering::SeqCst);
    assert!(!pipeline.sync_document(&doc, true));
    assert_eq!(fixture.images("FolderA").len(), 2);

    fixture.renderer.fail.store(false, Ordering::SeqCst);
    assert!(pipeline.sync_document(&doc, true));
}

#[test]
fn test_page_count_mismatch() {
    let fixture = TestFixture::new();
    let doc = fixture.document("FolderA/Song.pdf", 2);
    let pipeline = fixture.pipeline(false);
    assert!(pipeline.sync_document(&doc, false));

    fs::remove_file(fixture.path("FolderA/Song-002.png")).unwrap();
    let check = pipeline.check_page_count(&doc).unwrap();
    assert_eq!((check.pages, check.images), (2, 1));
    assert!(!check.is_consistent());
}
