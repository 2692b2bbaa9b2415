//! Page service behavior over a real file store and an in-process cache.

use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use quire::application::events::{EventDispatcher, PageEvent, Payload};
use quire::application::pages::PageService;
use quire::application::render::MarkdownParser;
use quire::cache::{MemoryCache, TagCache};
use quire::content::{ContentDriver, FileDriver};
use quire::domain::entities::Page;
use quire::domain::slug::Slug;
use quire::domain::types::PageStatus;

fn slug(raw: &str) -> Slug {
    Slug::new(raw).expect("valid slug")
}

fn service(root: &TempDir) -> PageService {
    let driver: Arc<dyn ContentDriver> =
        Arc::new(FileDriver::new(root.path()).expect("content root"));
    PageService::new(
        driver,
        TagCache::new(Arc::new(MemoryCache::new())),
        Arc::new(EventDispatcher::new()),
        Arc::new(MarkdownParser::new()),
        None,
    )
}

#[tokio::test]
async fn saved_pages_load_back_identically() {
    let root = TempDir::new().expect("tempdir");
    let service = service(&root);

    let mut page = Page::new(slug("about"), "About", "# Hello\n\nBody.");
    page.meta.insert("owner".into(), "docs-team".into());
    service.save(&mut page).await.expect("saved");

    let loaded = service.load("about").await.expect("loaded");
    assert_eq!(loaded.slug.as_str(), "about");
    assert_eq!(loaded.title, page.title);
    assert_eq!(loaded.content, page.content);
    assert_eq!(loaded.status, page.status);
    assert_eq!(loaded.meta, page.meta);
    let html = loaded.rendered_html.expect("rendered on load");
    assert!(html.contains("<h1>"));
}

#[tokio::test]
async fn deleted_pages_are_unreachable() {
    let root = TempDir::new().expect("tempdir");
    let service = service(&root);

    let mut page = Page::new(slug("ephemeral"), "Ephemeral", "");
    service.save(&mut page).await.expect("saved");
    assert!(service.exists("ephemeral").await.expect("exists"));

    service.delete("ephemeral").await.expect("deleted");
    assert!(!service.exists("ephemeral").await.expect("exists"));
    let err = service.load("ephemeral").await.expect_err("gone");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn published_listing_tracks_status_changes() {
    let root = TempDir::new().expect("tempdir");
    let service = service(&root);

    let mut live = Page::new(slug("live"), "Live", "");
    live.publish();
    service.save(&mut live).await.expect("saved");
    let mut draft = Page::new(slug("pending"), "Pending", "");
    service.save(&mut draft).await.expect("saved");

    assert_eq!(service.published().await.expect("published").len(), 1);
    assert_eq!(service.drafts().await.expect("drafts").len(), 1);

    // Flip the published page back to draft; the cached listing must update
    // immediately after the save.
    live.status = PageStatus::Draft;
    service.save(&mut live).await.expect("saved");

    assert_eq!(service.published().await.expect("published").len(), 0);
    assert_eq!(service.drafts().await.expect("drafts").len(), 2);
}

#[tokio::test]
async fn cached_load_does_not_see_out_of_band_edits() {
    let root = TempDir::new().expect("tempdir");
    let service = service(&root);

    let mut page = Page::new(slug("notes"), "First", "one");
    service.save(&mut page).await.expect("saved");
    assert_eq!(service.load("notes").await.expect("loaded").title, "First");

    // Rewrite the backing file without going through the service: the cache
    // still answers, so the stale title is expected until a save flushes it.
    let side_door = FileDriver::new(root.path()).expect("content root");
    let mut edited = Page::new(slug("notes"), "Second", "two");
    side_door.save(&edited).await.expect("saved out of band");

    assert_eq!(service.load("notes").await.expect("loaded").title, "First");

    service.save(&mut edited).await.expect("saved via service");
    assert_eq!(service.load("notes").await.expect("loaded").title, "Second");
}

#[tokio::test]
async fn loaded_listeners_can_rewrite_the_returned_page() {
    let root = TempDir::new().expect("tempdir");
    let service = service(&root);

    service.events().listen(PageEvent::Loaded, |payload| {
        if let Payload::Page(page) = payload {
            let mut page = page.lock().expect("page lock");
            page.title = format!("[reviewed] {}", page.title);
        }
    });

    let mut page = Page::new(slug("guide"), "Guide", "");
    service.save(&mut page).await.expect("saved");

    let loaded = service.load("guide").await.expect("loaded");
    assert_eq!(loaded.title, "[reviewed] Guide");
}

#[tokio::test]
async fn lifecycle_events_fire_in_order() {
    let root = TempDir::new().expect("tempdir");
    let service = service(&root);

    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    for event in [
        PageEvent::Loading,
        PageEvent::Loaded,
        PageEvent::Saving,
        PageEvent::Saved,
    ] {
        let log = Arc::clone(&log);
        service.events().listen(event, move |_| {
            log.lock().expect("log lock").push(event.as_str());
        });
    }

    let mut page = Page::new(slug("walkthrough"), "Walkthrough", "");
    service.save(&mut page).await.expect("saved");
    service.load("walkthrough").await.expect("loaded");

    assert_eq!(
        *log.lock().expect("log lock"),
        vec!["page.saving", "page.saved", "page.loading", "page.loaded"]
    );
}

#[tokio::test]
async fn publish_stamps_and_persists() {
    let root = TempDir::new().expect("tempdir");
    let service = service(&root);

    let mut page = Page::new(slug("launch"), "Launch", "");
    service.save(&mut page).await.expect("saved");

    let published = service.publish("launch").await.expect("published");
    assert_eq!(published.status, PageStatus::Published);
    assert!(published.published_at.is_some());

    let reloaded = service.find("launch").await.expect("reloaded");
    assert_eq!(reloaded.status, PageStatus::Published);
    assert_eq!(
        reloaded.published_at.map(|at| at.unix_timestamp()),
        published.published_at.map(|at| at.unix_timestamp())
    );
}
