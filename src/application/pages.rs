//! Page orchestration: cached, observable CRUD over a content driver.
//!
//! Caching is cache-aside (reads populate lazily, writes invalidate by
//! tag) because content reads vastly outnumber writes. Driver errors propagate
//! unchanged; cache errors never do (the cache layer absorbs them).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::OffsetDateTime;
use tracing::debug;

use crate::application::events::{EventDispatcher, PageEvent, Payload};
use crate::application::render::Parser;
use crate::cache::TagCache;
use crate::content::{ContentDriver, PageFilter};
use crate::domain::{entities::Page, error::ContentError, slug::Slug};
use crate::util::lock::lock_guard;

/// Every cached page entry carries this tag; flushing it empties the page
/// cache wholesale.
pub const TAG_PAGES: &str = "pages";
/// The cached published-pages listing.
pub const TAG_PUBLISHED: &str = "pages:published";
/// The cached drafts listing.
pub const TAG_DRAFTS: &str = "pages:drafts";

fn page_key(slug: &Slug) -> String {
    format!("page:{slug}")
}

fn page_tag(slug: &Slug) -> String {
    format!("page:{slug}")
}

pub struct PageService {
    driver: Arc<dyn ContentDriver>,
    cache: TagCache,
    events: Arc<EventDispatcher>,
    parser: Arc<dyn Parser>,
    page_ttl: Option<Duration>,
}

impl PageService {
    pub fn new(
        driver: Arc<dyn ContentDriver>,
        cache: TagCache,
        events: Arc<EventDispatcher>,
        parser: Arc<dyn Parser>,
        page_ttl: Option<Duration>,
    ) -> Self {
        Self {
            driver,
            cache,
            events,
            parser,
            page_ttl,
        }
    }

    pub fn events(&self) -> &Arc<EventDispatcher> {
        &self.events
    }

    /// Load a page, rendered, through the cache.
    ///
    /// `Loaded` listeners receive the page behind a shared lock and may
    /// mutate it in place; the (possibly modified) page is what the caller
    /// gets back.
    pub async fn load(&self, slug: &str) -> Result<Page, ContentError> {
        let slug = Slug::new(slug)?;
        self.events
            .dispatch(PageEvent::Loading, &Payload::Slug(slug.to_string()));

        let key = page_key(&slug);
        let tag = page_tag(&slug);
        let page = self
            .cache
            .remember(&[TAG_PAGES, &tag], &key, self.page_ttl, || async {
                let mut page = self.driver.load(&slug).await?;
                page.rendered_html = Some(self.parser.parse(&page.content));
                Ok::<Page, ContentError>(page)
            })
            .await?;

        let shared = Arc::new(Mutex::new(page));
        self.events
            .dispatch(PageEvent::Loaded, &Payload::Page(Arc::clone(&shared)));

        let page = match Arc::try_unwrap(shared) {
            Ok(mutex) => mutex
                .into_inner()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
            // A listener kept a handle; fall back to cloning the current state.
            Err(shared) => lock_guard(&shared, "load").clone(),
        };
        Ok(page)
    }

    /// Persist a page and invalidate everything it could have staled.
    pub async fn save(&self, page: &mut Page) -> Result<(), ContentError> {
        self.events
            .dispatch(PageEvent::Saving, &Payload::Slug(page.slug.to_string()));

        page.updated_at = OffsetDateTime::now_utc();
        self.driver.save(page).await?;

        self.flush_for(&page.slug).await;
        self.events
            .dispatch(PageEvent::Saved, &Payload::Slug(page.slug.to_string()));
        Ok(())
    }

    pub async fn delete(&self, slug: &str) -> Result<(), ContentError> {
        let slug = Slug::new(slug)?;
        self.driver.delete(&slug).await?;
        self.flush_for(&slug).await;
        Ok(())
    }

    /// Published pages, cached under their own tag so any save or delete
    /// invalidates the listing.
    pub async fn published(&self) -> Result<Vec<Page>, ContentError> {
        self.cache
            .remember(
                &[TAG_PAGES, TAG_PUBLISHED],
                "pages:published",
                self.page_ttl,
                || async { self.driver.list(&PageFilter::published()).await },
            )
            .await
    }

    pub async fn drafts(&self) -> Result<Vec<Page>, ContentError> {
        self.cache
            .remember(
                &[TAG_PAGES, TAG_DRAFTS],
                "pages:drafts",
                self.page_ttl,
                || async { self.driver.list(&PageFilter::drafts()).await },
            )
            .await
    }

    /// Direct driver passthrough, never cached; a stale existence check
    /// would gate creation flows on deleted pages.
    pub async fn exists(&self, slug: &str) -> Result<bool, ContentError> {
        let slug = Slug::new(slug)?;
        self.driver.exists(&slug).await
    }

    /// Uncached driver read of the raw page, for editing flows.
    pub async fn find(&self, slug: &str) -> Result<Page, ContentError> {
        let slug = Slug::new(slug)?;
        self.driver.load(&slug).await
    }

    /// Draft → published transition; records `published_at` and persists.
    pub async fn publish(&self, slug: &str) -> Result<Page, ContentError> {
        let mut page = self.find(slug).await?;
        page.publish();
        self.save(&mut page).await?;
        Ok(page)
    }

    async fn flush_for(&self, slug: &Slug) {
        let tag = page_tag(slug);
        self.cache
            .flush(&[&tag, TAG_PUBLISHED, TAG_DRAFTS])
            .await;
        debug!(slug = %slug, "flushed page cache tags");
    }
}
