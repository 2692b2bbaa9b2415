//! Dual-backend content driver.
//!
//! Writes go to both the database and the file store; reads prefer the
//! database and fall back to the file copy. The file copy is the durable
//! source of truth for records not yet present in the database; that
//! directionality is what makes the auto driver's one-way migration safe.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{entities::Page, error::ContentError, slug::Slug};

use super::{ContentDriver, DbDriver, FileDriver, PageFilter};

pub struct HybridDriver {
    file: Arc<FileDriver>,
    db: Arc<DbDriver>,
}

impl HybridDriver {
    pub fn new(file: Arc<FileDriver>, db: Arc<DbDriver>) -> Self {
        Self { file, db }
    }
}

#[async_trait]
impl ContentDriver for HybridDriver {
    async fn exists(&self, slug: &Slug) -> Result<bool, ContentError> {
        if self.db.exists(slug).await? {
            return Ok(true);
        }
        self.file.exists(slug).await
    }

    async fn load(&self, slug: &Slug) -> Result<Page, ContentError> {
        match self.db.load(slug).await {
            Ok(page) => Ok(page),
            Err(err) if err.is_not_found() => self.file.load(slug).await,
            Err(err) => Err(err),
        }
    }

    async fn save(&self, page: &Page) -> Result<(), ContentError> {
        // Database first: readers prefer it, so they see the new revision
        // even if the file write below fails and the save is retried.
        self.db.save(page).await?;
        self.file.save(page).await
    }

    async fn delete(&self, slug: &Slug) -> Result<(), ContentError> {
        self.db.delete(slug).await?;
        self.file.delete(slug).await
    }

    async fn list(&self, filter: &PageFilter) -> Result<Vec<Page>, ContentError> {
        let db_pages = self.db.list(filter).await?;
        let db_slugs: BTreeSet<String> = self.db.slugs().await?.into_iter().collect();

        // File-only pages (not yet migrated) still belong in listings; any
        // slug the database knows about is represented by its database row.
        let mut pages = db_pages;
        for page in self.file.list(filter).await? {
            if !db_slugs.contains(page.slug.as_str()) {
                pages.push(page);
            }
        }
        pages.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(pages)
    }
}
