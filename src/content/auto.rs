//! Size-triggered backend selection.
//!
//! Below the configured page-count threshold every operation delegates to
//! the file driver; at or above it, to the hybrid driver. The count is
//! re-queried on every decision point rather than memoized: migration is a
//! one-way event expected to happen once in a site's lifetime, and the
//! hybrid driver's file fallback means a racy decision near the boundary
//! never loses a read.
//!
//! Crossing the threshold does not retroactively migrate file-only content;
//! run the explicit migration (`quire migrate`) to copy existing pages into
//! the database.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{entities::Page, error::ContentError, slug::Slug};

use super::{ContentDriver, DbDriver, FileDriver, HybridDriver, PageFilter};

pub struct AutoDriver {
    file: Arc<FileDriver>,
    db: Arc<DbDriver>,
    hybrid: HybridDriver,
    threshold: u64,
}

impl AutoDriver {
    pub fn new(file: Arc<FileDriver>, db: Arc<DbDriver>, threshold: u64) -> Self {
        let hybrid = HybridDriver::new(Arc::clone(&file), Arc::clone(&db));
        Self {
            file,
            db,
            hybrid,
            threshold,
        }
    }

    /// Pick the backing driver for this operation.
    ///
    /// The site's page total is whichever store currently knows about more
    /// pages: before migration every page lives in files, after it the
    /// database count catches up (hybrid writes land in both).
    async fn active(&self) -> Result<&dyn ContentDriver, ContentError> {
        let count = self.db.count().await?.max(self.file.count().await?);
        if count >= self.threshold {
            debug!(count, threshold = self.threshold, backend = "hybrid", "auto driver decision");
            Ok(&self.hybrid)
        } else {
            debug!(count, threshold = self.threshold, backend = "file", "auto driver decision");
            Ok(self.file.as_ref())
        }
    }
}

#[async_trait]
impl ContentDriver for AutoDriver {
    async fn exists(&self, slug: &Slug) -> Result<bool, ContentError> {
        self.active().await?.exists(slug).await
    }

    async fn load(&self, slug: &Slug) -> Result<Page, ContentError> {
        self.active().await?.load(slug).await
    }

    async fn save(&self, page: &Page) -> Result<(), ContentError> {
        self.active().await?.save(page).await
    }

    async fn delete(&self, slug: &Slug) -> Result<(), ContentError> {
        self.active().await?.delete(slug).await
    }

    async fn list(&self, filter: &PageFilter) -> Result<Vec<Page>, ContentError> {
        self.active().await?.list(filter).await
    }
}
