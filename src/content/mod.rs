//! Content storage drivers.
//!
//! One capability set ([`ContentDriver`]), four backends:
//!
//! - [`FileDriver`]: one front-matter file per slug under a content root.
//! - [`DbDriver`]: a `pages` row per slug, upsert on save.
//! - [`HybridDriver`]: dual-writes to both, reads prefer the database and
//!   fall back to the file copy.
//! - [`AutoDriver`]: delegates to File below a page-count threshold and to
//!   Hybrid at or above it.
//!
//! Hybrid and Auto compose the simpler drivers rather than re-implement
//! storage logic.

mod auto;
mod db;
mod file;
mod frontmatter;
mod hybrid;
pub mod migrate;

pub use auto::AutoDriver;
pub use db::DbDriver;
pub use file::FileDriver;
pub use hybrid::HybridDriver;

use async_trait::async_trait;

use crate::domain::{entities::Page, error::ContentError, slug::Slug, types::PageStatus};

/// Equality filters for `list`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageFilter {
    pub status: Option<PageStatus>,
}

impl PageFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn published() -> Self {
        Self {
            status: Some(PageStatus::Published),
        }
    }

    pub fn drafts() -> Self {
        Self {
            status: Some(PageStatus::Draft),
        }
    }

    pub fn matches(&self, page: &Page) -> bool {
        self.status.is_none_or(|status| page.status == status)
    }
}

/// Storage backend for pages, keyed by slug.
///
/// `load` of an absent slug is [`ContentError::NotFound`], never an empty
/// page. An unreachable underlying store is [`ContentError::StorageUnavailable`].
/// `save` has upsert semantics; `delete` is idempotent. `list` returns pages
/// ordered by slug.
#[async_trait]
pub trait ContentDriver: Send + Sync {
    async fn exists(&self, slug: &Slug) -> Result<bool, ContentError>;

    async fn load(&self, slug: &Slug) -> Result<Page, ContentError>;

    async fn save(&self, page: &Page) -> Result<(), ContentError>;

    async fn delete(&self, slug: &Slug) -> Result<(), ContentError>;

    async fn list(&self, filter: &PageFilter) -> Result<Vec<Page>, ContentError>;
}
