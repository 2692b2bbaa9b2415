//! Explicit file→database content migration.
//!
//! The auto driver never migrates existing content on its own; this copy is
//! run deliberately (`quire migrate`) before a site expects the database
//! backend to serve its full catalogue.

use tracing::info;

use crate::domain::error::ContentError;

use super::{ContentDriver, DbDriver, FileDriver, PageFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    /// Pages copied into the database (upserts, so re-runs are safe).
    pub copied: usize,
}

/// Upsert every file-stored page into the database.
pub async fn copy_file_pages_to_db(
    file: &FileDriver,
    db: &DbDriver,
) -> Result<MigrationReport, ContentError> {
    let pages = file.list(&PageFilter::any()).await?;
    for page in &pages {
        db.save(page).await?;
        info!(slug = %page.slug, "migrated page to database");
    }
    Ok(MigrationReport {
        copied: pages.len(),
    })
}
