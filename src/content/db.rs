//! Database-backed content driver.
//!
//! Pages are rows keyed by unique slug; `save` is an upsert. Filters are
//! assembled with a `QueryBuilder` so new equality filters stay cheap to add.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use time::OffsetDateTime;

use crate::domain::{entities::Page, error::ContentError, slug::Slug, types::PageStatus};

use super::{ContentDriver, PageFilter};

const PAGE_COLUMNS: &str = "slug, title, content, status, layout, excerpt, meta, \
     published_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct PageRow {
    slug: String,
    title: String,
    content: String,
    status: PageStatus,
    layout: Option<String>,
    excerpt: Option<String>,
    meta: String,
    published_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<PageRow> for Page {
    type Error = ContentError;

    fn try_from(row: PageRow) -> Result<Self, Self::Error> {
        let slug = Slug::new(row.slug)?;
        let meta: BTreeMap<String, String> = serde_json::from_str(&row.meta)
            .map_err(|err| ContentError::unavailable(format!("malformed meta payload: {err}")))?;
        Ok(Page {
            slug,
            title: row.title,
            content: row.content,
            status: row.status,
            layout: row.layout,
            excerpt: row.excerpt,
            meta,
            created_at: row.created_at,
            updated_at: row.updated_at,
            published_at: row.published_at,
            rendered_html: None,
        })
    }
}

#[derive(Clone)]
pub struct DbDriver {
    pool: SqlitePool,
}

impl DbDriver {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Total row count; the auto driver's threshold input.
    pub async fn count(&self) -> Result<u64, ContentError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pages")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(count as u64)
    }

    /// Every slug currently present, in slug order.
    pub async fn slugs(&self) -> Result<Vec<String>, ContentError> {
        sqlx::query_scalar("SELECT slug FROM pages ORDER BY slug")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)
    }
}

#[async_trait]
impl ContentDriver for DbDriver {
    async fn exists(&self, slug: &Slug) -> Result<bool, ContentError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM pages WHERE slug = ?")
            .bind(slug.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(found.is_some())
    }

    async fn load(&self, slug: &Slug) -> Result<Page, ContentError> {
        let sql = format!("SELECT {PAGE_COLUMNS} FROM pages WHERE slug = ?");
        let row: Option<PageRow> = sqlx::query_as(&sql)
            .bind(slug.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.ok_or_else(|| ContentError::not_found(slug.as_str()))?
            .try_into()
    }

    async fn save(&self, page: &Page) -> Result<(), ContentError> {
        let meta = serde_json::to_string(&page.meta)
            .map_err(|err| ContentError::validation("meta", err.to_string()))?;

        sqlx::query(
            "INSERT INTO pages (slug, title, content, status, layout, excerpt, meta, \
                                published_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(slug) DO UPDATE SET \
                 title = excluded.title, \
                 content = excluded.content, \
                 status = excluded.status, \
                 layout = excluded.layout, \
                 excerpt = excluded.excerpt, \
                 meta = excluded.meta, \
                 published_at = excluded.published_at, \
                 updated_at = excluded.updated_at",
        )
        .bind(page.slug.as_str())
        .bind(&page.title)
        .bind(&page.content)
        .bind(page.status)
        .bind(&page.layout)
        .bind(&page.excerpt)
        .bind(meta)
        .bind(page.published_at)
        .bind(page.created_at)
        .bind(page.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn delete(&self, slug: &Slug) -> Result<(), ContentError> {
        sqlx::query("DELETE FROM pages WHERE slug = ?")
            .bind(slug.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn list(&self, filter: &PageFilter) -> Result<Vec<Page>, ContentError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {PAGE_COLUMNS} FROM pages WHERE 1=1 "));

        if let Some(status) = filter.status {
            qb.push("AND status = ");
            qb.push_bind(status);
        }

        qb.push(" ORDER BY slug");

        let rows: Vec<PageRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        rows.into_iter().map(Page::try_from).collect()
    }
}

pub(super) fn db_error(err: sqlx::Error) -> ContentError {
    ContentError::unavailable(format!("database error: {err}"))
}
