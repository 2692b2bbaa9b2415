//! The page entity mirrored across every storage backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::{slug::Slug, types::PageStatus};

const DERIVED_EXCERPT_MAX_CHARS: usize = 200;

/// A single page of content.
///
/// `rendered_html` is a transient cache of the parsed body: drivers never
/// persist it (the file codec and the database row map fields explicitly),
/// but cache snapshots carry it so a cache hit skips re-parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub slug: Slug,
    pub title: String,
    pub content: String,
    pub status: PageStatus,
    pub layout: Option<String>,
    pub excerpt: Option<String>,
    pub meta: BTreeMap<String, String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub published_at: Option<OffsetDateTime>,
    pub rendered_html: Option<String>,
}

impl Page {
    /// Construct a fresh draft with current timestamps.
    pub fn new(slug: Slug, title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            slug,
            title: title.into(),
            content: content.into(),
            status: PageStatus::Draft,
            layout: None,
            excerpt: None,
            meta: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            published_at: None,
            rendered_html: None,
        }
    }

    /// Transition to published, stamping `published_at` exactly once.
    ///
    /// Direct status reassignment stays possible and deliberately does not
    /// touch `published_at`; only this transition records the timestamp.
    pub fn publish(&mut self) {
        if self.status != PageStatus::Published {
            self.status = PageStatus::Published;
            self.published_at = Some(OffsetDateTime::now_utc());
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == PageStatus::Published
    }

    /// The stored excerpt, or one derived from the first non-empty content
    /// line (heading markers stripped, truncated on a char boundary).
    pub fn excerpt_or_derived(&self) -> String {
        if let Some(excerpt) = &self.excerpt {
            return excerpt.clone();
        }
        let line = self
            .content
            .lines()
            .map(|line| line.trim_start_matches('#').trim())
            .find(|line| !line.is_empty())
            .unwrap_or_default();
        match line.char_indices().nth(DERIVED_EXCERPT_MAX_CHARS) {
            Some((byte_index, _)) => line[..byte_index].to_string(),
            None => line.to_string(),
        }
    }
}
