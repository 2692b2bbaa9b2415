//! The on-disk page format: TOML front matter between `+++` fences, a blank
//! line, then the raw content body.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::{entities::Page, error::ContentError, slug::Slug, types::PageStatus};

const FENCE: &str = "+++";

/// Persisted page metadata. `rendered_html` is deliberately absent: the
/// parsed body is a transient cache, never written to disk.
#[derive(Debug, Serialize, Deserialize)]
struct FrontMatter {
    title: String,
    status: PageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    layout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    excerpt: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    published_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    meta: BTreeMap<String, String>,
}

pub(super) fn encode(page: &Page) -> Result<String, ContentError> {
    let front = FrontMatter {
        title: page.title.clone(),
        status: page.status,
        layout: page.layout.clone(),
        excerpt: page.excerpt.clone(),
        created_at: page.created_at,
        updated_at: page.updated_at,
        published_at: page.published_at,
        meta: page.meta.clone(),
    };
    let header = toml::to_string(&front)
        .map_err(|err| ContentError::validation("front_matter", err.to_string()))?;
    Ok(format!("{FENCE}\n{header}{FENCE}\n\n{}", page.content))
}

pub(super) fn decode(slug: &Slug, raw: &str) -> Result<Page, ContentError> {
    let rest = raw
        .strip_prefix(FENCE)
        .and_then(|rest| rest.strip_prefix('\n'))
        .ok_or_else(|| ContentError::validation("front_matter", "missing opening fence"))?;
    let (header, body) = rest
        .split_once("+++\n")
        .ok_or_else(|| ContentError::validation("front_matter", "missing closing fence"))?;
    let front: FrontMatter = toml::from_str(header)
        .map_err(|err| ContentError::validation("front_matter", err.to_string()))?;

    Ok(Page {
        slug: slug.clone(),
        title: front.title,
        content: body.strip_prefix('\n').unwrap_or(body).to_string(),
        status: front.status,
        layout: front.layout,
        excerpt: front.excerpt,
        meta: front.meta,
        created_at: front.created_at,
        updated_at: front.updated_at,
        published_at: front.published_at,
        rendered_html: None,
    })
}
