//! Thin HTTP surface over the page service.
//!
//! Routing and middleware policy beyond this router (auth, rate limits,
//! asset serving) belong to the deployment in front; these handlers only
//! translate between JSON and the core's operations.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::{
    application::{error::AppError, pages::PageService},
    domain::{entities::Page, slug::Slug, types::PageStatus},
    infra::db,
};

#[derive(Clone)]
pub struct HttpState {
    pub pages: Arc<PageService>,
    pub pool: SqlitePool,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/pages", get(list_published))
        .route("/drafts", get(list_drafts))
        .route(
            "/pages/{slug}",
            put(save_page).get(get_page).delete(delete_page),
        )
        .route("/pages/{slug}/publish", axum::routing::post(publish_page))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct SavePageRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub status: Option<PageStatus>,
    #[serde(default)]
    pub layout: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub meta: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Serialize)]
pub struct PageBody {
    pub slug: String,
    pub title: String,
    pub content: String,
    pub status: PageStatus,
    pub layout: Option<String>,
    pub excerpt: String,
    pub meta: BTreeMap<String, String>,
    pub rendered_html: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
}

impl From<Page> for PageBody {
    fn from(page: Page) -> Self {
        Self {
            slug: page.slug.to_string(),
            excerpt: page.excerpt_or_derived(),
            title: page.title,
            content: page.content,
            status: page.status,
            layout: page.layout,
            meta: page.meta,
            rendered_html: page.rendered_html,
            created_at: page.created_at,
            updated_at: page.updated_at,
            published_at: page.published_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageSummary {
    pub slug: String,
    pub title: String,
    pub status: PageStatus,
    pub excerpt: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
}

impl From<Page> for PageSummary {
    fn from(page: Page) -> Self {
        Self {
            slug: page.slug.to_string(),
            excerpt: page.excerpt_or_derived(),
            title: page.title,
            status: page.status,
            published_at: page.published_at,
        }
    }
}

async fn healthz(State(state): State<HttpState>) -> Result<&'static str, AppError> {
    db::health_check(&state.pool).await?;
    Ok("ok")
}

async fn list_published(
    State(state): State<HttpState>,
) -> Result<Json<Vec<PageSummary>>, AppError> {
    let pages = state.pages.published().await?;
    Ok(Json(pages.into_iter().map(PageSummary::from).collect()))
}

async fn list_drafts(State(state): State<HttpState>) -> Result<Json<Vec<PageSummary>>, AppError> {
    let pages = state.pages.drafts().await?;
    Ok(Json(pages.into_iter().map(PageSummary::from).collect()))
}

async fn get_page(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<Json<PageBody>, AppError> {
    let page = state.pages.load(&slug).await?;
    Ok(Json(page.into()))
}

async fn save_page(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
    Json(request): Json<SavePageRequest>,
) -> Result<(StatusCode, Json<PageBody>), AppError> {
    let (mut page, created) = match state.pages.find(&slug).await {
        Ok(existing) => (existing, false),
        Err(err) if err.is_not_found() => {
            let slug = Slug::new(slug).map_err(crate::domain::error::ContentError::from)?;
            (Page::new(slug, "", ""), true)
        }
        Err(err) => return Err(err.into()),
    };

    page.title = request.title;
    page.content = request.content;
    if let Some(status) = request.status {
        page.status = status;
    }
    page.layout = request.layout;
    page.excerpt = request.excerpt;
    if let Some(meta) = request.meta {
        page.meta = meta;
    }

    state.pages.save(&mut page).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(page.into())))
}

async fn publish_page(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<Json<PageBody>, AppError> {
    let page = state.pages.publish(&slug).await?;
    Ok(Json(page.into()))
}

async fn delete_page(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<StatusCode, AppError> {
    state.pages.delete(&slug).await?;
    Ok(StatusCode::NO_CONTENT)
}
