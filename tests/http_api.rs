//! The HTTP surface as a consumer of the page service.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header::CONTENT_TYPE},
};
use tempfile::TempDir;
use tower::ServiceExt;

use quire::application::events::EventDispatcher;
use quire::application::pages::PageService;
use quire::application::render::MarkdownParser;
use quire::cache::{MemoryCache, TagCache};
use quire::content::{ContentDriver, FileDriver};
use quire::infra::db;
use quire::infra::http::{HttpState, build_router};

async fn test_router(root: &TempDir, db_dir: &TempDir) -> Router {
    let url = format!("sqlite://{}", db_dir.path().join("quire.db").display());
    let pool = db::connect(&url, 2).await.expect("pool connects");
    db::run_migrations(&pool).await.expect("migrations run");

    let driver: Arc<dyn ContentDriver> =
        Arc::new(FileDriver::new(root.path()).expect("content root"));
    let pages = Arc::new(PageService::new(
        driver,
        TagCache::new(Arc::new(MemoryCache::new())),
        Arc::new(EventDispatcher::new()),
        Arc::new(MarkdownParser::new()),
        None,
    ));
    build_router(HttpState { pages, pool })
}

fn put_page(slug: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(format!("/pages/{slug}"))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn put_then_get_roundtrip() {
    let root = TempDir::new().expect("tempdir");
    let db_dir = TempDir::new().expect("tempdir");
    let router = test_router(&root, &db_dir).await;

    let created = router
        .clone()
        .oneshot(put_page(
            "handbook",
            &serde_json::json!({"title": "Handbook", "content": "# Handbook"}),
        ))
        .await
        .expect("response");
    assert_eq!(created.status(), StatusCode::CREATED);

    let response = router
        .clone()
        .oneshot(get("/pages/handbook"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["slug"], "handbook");
    assert_eq!(body["title"], "Handbook");
    assert_eq!(body["status"], "draft");
    assert!(
        body["rendered_html"]
            .as_str()
            .expect("rendered html")
            .contains("<h1>")
    );
}

#[tokio::test]
async fn updating_an_existing_page_returns_ok() {
    let root = TempDir::new().expect("tempdir");
    let db_dir = TempDir::new().expect("tempdir");
    let router = test_router(&root, &db_dir).await;

    let first = router
        .clone()
        .oneshot(put_page(
            "notes",
            &serde_json::json!({"title": "v1", "content": ""}),
        ))
        .await
        .expect("response");
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = router
        .clone()
        .oneshot(put_page(
            "notes",
            &serde_json::json!({"title": "v2", "content": ""}),
        ))
        .await
        .expect("response");
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(json_body(second).await["title"], "v2");
}

#[tokio::test]
async fn missing_page_is_404() {
    let root = TempDir::new().expect("tempdir");
    let db_dir = TempDir::new().expect("tempdir");
    let router = test_router(&root, &db_dir).await;

    let response = router
        .oneshot(get("/pages/ghost"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn publish_endpoint_moves_page_between_listings() {
    let root = TempDir::new().expect("tempdir");
    let db_dir = TempDir::new().expect("tempdir");
    let router = test_router(&root, &db_dir).await;

    router
        .clone()
        .oneshot(put_page(
            "launch",
            &serde_json::json!({"title": "Launch", "content": ""}),
        ))
        .await
        .expect("response");

    let drafts = json_body(
        router
            .clone()
            .oneshot(get("/drafts"))
            .await
            .expect("response"),
    )
    .await;
    assert_eq!(drafts.as_array().expect("array").len(), 1);

    let published = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/pages/launch/publish")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(published.status(), StatusCode::OK);
    let body = json_body(published).await;
    assert_eq!(body["status"], "published");
    assert!(body["published_at"].is_string());

    let listed = json_body(
        router
            .clone()
            .oneshot(get("/pages"))
            .await
            .expect("response"),
    )
    .await;
    assert_eq!(listed.as_array().expect("array").len(), 1);
    assert_eq!(
        json_body(router.oneshot(get("/drafts")).await.expect("response"))
            .await
            .as_array()
            .expect("array")
            .len(),
        0
    );
}

#[tokio::test]
async fn delete_then_get_is_404() {
    let root = TempDir::new().expect("tempdir");
    let db_dir = TempDir::new().expect("tempdir");
    let router = test_router(&root, &db_dir).await;

    router
        .clone()
        .oneshot(put_page(
            "brief",
            &serde_json::json!({"title": "Brief", "content": ""}),
        ))
        .await
        .expect("response");

    let deleted = router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/pages/brief")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let response = router.oneshot(get("/pages/brief")).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
