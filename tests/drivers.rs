//! Driver polymorphism: upserts, hybrid fallback, and the auto threshold.

use std::sync::Arc;

use sqlx::SqlitePool;
use tempfile::TempDir;

use quire::content::{
    AutoDriver, ContentDriver, DbDriver, FileDriver, HybridDriver, PageFilter, migrate,
};
use quire::domain::entities::Page;
use quire::domain::slug::Slug;
use quire::infra::db;

fn slug(raw: &str) -> Slug {
    Slug::new(raw).expect("valid slug")
}

async fn test_pool(dir: &TempDir) -> SqlitePool {
    let url = format!("sqlite://{}", dir.path().join("pages.db").display());
    let pool = db::connect(&url, 2).await.expect("pool connects");
    db::run_migrations(&pool).await.expect("migrations run");
    pool
}

#[tokio::test]
async fn db_driver_save_is_an_upsert() {
    let dir = TempDir::new().expect("tempdir");
    let driver = DbDriver::new(test_pool(&dir).await);

    let mut page = Page::new(slug("about"), "First title", "body");
    driver.save(&page).await.expect("insert");
    page.title = "Second title".to_string();
    driver.save(&page).await.expect("update");

    let all = driver.list(&PageFilter::any()).await.expect("list");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].title, "Second title");
    assert_eq!(driver.count().await.expect("count"), 1);
}

#[tokio::test]
async fn db_driver_load_missing_is_not_found() {
    let dir = TempDir::new().expect("tempdir");
    let driver = DbDriver::new(test_pool(&dir).await);

    let err = driver.load(&slug("ghost")).await.expect_err("missing");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn hybrid_writes_to_both_backends() {
    let dir = TempDir::new().expect("tempdir");
    let content = TempDir::new().expect("tempdir");
    let file = Arc::new(FileDriver::new(content.path()).expect("content root"));
    let db_driver = Arc::new(DbDriver::new(test_pool(&dir).await));
    let hybrid = HybridDriver::new(Arc::clone(&file), Arc::clone(&db_driver));

    let page = Page::new(slug("dual"), "Dual", "body");
    hybrid.save(&page).await.expect("saved");

    assert!(file.exists(&page.slug).await.expect("file side"));
    assert!(db_driver.exists(&page.slug).await.expect("db side"));
}

#[tokio::test]
async fn hybrid_falls_back_to_file_when_db_row_vanishes() {
    let dir = TempDir::new().expect("tempdir");
    let content = TempDir::new().expect("tempdir");
    let pool = test_pool(&dir).await;
    let file = Arc::new(FileDriver::new(content.path()).expect("content root"));
    let db_driver = Arc::new(DbDriver::new(pool.clone()));
    let hybrid = HybridDriver::new(Arc::clone(&file), Arc::clone(&db_driver));

    let page = Page::new(slug("resilient"), "Resilient", "body");
    hybrid.save(&page).await.expect("saved");

    // Remove the database row out of band; the file copy is the durable
    // source of truth and must still serve the read.
    sqlx::query("DELETE FROM pages WHERE slug = ?")
        .bind("resilient")
        .execute(&pool)
        .await
        .expect("row removed");

    let loaded = hybrid.load(&page.slug).await.expect("file fallback");
    assert_eq!(loaded.title, "Resilient");
}

#[tokio::test]
async fn hybrid_list_includes_unmigrated_file_pages() {
    let dir = TempDir::new().expect("tempdir");
    let content = TempDir::new().expect("tempdir");
    let file = Arc::new(FileDriver::new(content.path()).expect("content root"));
    let db_driver = Arc::new(DbDriver::new(test_pool(&dir).await));
    let hybrid = HybridDriver::new(Arc::clone(&file), Arc::clone(&db_driver));

    // One page only in files (pre-migration), one written through hybrid.
    file.save(&Page::new(slug("legacy"), "Legacy", ""))
        .await
        .expect("file-only page");
    hybrid
        .save(&Page::new(slug("modern"), "Modern", ""))
        .await
        .expect("hybrid page");

    let listed = hybrid.list(&PageFilter::any()).await.expect("list");
    let slugs: Vec<&str> = listed.iter().map(|page| page.slug.as_str()).collect();
    assert_eq!(slugs, vec!["legacy", "modern"]);
}

#[tokio::test]
async fn auto_routes_through_hybrid_once_threshold_is_reached() {
    let dir = TempDir::new().expect("tempdir");
    let content = TempDir::new().expect("tempdir");
    let pool = test_pool(&dir).await;
    let file = Arc::new(FileDriver::new(content.path()).expect("content root"));
    let db_driver = Arc::new(DbDriver::new(pool.clone()));
    let auto = AutoDriver::new(Arc::clone(&file), Arc::clone(&db_driver), 2);

    auto.save(&Page::new(slug("one"), "One", ""))
        .await
        .expect("saved");
    auto.save(&Page::new(slug("two"), "Two", ""))
        .await
        .expect("saved");

    // Below the threshold nothing lands in the database.
    assert_eq!(db_driver.count().await.expect("count"), 0);

    // The third save sees count >= threshold and goes through hybrid.
    auto.save(&Page::new(slug("three"), "Three", ""))
        .await
        .expect("saved");
    assert!(db_driver.exists(&slug("three")).await.expect("db side"));
    assert!(!db_driver.exists(&slug("one")).await.expect("db side"));

    // Reads of pre-threshold pages still work via hybrid's file fallback,
    // and listings cover the whole catalogue.
    let loaded = auto.load(&slug("one")).await.expect("loaded");
    assert_eq!(loaded.title, "One");
    assert_eq!(auto.list(&PageFilter::any()).await.expect("list").len(), 3);
}

#[tokio::test]
async fn explicit_migration_copies_file_pages_into_db() {
    let dir = TempDir::new().expect("tempdir");
    let content = TempDir::new().expect("tempdir");
    let file = FileDriver::new(content.path()).expect("content root");
    let db_driver = DbDriver::new(test_pool(&dir).await);

    for name in ["a", "b", "c"] {
        file.save(&Page::new(slug(name), name.to_uppercase(), ""))
            .await
            .expect("saved");
    }

    let report = migrate::copy_file_pages_to_db(&file, &db_driver)
        .await
        .expect("migrated");
    assert_eq!(report.copied, 3);
    assert_eq!(db_driver.count().await.expect("count"), 3);

    // Re-running is safe: saves are upserts.
    let rerun = migrate::copy_file_pages_to_db(&file, &db_driver)
        .await
        .expect("migrated again");
    assert_eq!(rerun.copied, 3);
    assert_eq!(db_driver.count().await.expect("count"), 3);
}
