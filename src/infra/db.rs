//! SQLite pool bootstrap and embedded schema migrations.

use std::str::FromStr;
use std::time::Duration;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

use super::error::InfraError;

/// Open a pool against a `sqlite://` URL, creating the database file when
/// missing. WAL mode keeps concurrent reader processes out of each other's
/// way, matching the shared-store model of the file backends.
pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool, InfraError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), InfraError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn health_check(pool: &SqlitePool) -> Result<(), InfraError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
