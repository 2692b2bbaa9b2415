//! Cron job pruning expired entries from the durable file cache.
//!
//! Expired entries are otherwise only removed lazily on read, so a cache
//! with cold keys would grow without bound.

use std::sync::Arc;

use apalis::prelude::{Data, Error as ApalisError};
use tracing::info;

use crate::cache::FileCache;

/// Marker struct for the cron tick.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron.
#[derive(Default, Debug, Clone)]
pub struct CachePruneTick;

impl From<chrono::DateTime<chrono::Utc>> for CachePruneTick {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

#[derive(Clone)]
pub struct CachePruneContext {
    pub cache: Arc<FileCache>,
}

pub async fn process_cache_prune_job(
    _tick: CachePruneTick,
    ctx: Data<CachePruneContext>,
) -> Result<(), ApalisError> {
    let removed = ctx.cache.prune().await;
    if removed > 0 {
        info!(removed, "pruned expired cache entries");
    }
    Ok(())
}
