//! Cron job publishing drafts whose scheduled time has arrived.
//!
//! A draft opts in by carrying a `publish_at` meta value in RFC 3339 form;
//! once the timestamp passes, the next tick publishes it through the page
//! service so the usual cache flushes and events fire.

use std::sync::Arc;

use apalis::prelude::{Data, Error as ApalisError};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{info, warn};

use crate::application::pages::PageService;

pub const PUBLISH_AT_META_KEY: &str = "publish_at";

/// Marker struct for the cron tick.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron.
#[derive(Default, Debug, Clone)]
pub struct PublishDueTick;

impl From<chrono::DateTime<chrono::Utc>> for PublishDueTick {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

#[derive(Clone)]
pub struct PublishDueContext {
    pub pages: Arc<PageService>,
}

pub async fn process_publish_due_job(
    _tick: PublishDueTick,
    ctx: Data<PublishDueContext>,
) -> Result<(), ApalisError> {
    let drafts = match ctx.pages.drafts().await {
        Ok(drafts) => drafts,
        Err(err) => {
            warn!(error = %err, "scheduled publish scan failed");
            return Ok(());
        }
    };

    let now = OffsetDateTime::now_utc();
    let mut published = 0usize;
    for draft in drafts {
        let Some(raw) = draft.meta.get(PUBLISH_AT_META_KEY) else {
            continue;
        };
        let due = match OffsetDateTime::parse(raw, &Rfc3339) {
            Ok(due) => due,
            Err(err) => {
                warn!(slug = %draft.slug, value = raw, error = %err, "unparseable publish_at, skipping");
                continue;
            }
        };
        if due > now {
            continue;
        }
        match ctx.pages.publish(draft.slug.as_str()).await {
            Ok(_) => published += 1,
            Err(err) => warn!(slug = %draft.slug, error = %err, "scheduled publish failed"),
        }
    }

    if published > 0 {
        info!(published, "published scheduled pages");
    }
    Ok(())
}
