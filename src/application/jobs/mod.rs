//! Cron-driven background work.
//!
//! Workers are registered on an apalis monitor backed by in-process cron
//! streams; each tick is a unit struct carrying no payload.

mod cache;
mod publish;

pub use cache::{CachePruneContext, CachePruneTick, process_cache_prune_job};
pub use publish::{
    PUBLISH_AT_META_KEY, PublishDueContext, PublishDueTick, process_publish_due_job,
};

use std::str::FromStr;
use std::time::Duration;

use apalis_cron::Schedule;

/// Build a cron schedule firing roughly every `cadence`.
///
/// Sub-minute cadences map to a seconds step; anything longer is rounded to
/// whole minutes (capped at hourly, the coarsest cadence the jobs need).
pub fn schedule_every(cadence: Duration) -> Schedule {
    let secs = cadence.as_secs().max(1);
    let expr = if secs < 60 {
        format!("*/{secs} * * * * *")
    } else {
        format!("0 */{} * * * *", (secs / 60).min(59))
    };
    Schedule::from_str(&expr).expect("generated cron expression is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_minute_cadence_uses_a_seconds_step() {
        let schedule = schedule_every(Duration::from_secs(15));
        let upcoming: Vec<_> = schedule.upcoming(chrono::Utc).take(2).collect();
        assert_eq!(upcoming.len(), 2);
        let gap = upcoming[1] - upcoming[0];
        assert!(gap.num_seconds() <= 15);
    }

    #[test]
    fn minute_cadence_rounds_to_whole_minutes() {
        let schedule = schedule_every(Duration::from_secs(300));
        let upcoming: Vec<_> = schedule.upcoming(chrono::Utc).take(2).collect();
        let gap = upcoming[1] - upcoming[0];
        assert_eq!(gap.num_seconds() % 60, 0);
    }

    #[test]
    fn zero_cadence_is_clamped() {
        let schedule = schedule_every(Duration::from_secs(0));
        assert!(schedule.upcoming(chrono::Utc).next().is_some());
    }
}
