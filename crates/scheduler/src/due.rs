//! Due-ness predicate for monitors.

use chrono::{DateTime, Duration, Utc};
use models::Monitor;

/// Whether `monitor` should be checked at `now`.
///
/// A monitor is due when it is active, not soft-deleted, and either has
/// never been checked or its own interval has elapsed since the last check.
/// There is no global staleness cutoff: a 60-minute monitor is due once an
/// hour, nothing more.
pub fn is_due(monitor: &Monitor, now: DateTime<Utc>) -> bool {
    if !monitor.is_active || monitor.is_deleted {
        return false;
    }
    match monitor.last_checked_at {
        None => true,
        Some(last) => now - last >= Duration::minutes(i64::from(monitor.interval)),
    }
}
