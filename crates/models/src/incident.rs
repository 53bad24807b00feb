use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::IncidentStatus;

/// A contiguous period during which a monitor is considered down.
///
/// Invariant: at most one OPEN incident per monitor at any time, enforced
/// by the incident engine's per-monitor lock and a partial unique index in
/// the store. Incidents are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    /// Incident ID
    pub id: String,
    /// Monitor the incident belongs to
    pub monitor_id: String,
    /// OPEN or RESOLVED
    pub status: IncidentStatus,
    /// When the outage began (taken from the triggering result)
    pub started_at: DateTime<Utc>,
    /// When the incident was resolved
    pub resolved_at: Option<DateTime<Utc>>,
    /// `resolved_at - started_at`, in seconds
    pub duration_seconds: Option<i64>,
    /// Latest error message reported while the incident was open
    pub error_message: Option<String>,
    /// When a downtime alert was last sent for this incident
    pub last_notified_at: Option<DateTime<Utc>>,
}

impl Incident {
    /// Whether the incident is still open.
    pub fn is_open(&self) -> bool {
        self.status == IncidentStatus::Open
    }
}
