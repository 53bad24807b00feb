use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    monitor::Monitor,
    types::{HttpMethod, MonitorStatus, Region},
};

/// One scheduled check of one monitor from one region.
///
/// Ephemeral: produced by the scheduler, consumed by a probe worker. The
/// transport may deliver it more than once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckJob {
    /// Monitor being checked
    pub monitor_id: String,
    /// Region this job is assigned to
    pub region: Region,
    /// Target URL
    pub url: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Status codes considered UP
    pub expected_status_codes: Vec<u16>,
    /// Hard timeout in seconds
    pub timeout: u64,
    /// Retry budget (only used when the retry strategy is enabled)
    pub retries: u32,
    /// Optional extra request headers
    pub headers: Option<BTreeMap<String, String>>,
    /// Optional request body
    pub body: Option<String>,
}

impl CheckJob {
    /// Build the job for `monitor` as seen from `region`.
    pub fn for_monitor(monitor: &Monitor, region: Region) -> Self {
        Self {
            monitor_id: monitor.id.clone(),
            region,
            url: monitor.url.clone(),
            method: monitor.method,
            expected_status_codes: monitor.expected_status_codes.clone(),
            timeout: monitor.timeout,
            retries: monitor.retries,
            headers: monitor.headers.clone(),
            body: monitor.body.clone(),
        }
    }
}

/// The outcome of executing one [`CheckJob`]. Immutable once produced;
/// persisted append-only, so duplicates are harmless.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    /// Monitor the result belongs to
    pub monitor_id: String,
    /// Region that performed the check
    pub region: Region,
    /// UP or DOWN (never PENDING)
    pub status: MonitorStatus,
    /// Elapsed request time in milliseconds, if measurable
    #[serde(rename = "responseTime")]
    pub response_time_ms: Option<u64>,
    /// HTTP status code received, if any response arrived
    pub status_code: Option<u16>,
    /// Sanitized failure description for DOWN results
    pub error_message: Option<String>,
    /// Request completion time
    pub checked_at: DateTime<Utc>,
}

impl CheckResult {
    /// Whether this result reports the monitor as down.
    pub fn is_down(&self) -> bool {
        self.status == MonitorStatus::Down
    }
}

/// A batch of results submitted to the ingestion gateway in one call.
///
/// `request_id` is assigned by the reporting worker and used only for
/// logging and idempotency diagnostics; it is not a dedup key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultBatch {
    /// Individual check results
    pub results: Vec<CheckResult>,
    /// Caller-assigned id for this submission
    pub request_id: String,
    /// Region the submitting worker runs in
    pub region: Region,
}
