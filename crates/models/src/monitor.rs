use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{HttpMethod, MonitorStatus};

/// A configured HTTP endpoint to be checked periodically.
///
/// Owned by the CRUD layer. The scheduler only reads the configuration
/// fields and stamps `last_checked_at`; ingestion writes `current_status`,
/// `last_checked_at` and `last_incident_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Monitor {
    /// Monitor ID
    pub id: String,
    /// Human-readable name, used in alert emails
    pub name: String,
    /// Target URL
    pub url: String,
    /// HTTP method for the check
    pub method: HttpMethod,
    /// Status codes considered UP
    pub expected_status_codes: Vec<u16>,
    /// Hard request timeout in seconds
    pub timeout: u64,
    /// Check interval in minutes
    pub interval: u32,
    /// Retry budget per job
    pub retries: u32,
    /// Optional extra request headers
    pub headers: Option<BTreeMap<String, String>>,
    /// Optional request body (POST/PUT/PATCH only)
    pub body: Option<String>,
    /// Optional public status page slug
    pub slug: Option<String>,
    /// Whether the monitor is enabled
    pub is_active: bool,
    /// Soft-delete flag
    pub is_deleted: bool,
    /// Aggregate status from the latest processed result
    pub current_status: MonitorStatus,
    /// When the monitor was last scheduled or checked
    pub last_checked_at: Option<DateTime<Utc>>,
    /// When the monitor last reported DOWN
    pub last_incident_at: Option<DateTime<Utc>>,
}

/// An email address subscribed to alerts for one monitor. Read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecipient {
    /// Recipient ID
    pub id: String,
    /// Monitor this recipient belongs to
    pub monitor_id: String,
    /// Destination address
    pub email: String,
    /// Whether alerts are currently delivered to this address
    pub is_active: bool,
}
