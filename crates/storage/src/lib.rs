//! Read/write contracts against the relational store.
//!
//! The core never owns monitor CRUD; it reads configuration and writes the
//! narrow set of fields listed on [`Store`]. `PgStore` is the production
//! implementation, `MemStore` (behind the `test-util` feature) backs the
//! state-machine tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eyre::Result;
use models::{AlertRecipient, CheckResult, Incident, Monitor};

pub mod pg;
#[cfg(any(test, feature = "test-util"))]
pub mod mem;

pub use pg::PgStore;
#[cfg(any(test, feature = "test-util"))]
pub use mem::MemStore;

/// Persistence contract required by the scheduler, the ingestion pipeline
/// and the incident engine.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// All monitors that are active and not soft-deleted.
    async fn active_monitors(&self) -> Result<Vec<Monitor>>;

    /// Load one monitor by id.
    async fn monitor(&self, id: &str) -> Result<Option<Monitor>>;

    /// Stamp `last_checked_at` after jobs for these monitors were accepted
    /// by at least one region's queue.
    async fn mark_scheduled(&self, monitor_ids: &[String], at: DateTime<Utc>) -> Result<()>;

    /// Append one check result. Append-only; duplicates only inflate
    /// history, never correctness.
    async fn insert_check_result(&self, result: &CheckResult) -> Result<()>;

    /// Update the monitor's `current_status`, `last_checked_at` and, for
    /// DOWN results, `last_incident_at`.
    async fn apply_result_to_monitor(&self, result: &CheckResult) -> Result<()>;

    /// The currently open incident for a monitor, if any.
    async fn open_incident_for(&self, monitor_id: &str) -> Result<Option<Incident>>;

    /// Open a new incident. Returns `None` when an open incident already
    /// exists for the monitor (the caller lost a race and must fall back to
    /// the update path).
    async fn create_incident(
        &self,
        monitor_id: &str,
        started_at: DateTime<Utc>,
        error_message: Option<&str>,
    ) -> Result<Option<Incident>>;

    /// Refresh the error message on an open incident.
    async fn refresh_incident_message(
        &self,
        incident_id: &str,
        error_message: Option<&str>,
    ) -> Result<()>;

    /// Close an incident. `duration_seconds` is computed from the
    /// incident's own `started_at`, never from the triggering result.
    async fn resolve_incident(
        &self,
        incident_id: &str,
        resolved_at: DateTime<Utc>,
    ) -> Result<Incident>;

    /// Load one incident by id.
    async fn incident(&self, id: &str) -> Result<Option<Incident>>;

    /// Atomically claim the right to send a downtime alert: stamps
    /// `last_notified_at = at` only when no alert has been recorded since
    /// `resend_after`. Returns whether the claim won; the loser must not
    /// send. This is the throttle's source of truth, so stale alert
    /// snapshots and concurrent dispatches cannot double-send.
    async fn claim_incident_notification(
        &self,
        incident_id: &str,
        at: DateTime<Utc>,
        resend_after: DateTime<Utc>,
    ) -> Result<bool>;

    /// Active alert recipients for a monitor.
    async fn active_recipients(&self, monitor_id: &str) -> Result<Vec<AlertRecipient>>;

    /// Append an audit log entry for a monitor.
    async fn append_monitor_log(
        &self,
        monitor_id: &str,
        action: &str,
        details: serde_json::Value,
    ) -> Result<()>;
}
