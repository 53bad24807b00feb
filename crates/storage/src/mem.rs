//! In-memory [`Store`] used by unit and state-machine tests.

use std::{
    collections::HashMap,
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eyre::{Result, eyre};
use models::{AlertRecipient, CheckResult, Incident, IncidentStatus, Monitor};
use uuid::Uuid;

use crate::Store;

/// A single audit log entry recorded by [`MemStore`].
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Monitor the entry belongs to
    pub monitor_id: String,
    /// Action label
    pub action: String,
    /// Structured details
    pub details: serde_json::Value,
}

/// Everything lives behind one mutex so `create_incident` is atomic with
/// respect to the open-incident check, mirroring the database's partial
/// unique index.
#[derive(Debug, Default)]
struct Inner {
    monitors: HashMap<String, Monitor>,
    results: Vec<CheckResult>,
    incidents: HashMap<String, Incident>,
    recipients: Vec<AlertRecipient>,
    logs: Vec<LogEntry>,
}

/// In-memory store for tests.
#[derive(Debug, Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a monitor.
    pub fn put_monitor(&self, monitor: Monitor) {
        self.inner.lock().unwrap().monitors.insert(monitor.id.clone(), monitor);
    }

    /// Register an alert recipient.
    pub fn put_recipient(&self, recipient: AlertRecipient) {
        self.inner.lock().unwrap().recipients.push(recipient);
    }

    /// All incidents recorded for a monitor, in creation order.
    pub fn incidents_for(&self, monitor_id: &str) -> Vec<Incident> {
        let inner = self.inner.lock().unwrap();
        let mut incidents: Vec<Incident> =
            inner.incidents.values().filter(|i| i.monitor_id == monitor_id).cloned().collect();
        incidents.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
        incidents
    }

    /// Number of persisted check results.
    pub fn result_count(&self) -> usize {
        self.inner.lock().unwrap().results.len()
    }

    /// Recorded audit log entries.
    pub fn logs(&self) -> Vec<LogEntry> {
        self.inner.lock().unwrap().logs.clone()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn active_monitors(&self) -> Result<Vec<Monitor>> {
        let inner = self.inner.lock().unwrap();
        let mut monitors: Vec<Monitor> = inner
            .monitors
            .values()
            .filter(|m| m.is_active && !m.is_deleted)
            .cloned()
            .collect();
        monitors.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(monitors)
    }

    async fn monitor(&self, id: &str) -> Result<Option<Monitor>> {
        Ok(self.inner.lock().unwrap().monitors.get(id).cloned())
    }

    async fn mark_scheduled(&self, monitor_ids: &[String], at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        for id in monitor_ids {
            if let Some(monitor) = inner.monitors.get_mut(id) {
                monitor.last_checked_at = Some(at);
            }
        }
        Ok(())
    }

    async fn insert_check_result(&self, result: &CheckResult) -> Result<()> {
        self.inner.lock().unwrap().results.push(result.clone());
        Ok(())
    }

    async fn apply_result_to_monitor(&self, result: &CheckResult) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(monitor) = inner.monitors.get_mut(&result.monitor_id) {
            monitor.current_status = result.status;
            monitor.last_checked_at = Some(result.checked_at);
            if result.is_down() {
                monitor.last_incident_at = Some(result.checked_at);
            }
        }
        Ok(())
    }

    async fn open_incident_for(&self, monitor_id: &str) -> Result<Option<Incident>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .incidents
            .values()
            .find(|i| i.monitor_id == monitor_id && i.is_open())
            .cloned())
    }

    async fn create_incident(
        &self,
        monitor_id: &str,
        started_at: DateTime<Utc>,
        error_message: Option<&str>,
    ) -> Result<Option<Incident>> {
        let mut inner = self.inner.lock().unwrap();
        // Same semantics as the partial unique index: the check and the
        // insert happen under one lock.
        if inner.incidents.values().any(|i| i.monitor_id == monitor_id && i.is_open()) {
            return Ok(None);
        }
        let incident = Incident {
            id: Uuid::new_v4().to_string(),
            monitor_id: monitor_id.to_owned(),
            status: IncidentStatus::Open,
            started_at,
            resolved_at: None,
            duration_seconds: None,
            error_message: error_message.map(str::to_owned),
            last_notified_at: None,
        };
        inner.incidents.insert(incident.id.clone(), incident.clone());
        Ok(Some(incident))
    }

    async fn refresh_incident_message(
        &self,
        incident_id: &str,
        error_message: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let incident = inner
            .incidents
            .get_mut(incident_id)
            .ok_or_else(|| eyre!("incident not found: {incident_id}"))?;
        incident.error_message = error_message.map(str::to_owned);
        Ok(())
    }

    async fn resolve_incident(
        &self,
        incident_id: &str,
        resolved_at: DateTime<Utc>,
    ) -> Result<Incident> {
        let mut inner = self.inner.lock().unwrap();
        let incident = inner
            .incidents
            .get_mut(incident_id)
            .ok_or_else(|| eyre!("incident not found: {incident_id}"))?;
        incident.status = IncidentStatus::Resolved;
        incident.resolved_at = Some(resolved_at);
        incident.duration_seconds = Some((resolved_at - incident.started_at).num_seconds());
        Ok(incident.clone())
    }

    async fn incident(&self, id: &str) -> Result<Option<Incident>> {
        Ok(self.inner.lock().unwrap().incidents.get(id).cloned())
    }

    async fn claim_incident_notification(
        &self,
        incident_id: &str,
        at: DateTime<Utc>,
        resend_after: DateTime<Utc>,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let incident = inner
            .incidents
            .get_mut(incident_id)
            .ok_or_else(|| eyre!("incident not found: {incident_id}"))?;
        match incident.last_notified_at {
            Some(last) if last >= resend_after => Ok(false),
            _ => {
                incident.last_notified_at = Some(at);
                Ok(true)
            }
        }
    }

    async fn active_recipients(&self, monitor_id: &str) -> Result<Vec<AlertRecipient>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .recipients
            .iter()
            .filter(|r| r.monitor_id == monitor_id && r.is_active)
            .cloned()
            .collect())
    }

    async fn append_monitor_log(
        &self,
        monitor_id: &str,
        action: &str,
        details: serde_json::Value,
    ) -> Result<()> {
        self.inner.lock().unwrap().logs.push(LogEntry {
            monitor_id: monitor_id.to_owned(),
            action: action.to_owned(),
            details,
        });
        Ok(())
    }
}
