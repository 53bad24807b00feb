//! The incident state machine.
//!
//! Per monitor there is either no incident or exactly one open incident.
//! Transitions are serialized per monitor with an in-process lock; across
//! processes the store's open-incident uniqueness turns a lost race into a
//! fallback onto the update path.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use eyre::Result;
use models::{CheckResult, Incident};
use storage::Store;
use tracing::{debug, info};

/// A notification owed after a state transition. The caller decides when
/// and whether to dispatch it; the engine itself never sends mail.
#[derive(Debug)]
pub enum Alert {
    /// The monitor is down. Throttled by the notifier.
    Down(Incident),
    /// The incident resolved. Always dispatched.
    Recovered(Incident),
}

/// Applies check results to the incident lifecycle.
pub struct IncidentEngine<S> {
    store: Arc<S>,
    locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl<S> std::fmt::Debug for IncidentEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncidentEngine").finish_non_exhaustive()
    }
}

impl<S: Store> IncidentEngine<S> {
    /// Build an engine over the store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store, locks: DashMap::new() }
    }

    /// Apply one result and return the alert it produced, if any.
    ///
    /// The read-decide-write sequence runs under a per-monitor lock, so two
    /// results for the same monitor never interleave inside this process.
    pub async fn apply(&self, result: &CheckResult) -> Result<Option<Alert>> {
        let lock = Arc::clone(
            self.locks
                .entry(result.monitor_id.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .value(),
        );
        let _guard = lock.lock().await;

        let open = self.store.open_incident_for(&result.monitor_id).await?;
        match (open, result.is_down()) {
            (None, true) => {
                let created = self
                    .store
                    .create_incident(
                        &result.monitor_id,
                        result.checked_at,
                        result.error_message.as_deref(),
                    )
                    .await?;
                match created {
                    Some(incident) => {
                        info!(
                            monitor_id = %result.monitor_id,
                            incident_id = %incident.id,
                            "incident opened"
                        );
                        Ok(Some(Alert::Down(incident)))
                    }
                    // Another writer opened the incident first; treat this
                    // result as a repeat failure.
                    None => self.refresh_open(result).await,
                }
            }
            (Some(incident), true) => {
                self.store
                    .refresh_incident_message(&incident.id, result.error_message.as_deref())
                    .await?;
                debug!(incident_id = %incident.id, "incident still failing");
                // The alert carries the message just written, not the one
                // read before the refresh.
                Ok(Some(Alert::Down(Incident {
                    error_message: result.error_message.clone(),
                    ..incident
                })))
            }
            (Some(incident), false) => {
                let resolved = self.store.resolve_incident(&incident.id, Utc::now()).await?;
                info!(
                    monitor_id = %result.monitor_id,
                    incident_id = %resolved.id,
                    duration_seconds = resolved.duration_seconds,
                    "incident resolved"
                );
                Ok(Some(Alert::Recovered(resolved)))
            }
            (None, false) => Ok(None),
        }
    }

    async fn refresh_open(&self, result: &CheckResult) -> Result<Option<Alert>> {
        let Some(incident) = self.store.open_incident_for(&result.monitor_id).await? else {
            return Ok(None);
        };
        self.store
            .refresh_incident_message(&incident.id, result.error_message.as_deref())
            .await?;
        Ok(Some(Alert::Down(Incident {
            error_message: result.error_message.clone(),
            ..incident
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};
    use models::{HttpMethod, IncidentStatus, Monitor, MonitorStatus, Region};
    use storage::MemStore;

    fn monitor(id: &str) -> Monitor {
        Monitor {
            id: id.to_owned(),
            name: format!("monitor {id}"),
            url: "https://example.com/health".to_owned(),
            method: HttpMethod::Get,
            expected_status_codes: vec![200],
            timeout: 30,
            interval: 5,
            retries: 0,
            headers: None,
            body: None,
            slug: None,
            is_active: true,
            is_deleted: false,
            current_status: MonitorStatus::Up,
            last_checked_at: None,
            last_incident_at: None,
        }
    }

    fn down(monitor_id: &str, checked_at: DateTime<Utc>, message: &str) -> CheckResult {
        CheckResult {
            monitor_id: monitor_id.to_owned(),
            region: Region::UsEast1,
            status: MonitorStatus::Down,
            response_time_ms: None,
            status_code: Some(503),
            error_message: Some(message.to_owned()),
            checked_at,
        }
    }

    fn up(monitor_id: &str) -> CheckResult {
        CheckResult {
            monitor_id: monitor_id.to_owned(),
            region: Region::UsEast1,
            status: MonitorStatus::Up,
            response_time_ms: Some(80),
            status_code: Some(200),
            error_message: None,
            checked_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn first_down_opens_an_incident() {
        let store = Arc::new(MemStore::new());
        store.put_monitor(monitor("m1"));
        let engine = IncidentEngine::new(store.clone());

        let started = Utc::now();
        let alert = engine.apply(&down("m1", started, "boom")).await.unwrap();

        let Some(Alert::Down(incident)) = alert else { panic!("expected a down alert") };
        assert_eq!(incident.started_at, started);
        assert_eq!(incident.error_message.as_deref(), Some("boom"));
        assert_eq!(store.incidents_for("m1").len(), 1);
    }

    #[tokio::test]
    async fn repeat_down_updates_the_open_incident() {
        let store = Arc::new(MemStore::new());
        store.put_monitor(monitor("m1"));
        let engine = IncidentEngine::new(store.clone());

        engine.apply(&down("m1", Utc::now(), "first")).await.unwrap();
        let alert = engine.apply(&down("m1", Utc::now(), "second")).await.unwrap();

        // Both the stored incident and the produced alert carry the
        // latest message.
        let Some(Alert::Down(alerted)) = alert else { panic!("expected a down alert") };
        assert_eq!(alerted.error_message.as_deref(), Some("second"));
        let incidents = store.incidents_for("m1");
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].error_message.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn up_resolves_with_duration_from_started_at() {
        let store = Arc::new(MemStore::new());
        store.put_monitor(monitor("m1"));
        let engine = IncidentEngine::new(store.clone());

        let started = Utc::now() - Duration::seconds(120);
        engine.apply(&down("m1", started, "boom")).await.unwrap();
        let alert = engine.apply(&up("m1")).await.unwrap();

        let Some(Alert::Recovered(incident)) = alert else { panic!("expected recovery") };
        assert_eq!(incident.status, IncidentStatus::Resolved);
        assert!(incident.duration_seconds.unwrap() >= 120);
    }

    #[tokio::test]
    async fn up_without_incident_is_a_noop() {
        let store = Arc::new(MemStore::new());
        store.put_monitor(monitor("m1"));
        let engine = IncidentEngine::new(store.clone());

        let alert = engine.apply(&up("m1")).await.unwrap();
        assert!(alert.is_none());
        assert!(store.incidents_for("m1").is_empty());
    }

    #[tokio::test]
    async fn resolved_incident_allows_a_fresh_one() {
        let store = Arc::new(MemStore::new());
        store.put_monitor(monitor("m1"));
        let engine = IncidentEngine::new(store.clone());

        engine.apply(&down("m1", Utc::now(), "one")).await.unwrap();
        engine.apply(&up("m1")).await.unwrap();
        engine.apply(&down("m1", Utc::now(), "two")).await.unwrap();

        let incidents = store.incidents_for("m1");
        assert_eq!(incidents.len(), 2);
        assert_eq!(incidents[0].status, IncidentStatus::Resolved);
        assert_eq!(incidents[1].status, IncidentStatus::Open);
    }
}
