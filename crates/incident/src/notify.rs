//! Alert dispatch with downtime throttling.

use std::sync::Arc;

use chrono::{Duration, Utc};
use eyre::Result;
use futures::future::join_all;
use models::{AlertRecipient, Incident};
use storage::Store;
use tracing::{debug, info, warn};

use crate::{engine::Alert, mailer::Mailer, templates, templates::Email};

/// Turns engine alerts into emails.
///
/// Downtime alerts for one incident are sent at most once an hour; recovery
/// alerts always go out. Per-recipient delivery failures are logged and do
/// not block the rest of the fan-out.
pub struct Notifier<S> {
    store: Arc<S>,
    mailer: Arc<dyn Mailer>,
}

impl<S> std::fmt::Debug for Notifier<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}

impl<S: Store> Notifier<S> {
    /// Build a notifier over the store and mail transport.
    pub fn new(store: Arc<S>, mailer: Arc<dyn Mailer>) -> Self {
        Self { store, mailer }
    }

    /// Dispatch one alert.
    pub async fn dispatch(&self, alert: Alert) -> Result<()> {
        match alert {
            Alert::Down(incident) => self.notify_downtime(&incident).await,
            Alert::Recovered(incident) => self.notify_recovery(&incident).await,
        }
    }

    async fn notify_downtime(&self, incident: &Incident) -> Result<()> {
        let Some(monitor) = self.store.monitor(&incident.monitor_id).await? else {
            return Ok(());
        };
        let recipients = self.store.active_recipients(&monitor.id).await?;
        if recipients.is_empty() {
            info!(monitor_id = %monitor.id, "monitor is down but has no alert recipients");
            return Ok(());
        }

        // The alert carries a snapshot of the incident taken before any
        // throttle stamp was written, so the throttle is decided in the
        // store: of all dispatches racing on one incident, only the one
        // whose stamp lands inside a fresh window sends.
        let now = Utc::now();
        let claimed = self
            .store
            .claim_incident_notification(&incident.id, now, now - Duration::hours(1))
            .await?;
        if !claimed {
            debug!(incident_id = %incident.id, "downtime alert throttled");
            return Ok(());
        }

        let email = templates::downtime_email(&monitor, incident);
        let sent = self.fan_out(&recipients, &email).await;
        info!(
            incident_id = %incident.id,
            sent,
            recipients = recipients.len(),
            "downtime alert dispatched"
        );
        Ok(())
    }

    async fn notify_recovery(&self, incident: &Incident) -> Result<()> {
        let Some(monitor) = self.store.monitor(&incident.monitor_id).await? else {
            return Ok(());
        };
        let recipients = self.store.active_recipients(&monitor.id).await?;
        if recipients.is_empty() {
            info!(monitor_id = %monitor.id, "monitor recovered but has no alert recipients");
            return Ok(());
        }

        let email = templates::recovery_email(&monitor, incident);
        self.fan_out(&recipients, &email).await;
        Ok(())
    }

    async fn fan_out(&self, recipients: &[AlertRecipient], email: &Email) -> usize {
        let sends = recipients.iter().map(|recipient| async move {
            match self
                .mailer
                .send(&recipient.email, &email.subject, &email.html, &email.text)
                .await
            {
                Ok(()) => true,
                Err(e) => {
                    warn!(to = %recipient.email, err = %e, "alert email failed");
                    false
                }
            }
        });
        join_all(sends).await.into_iter().filter(|ok| *ok).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use eyre::eyre;
    use models::{HttpMethod, IncidentStatus, Monitor, MonitorStatus};
    use std::sync::Mutex;
    use storage::MemStore;

    #[derive(Default)]
    struct RecordingMailer {
        fail_for: Option<String>,
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingMailer {
        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, _html: &str, _text: &str) -> Result<()> {
            if self.fail_for.as_deref() == Some(to) {
                return Err(eyre!("smtp said no"));
            }
            self.sent.lock().unwrap().push((to.to_owned(), subject.to_owned()));
            Ok(())
        }
    }

    fn monitor(id: &str) -> Monitor {
        Monitor {
            id: id.to_owned(),
            name: "Checkout API".to_owned(),
            url: "https://shop.example.com/health".to_owned(),
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
            current_status: MonitorStatus::Down,
            last_checked_at: None,
            last_incident_at: None,
        }
    }

    fn recipient(monitor_id: &str, email: &str) -> AlertRecipient {
        AlertRecipient {
            id: format!("r-{email}"),
            monitor_id: monitor_id.to_owned(),
            email: email.to_owned(),
            is_active: true,
        }
    }

    async fn open_incident(store: &MemStore, monitor_id: &str) -> Incident {
        store
            .create_incident(monitor_id, Utc::now(), Some("Unexpected status code: 503"))
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn downtime_alert_reaches_every_recipient() {
        let store = Arc::new(MemStore::new());
        store.put_monitor(monitor("m1"));
        store.put_recipient(recipient("m1", "a@example.com"));
        store.put_recipient(recipient("m1", "b@example.com"));
        let mailer = Arc::new(RecordingMailer::default());
        let notifier = Notifier::new(store.clone(), mailer.clone());

        let incident = open_incident(&store, "m1").await;
        notifier.dispatch(Alert::Down(incident.clone())).await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(_, subject)| subject == "🔴 Checkout API is DOWN"));

        let stored = store.incident(&incident.id).await.unwrap().unwrap();
        assert!(stored.last_notified_at.is_some());
    }

    #[tokio::test]
    async fn downtime_alert_is_throttled_within_an_hour() {
        let store = Arc::new(MemStore::new());
        store.put_monitor(monitor("m1"));
        store.put_recipient(recipient("m1", "a@example.com"));
        let mailer = Arc::new(RecordingMailer::default());
        let notifier = Notifier::new(store.clone(), mailer.clone());

        let incident = open_incident(&store, "m1").await;
        notifier.dispatch(Alert::Down(incident.clone())).await.unwrap();
        assert_eq!(mailer.sent().len(), 1);

        // A repeat failure re-dispatches the same incident.
        notifier.dispatch(Alert::Down(incident)).await.unwrap();
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn stale_alert_snapshot_cannot_resend_within_the_window() {
        let store = Arc::new(MemStore::new());
        store.put_monitor(monitor("m1"));
        store.put_recipient(recipient("m1", "a@example.com"));
        let mailer = Arc::new(RecordingMailer::default());
        let notifier = Notifier::new(store.clone(), mailer.clone());

        // Two regions report DOWN back to back; both alerts carry the
        // pre-notification snapshot with last_notified_at = None.
        let incident = open_incident(&store, "m1").await;
        let second_region_alert = Alert::Down(incident.clone());
        notifier.dispatch(Alert::Down(incident)).await.unwrap();
        notifier.dispatch(second_region_alert).await.unwrap();

        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn stale_throttle_stamp_notifies_again() {
        let store = Arc::new(MemStore::new());
        store.put_monitor(monitor("m1"));
        store.put_recipient(recipient("m1", "a@example.com"));
        let mailer = Arc::new(RecordingMailer::default());
        let notifier = Notifier::new(store.clone(), mailer.clone());

        let incident = open_incident(&store, "m1").await;
        let two_hours_ago = Utc::now() - Duration::hours(2);
        store
            .claim_incident_notification(&incident.id, two_hours_ago, Utc::now())
            .await
            .unwrap();

        notifier.dispatch(Alert::Down(incident)).await.unwrap();
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn recovery_is_never_throttled() {
        let store = Arc::new(MemStore::new());
        store.put_monitor(monitor("m1"));
        store.put_recipient(recipient("m1", "a@example.com"));
        let mailer = Arc::new(RecordingMailer::default());
        let notifier = Notifier::new(store.clone(), mailer.clone());

        let incident = open_incident(&store, "m1").await;
        let now = Utc::now();
        store
            .claim_incident_notification(&incident.id, now, now - Duration::hours(1))
            .await
            .unwrap();
        let resolved = store.resolve_incident(&incident.id, Utc::now()).await.unwrap();

        notifier.dispatch(Alert::Recovered(resolved)).await.unwrap();
        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "🟢 Checkout API is RECOVERED");
    }

    #[tokio::test]
    async fn one_failed_delivery_does_not_block_the_rest() {
        let store = Arc::new(MemStore::new());
        store.put_monitor(monitor("m1"));
        store.put_recipient(recipient("m1", "dead@example.com"));
        store.put_recipient(recipient("m1", "alive@example.com"));
        let mailer = Arc::new(RecordingMailer {
            fail_for: Some("dead@example.com".to_owned()),
            ..Default::default()
        });
        let notifier = Notifier::new(store.clone(), mailer.clone());

        let incident = open_incident(&store, "m1").await;
        notifier.dispatch(Alert::Down(incident.clone())).await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "alive@example.com");

        let stored = store.incident(&incident.id).await.unwrap().unwrap();
        assert!(stored.last_notified_at.is_some());
    }

    #[tokio::test]
    async fn no_recipients_is_a_quiet_noop() {
        let store = Arc::new(MemStore::new());
        store.put_monitor(monitor("m1"));
        let mailer = Arc::new(RecordingMailer::default());
        let notifier = Notifier::new(store.clone(), mailer.clone());

        let incident = open_incident(&store, "m1").await;
        notifier.dispatch(Alert::Down(incident.clone())).await.unwrap();

        assert!(mailer.sent().is_empty());
        let stored = store.incident(&incident.id).await.unwrap().unwrap();
        assert!(stored.last_notified_at.is_none());
    }
}
