//! Rendered alert emails.

use models::{Incident, Monitor};
use primitives::format_duration;

/// A rendered email ready for the [`crate::Mailer`].
#[derive(Debug, Clone)]
pub struct Email {
    /// Subject line
    pub subject: String,
    /// HTML body
    pub html: String,
    /// Plain text body
    pub text: String,
}

/// Alert sent when a monitor goes down.
pub fn downtime_email(monitor: &Monitor, incident: &Incident) -> Email {
    let subject = format!("🔴 {} is DOWN", monitor.name);
    let reason = incident.error_message.as_deref().unwrap_or("Unknown error");
    let started = incident.started_at.format("%Y-%m-%d %H:%M:%S UTC");

    let html = format!(
        "<h2>{} is down</h2>\
         <p><strong>URL:</strong> {}</p>\
         <p><strong>Reason:</strong> {reason}</p>\
         <p><strong>Since:</strong> {started}</p>",
        monitor.name, monitor.url,
    );
    let text = format!(
        "{} is down\nURL: {}\nReason: {reason}\nSince: {started}\n",
        monitor.name, monitor.url,
    );
    Email { subject, html, text }
}

/// Alert sent when a monitor's incident resolves.
pub fn recovery_email(monitor: &Monitor, incident: &Incident) -> Email {
    let subject = format!("🟢 {} is RECOVERED", monitor.name);
    let downtime = format_duration(incident.duration_seconds.unwrap_or(0));
    let recovered = incident
        .resolved_at
        .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_default();

    let html = format!(
        "<h2>{} has recovered</h2>\
         <p><strong>URL:</strong> {}</p>\
         <p><strong>Recovered at:</strong> {recovered}</p>\
         <p><strong>Total downtime:</strong> {downtime}</p>",
        monitor.name, monitor.url,
    );
    let text = format!(
        "{} has recovered\nURL: {}\nRecovered at: {recovered}\nTotal downtime: {downtime}\n",
        monitor.name, monitor.url,
    );
    Email { subject, html, text }
}
