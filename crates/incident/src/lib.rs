//! Incident lifecycle: state transitions and alerting.

pub mod engine;
pub mod mailer;
pub mod notify;
pub mod templates;

pub use engine::{Alert, IncidentEngine};
pub use mailer::{MailClient, Mailer};
pub use notify::Notifier;
pub use templates::{Email, downtime_email, recovery_email};
