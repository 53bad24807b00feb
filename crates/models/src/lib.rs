//! Shared domain and wire types for the stayup monitoring pipeline.

pub mod api;
pub mod check;
pub mod incident;
pub mod monitor;
pub mod types;

pub use api::{ErrorResponse, HealthResponse, IngestAck};
pub use check::{CheckJob, CheckResult, ResultBatch};
pub use incident::Incident;
pub use monitor::{AlertRecipient, Monitor};
pub use types::{HttpMethod, IncidentStatus, MonitorStatus, Region};
