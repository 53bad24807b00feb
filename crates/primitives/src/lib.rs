//! Small shared building blocks: retry backoff and duration formatting.

pub mod duration;
pub mod retries;

pub use duration::format_duration;
pub use retries::{is_retryable_http, retry_with_backoff_if, retry_with_budget_if};
