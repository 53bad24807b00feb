//! HTTP probing of monitored endpoints and reporting of the outcomes.

pub mod executor;
pub mod report;
pub mod sanitize;

pub use executor::{ProbeExecutor, USER_AGENT};
pub use report::{API_SECRET_HEADER, RESULTS_PATH, ResultReporter};
pub use sanitize::{MAX_ERROR_LEN, sanitize_error};
