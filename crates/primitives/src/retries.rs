use std::time::Duration;

use eyre::Report;
use reqwest::{Error as ReqwestError, StatusCode};
use tokio_retry::{RetryIf, strategy::ExponentialBackoff};

/// The default maximum number of retries for a transient error.
const DEFAULT_MAX_RETRIES: usize = 9;

/// The default initial backoff time in milliseconds.
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1;

/// Retry the provided async operation using [`ExponentialBackoff`].
///
/// Retries are attempted as long as the provided `condition` returns `true`
/// for the error produced by the operation, up to `DEFAULT_MAX_RETRIES`
/// attempts.
pub async fn retry_with_backoff_if<F, Fut, T, E, C>(op: F, condition: C) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
{
    let strategy =
        ExponentialBackoff::from_millis(DEFAULT_INITIAL_BACKOFF_MS).take(DEFAULT_MAX_RETRIES);
    RetryIf::spawn(strategy, op, condition).await
}

/// Retry the provided async operation with at most `max_retries` extra
/// attempts and the given initial backoff.
pub async fn retry_with_budget_if<F, Fut, T, E, C>(
    op: F,
    condition: C,
    max_retries: usize,
    initial_backoff: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
{
    let millis = initial_backoff.as_millis().max(1) as u64;
    let strategy = ExponentialBackoff::from_millis(millis).take(max_retries);
    RetryIf::spawn(strategy, op, condition).await
}

/// Determine whether an error produced by reqwest is worth retrying:
/// timeouts, connect failures, server errors and 429s.
pub fn is_retryable_http(err: &Report) -> bool {
    if let Some(req_err) = err.downcast_ref::<ReqwestError>() {
        if req_err.is_timeout() || req_err.is_connect() {
            return true;
        }
        if let Some(status) = req_err.status() {
            return status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
        }
    }
    false
}
