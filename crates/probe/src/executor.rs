//! Probe execution: one HTTP request per job, mapped to a [`CheckResult`].

use std::time::{Duration, Instant};

use chrono::Utc;
use eyre::{Report, Result};
use models::{CheckJob, CheckResult, HttpMethod, MonitorStatus};
use primitives::{is_retryable_http, retry_with_budget_if};
use reqwest::Method;
use tracing::debug;

use crate::sanitize::sanitize_error;

/// User agent announced by every probe request.
pub const USER_AGENT: &str = "StayUp Monitor/1.0";

/// Initial backoff between retry attempts when the retry strategy is on.
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

fn method_of(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Patch => Method::PATCH,
    }
}

struct Attempt {
    status_code: u16,
    elapsed_ms: u64,
}

/// Executes check jobs against their target URLs.
///
/// Execution is infallible: every failure mode becomes a DOWN result with a
/// sanitized error message rather than an error the caller must handle.
#[derive(Debug, Clone)]
pub struct ProbeExecutor {
    client: reqwest::Client,
    retry_enabled: bool,
}

impl ProbeExecutor {
    /// Build an executor. `retry_enabled` opts in to retrying transient
    /// transport failures up to the job's retry budget; the default is one
    /// attempt per job.
    pub fn new(retry_enabled: bool) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client, retry_enabled })
    }

    /// Probe the job's URL and report the outcome.
    pub async fn execute(&self, job: &CheckJob) -> CheckResult {
        let outcome = if self.retry_enabled && job.retries > 0 {
            retry_with_budget_if(
                || self.attempt(job),
                is_retryable_http,
                job.retries as usize,
                RETRY_BACKOFF,
            )
            .await
        } else {
            self.attempt(job).await
        };
        let checked_at = Utc::now();

        match outcome {
            Ok(attempt) => {
                let up = job.expected_status_codes.contains(&attempt.status_code);
                debug!(
                    monitor_id = %job.monitor_id,
                    status_code = attempt.status_code,
                    elapsed_ms = attempt.elapsed_ms,
                    up,
                    "probe completed"
                );
                CheckResult {
                    monitor_id: job.monitor_id.clone(),
                    region: job.region,
                    status: if up { MonitorStatus::Up } else { MonitorStatus::Down },
                    response_time_ms: Some(attempt.elapsed_ms),
                    status_code: Some(attempt.status_code),
                    error_message: (!up)
                        .then(|| format!("Unexpected status code: {}", attempt.status_code)),
                    checked_at,
                }
            }
            Err(err) => CheckResult {
                monitor_id: job.monitor_id.clone(),
                region: job.region,
                status: MonitorStatus::Down,
                response_time_ms: None,
                status_code: None,
                error_message: Some(failure_message(&err, job.timeout)),
                checked_at,
            },
        }
    }

    /// One request. Errors only on transport failure; any HTTP response,
    /// expected or not, completes the attempt.
    async fn attempt(&self, job: &CheckJob) -> Result<Attempt> {
        let mut req = self
            .client
            .request(method_of(job.method), &job.url)
            .timeout(Duration::from_secs(job.timeout));

        let mut has_content_type = false;
        if let Some(headers) = &job.headers {
            for (name, value) in headers {
                if name.eq_ignore_ascii_case("content-type") {
                    has_content_type = true;
                }
                req = req.header(name.as_str(), value.as_str());
            }
        }
        if job.method.allows_body() {
            if let Some(body) = &job.body {
                if !has_content_type {
                    req = req.header("content-type", "application/json");
                }
                req = req.body(body.clone());
            }
        }

        let started = Instant::now();
        let resp = req.send().await?;
        Ok(Attempt {
            status_code: resp.status().as_u16(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}

fn failure_message(err: &Report, timeout_secs: u64) -> String {
    if let Some(req_err) = err.downcast_ref::<reqwest::Error>() {
        if req_err.is_timeout() {
            return format!("Request timeout after {timeout_secs}s");
        }
    }
    sanitize_error(&format!("Request error: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use models::Region;

    fn job(url: &str) -> CheckJob {
        CheckJob {
            monitor_id: "mon_1".to_owned(),
            region: Region::UsEast1,
            url: url.to_owned(),
            method: HttpMethod::Get,
            expected_status_codes: vec![200],
            timeout: 30,
            retries: 0,
            headers: None,
            body: None,
        }
    }

    #[tokio::test]
    async fn expected_status_reports_up() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .match_header("user-agent", USER_AGENT)
            .with_status(200)
            .create_async()
            .await;

        let executor = ProbeExecutor::new(false).unwrap();
        let result = executor.execute(&job(&server.url())).await;

        assert_eq!(result.status, MonitorStatus::Up);
        assert_eq!(result.status_code, Some(200));
        assert!(result.error_message.is_none());
        assert!(result.response_time_ms.is_some());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unexpected_status_reports_down_with_code() {
        let mut server = Server::new_async().await;
        let _mock = server.mock("GET", "/").with_status(503).create_async().await;

        let executor = ProbeExecutor::new(false).unwrap();
        let result = executor.execute(&job(&server.url())).await;

        assert_eq!(result.status, MonitorStatus::Down);
        assert_eq!(result.status_code, Some(503));
        assert_eq!(result.error_message.as_deref(), Some("Unexpected status code: 503"));
    }

    #[tokio::test]
    async fn unexpected_status_is_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server.mock("GET", "/").with_status(500).expect(1).create_async().await;

        let executor = ProbeExecutor::new(true).unwrap();
        let mut j = job(&server.url());
        j.retries = 2;
        let result = executor.execute(&j).await;

        assert_eq!(result.status, MonitorStatus::Down);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn timeout_reports_down_with_timeout_message() {
        // A listener that never answers forces the request timeout.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let executor = ProbeExecutor::new(false).unwrap();
        let mut j = job(&format!("http://{addr}/"));
        j.timeout = 1;
        let result = executor.execute(&j).await;

        drop(listener);
        assert_eq!(result.status, MonitorStatus::Down);
        assert_eq!(result.status_code, None);
        assert_eq!(result.error_message.as_deref(), Some("Request timeout after 1s"));
    }

    #[tokio::test]
    async fn transport_error_reports_sanitized_request_error() {
        let executor = ProbeExecutor::new(false).unwrap();
        // Nothing listens on the discard port.
        let result = executor.execute(&job("http://127.0.0.1:9/")).await;

        assert_eq!(result.status, MonitorStatus::Down);
        assert_eq!(result.status_code, None);
        assert!(result.error_message.unwrap().starts_with("Request error:"));
    }

    #[tokio::test]
    async fn post_sends_body_with_default_content_type() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/ping")
            .match_header("content-type", "application/json")
            .match_header("x-check", "1")
            .match_body(r#"{"ping":true}"#)
            .with_status(204)
            .create_async()
            .await;

        let executor = ProbeExecutor::new(false).unwrap();
        let mut j = job(&format!("{}/ping", server.url()));
        j.method = HttpMethod::Post;
        j.expected_status_codes = vec![204];
        j.headers = Some([("x-check".to_owned(), "1".to_owned())].into_iter().collect());
        j.body = Some(r#"{"ping":true}"#.to_owned());
        let result = executor.execute(&j).await;

        assert_eq!(result.status, MonitorStatus::Up);
        mock.assert_async().await;
    }
}
