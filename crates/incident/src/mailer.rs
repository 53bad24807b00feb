//! Outbound alert mail.

use async_trait::async_trait;
use eyre::{Report, Result, WrapErr};
use primitives::{is_retryable_http, retry_with_backoff_if};
use reqwest::Client as HttpClient;
use serde::Serialize;
use url::Url;

/// Sends one rendered email. Implemented by the HTTP mail API client in
/// production and by recording fakes in tests.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    /// Deliver one message to one recipient.
    async fn send(&self, to: &str, subject: &str, html: &str, text: &str) -> Result<()>;
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

/// Client for the transactional mail API.
#[derive(Debug, Clone)]
pub struct MailClient {
    http: HttpClient,
    endpoint: Url,
    api_key: String,
    from: String,
}

impl MailClient {
    /// Create a mail client against the API base URL.
    pub fn new(base: &Url, api_key: String, from: String) -> Result<Self> {
        let endpoint = base.join("send").wrap_err("building mail endpoint")?;
        Ok(Self { http: HttpClient::new(), endpoint, api_key, from })
    }

    fn auth(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        rb.bearer_auth(&self.api_key)
    }
}

#[async_trait]
impl Mailer for MailClient {
    async fn send(&self, to: &str, subject: &str, html: &str, text: &str) -> Result<()> {
        let body = SendRequest { from: &self.from, to, subject, html, text };
        retry_with_backoff_if(
            || async {
                self.auth(self.http.post(self.endpoint.clone()))
                    .json(&body)
                    .send()
                    .await?
                    .error_for_status()?;
                Ok::<(), Report>(())
            },
            is_retryable_http,
        )
        .await
        .wrap_err_with(|| format!("sending alert email to {to}"))
    }
}
