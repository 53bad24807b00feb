//! Submission of completed results to the ingestion gateway.

use eyre::{Report, Result, WrapErr};
use models::{CheckResult, IngestAck, Region, ResultBatch};
use primitives::{is_retryable_http, retry_with_backoff_if};
use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::executor::USER_AGENT;

/// Gateway path results are POSTed to.
pub const RESULTS_PATH: &str = "webhooks/monitor-results";

/// Header carrying the shared ingestion secret.
pub const API_SECRET_HEADER: &str = "x-api-secret";

/// Posts result batches to the gateway, authenticated with the shared
/// secret. Transient failures are retried with exponential backoff.
#[derive(Debug, Clone)]
pub struct ResultReporter {
    client: reqwest::Client,
    endpoint: Url,
    secret: String,
    region: Region,
}

impl ResultReporter {
    /// Build a reporter against the gateway base URL.
    pub fn new(base: &Url, secret: String, region: Region) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let endpoint = base.join(RESULTS_PATH).wrap_err("building results endpoint")?;
        Ok(Self { client, endpoint, secret, region })
    }

    /// Submit one batch. Every result in the batch is tagged with a fresh
    /// request id for tracing across worker and gateway logs.
    pub async fn submit(&self, results: Vec<CheckResult>) -> Result<IngestAck> {
        let batch = ResultBatch {
            results,
            request_id: Uuid::new_v4().to_string(),
            region: self.region,
        };

        let ack = retry_with_backoff_if(
            || async {
                let resp = self
                    .client
                    .post(self.endpoint.clone())
                    .header(API_SECRET_HEADER, &self.secret)
                    .json(&batch)
                    .send()
                    .await?
                    .error_for_status()?;
                Ok::<IngestAck, Report>(resp.json().await?)
            },
            is_retryable_http,
        )
        .await
        .wrap_err("submitting result batch")?;

        info!(
            request_id = %batch.request_id,
            region = %self.region,
            processed = ack.processed,
            skipped = ack.skipped,
            "result batch accepted"
        );
        Ok(ack)
    }
}
