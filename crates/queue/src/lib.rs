//! NATS JetStream transport for check jobs.
//!
//! One stream carries every region's jobs; each region gets its own subject
//! (`stayup.jobs.<region>`) and its own durable pull consumer, so a slow or
//! offline region never holds back the others.

use async_nats::jetstream::{
    self,
    consumer::{PullConsumer, pull},
    stream::Stream,
};
use async_trait::async_trait;
use eyre::{Result, eyre};
use futures::{StreamExt, future::try_join_all};
use models::{CheckJob, Region};
use std::future::IntoFuture;
use tracing::{debug, warn};

/// Name of the JetStream stream holding check jobs for every region.
pub const JOB_STREAM: &str = "stayup_jobs";

/// Upper bound on messages published per acknowledged batch, matching the
/// executor's fetch batch size.
pub const MAX_PUBLISH_BATCH: usize = 10;

/// Subject a region's jobs are published on.
pub fn subject_for(region: Region) -> String {
    format!("stayup.jobs.{region}")
}

async fn ensure_job_stream(js: &jetstream::Context) -> Result<Stream> {
    js.get_or_create_stream(jetstream::stream::Config {
        name: JOB_STREAM.to_owned(),
        subjects: vec!["stayup.jobs.*".to_owned()],
        ..Default::default()
    })
    .await
    .map_err(|e| eyre!("creating job stream: {e}"))
}

/// Region-scoped sink for check jobs. The scheduler holds one publisher per
/// enabled region and treats each independently.
#[async_trait]
pub trait JobPublisher: Send + Sync + 'static {
    /// Region this publisher delivers to.
    fn region(&self) -> Region;

    /// Whether the underlying transport currently accepts publishes.
    fn is_connected(&self) -> bool;

    /// Publish jobs and wait for the broker to acknowledge them.
    async fn publish_jobs(&self, jobs: &[CheckJob]) -> Result<()>;
}

/// [`JobPublisher`] backed by JetStream.
#[derive(Debug, Clone)]
pub struct NatsJobPublisher {
    client: async_nats::Client,
    js: jetstream::Context,
    region: Region,
    subject: String,
}

impl NatsJobPublisher {
    /// Build a publisher for one region on an existing connection. Creates
    /// the job stream if it does not exist yet.
    pub async fn new(client: async_nats::Client, region: Region) -> Result<Self> {
        let js = jetstream::new(client.clone());
        ensure_job_stream(&js).await?;
        Ok(Self { client, js, region, subject: subject_for(region) })
    }
}

#[async_trait]
impl JobPublisher for NatsJobPublisher {
    fn region(&self) -> Region {
        self.region
    }

    fn is_connected(&self) -> bool {
        self.client.connection_state() == async_nats::connection::State::Connected
    }

    async fn publish_jobs(&self, jobs: &[CheckJob]) -> Result<()> {
        for chunk in jobs.chunks(MAX_PUBLISH_BATCH) {
            let mut acks = Vec::with_capacity(chunk.len());
            for job in chunk {
                let payload = serde_json::to_vec(job)?;
                let ack = self
                    .js
                    .publish(self.subject.clone(), payload.into())
                    .await
                    .map_err(|e| eyre!("publishing job to {}: {e}", self.subject))?;
                acks.push(ack.into_future());
            }
            try_join_all(acks)
                .await
                .map_err(|e| eyre!("awaiting publish acks for {}: {e}", self.subject))?;
            debug!(region = %self.region, jobs = chunk.len(), "published job batch");
        }
        Ok(())
    }
}

/// One job pulled off the queue. The message is acknowledged only after the
/// executor has probed and reported, so a crash mid-probe redelivers.
pub struct JobDelivery {
    /// Decoded check job.
    pub job: CheckJob,
    message: jetstream::Message,
}

impl std::fmt::Debug for JobDelivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDelivery").field("job", &self.job).finish_non_exhaustive()
    }
}

impl JobDelivery {
    /// Acknowledge the underlying message.
    pub async fn ack(&self) -> Result<()> {
        self.message.ack().await.map_err(|e| eyre!("acking job message: {e}"))
    }
}

/// Durable pull consumer for one region's jobs.
pub struct JobConsumer {
    region: Region,
    consumer: PullConsumer,
}

impl std::fmt::Debug for JobConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobConsumer").field("region", &self.region).finish_non_exhaustive()
    }
}

impl JobConsumer {
    /// Attach the region's durable consumer, creating it if needed.
    pub async fn new(client: async_nats::Client, region: Region) -> Result<Self> {
        let js = jetstream::new(client);
        let stream = ensure_job_stream(&js).await?;
        let durable = format!("worker-{region}");
        let consumer = stream
            .get_or_create_consumer(
                &durable,
                pull::Config {
                    durable_name: Some(durable.clone()),
                    filter_subject: subject_for(region),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| eyre!("creating consumer {durable}: {e}"))?;
        Ok(Self { region, consumer })
    }

    /// Pull up to `max` jobs. Malformed payloads are acknowledged and
    /// dropped so they never wedge the consumer.
    pub async fn fetch(&self, max: usize) -> Result<Vec<JobDelivery>> {
        let mut batch = self
            .consumer
            .batch()
            .max_messages(max)
            .expires(std::time::Duration::from_secs(5))
            .messages()
            .await
            .map_err(|e| eyre!("fetching jobs for {}: {e}", self.region))?;

        let mut deliveries = Vec::new();
        while let Some(message) = batch.next().await {
            let message = message.map_err(|e| eyre!("receiving job message: {e}"))?;
            match serde_json::from_slice::<CheckJob>(&message.payload) {
                Ok(job) => deliveries.push(JobDelivery { job, message }),
                Err(e) => {
                    warn!(region = %self.region, err = %e, "dropping malformed job payload");
                    if let Err(ack_err) = message.ack().await {
                        warn!(err = %ack_err, "failed to ack malformed job");
                    }
                }
            }
        }
        Ok(deliveries)
    }
}
