//! Worker binary: pulls a region's check jobs, probes the targets and
//! reports the results to the gateway.

use std::{net::SocketAddr, time::Duration};

use clap::Parser;
use config::WorkerCli;
use dotenvy::dotenv;
use futures::future::join_all;
use probe::{ProbeExecutor, ResultReporter};
use queue::JobConsumer;
use runtime::run_until_shutdown;
use tracing::{error, info, warn};
use tracing_subscriber::filter::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    if let Ok(custom_env_file) = std::env::var("ENV_FILE") {
        dotenvy::from_filename(custom_env_file)?;
    } else {
        dotenv().ok();
    }

    let opts = WorkerCli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(region = %opts.worker.region, "Worker starting...");

    let nats_client = async_nats::connect(&opts.nats.nats_url).await?;
    let consumer = JobConsumer::new(nats_client, opts.worker.region).await?;
    let executor = ProbeExecutor::new(opts.worker.probe_retries)?;
    let reporter = ResultReporter::new(
        &opts.worker.api_endpoint,
        opts.worker.api_secret.clone(),
        opts.worker.region,
    )?;

    let health_addr = SocketAddr::from(([0, 0, 0, 0], opts.health.health_port));
    tokio::spawn(runtime::health::serve(health_addr));

    run_until_shutdown(run(consumer, executor, reporter, opts.worker.batch_size), || {
        info!("Shutting down worker...");
    })
    .await
}

async fn run(
    consumer: JobConsumer,
    executor: ProbeExecutor,
    reporter: ResultReporter,
    batch_size: usize,
) -> eyre::Result<()> {
    info!("Worker listening for jobs...");
    loop {
        let deliveries = match consumer.fetch(batch_size).await {
            Ok(deliveries) => deliveries,
            Err(e) => {
                error!(err = %e, "failed to fetch jobs");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };
        if deliveries.is_empty() {
            continue;
        }

        let results =
            join_all(deliveries.iter().map(|delivery| executor.execute(&delivery.job))).await;
        info!(jobs = deliveries.len(), "probed batch");

        // Ack only once the gateway accepted the batch; on failure the jobs
        // are redelivered and probed again.
        match reporter.submit(results).await {
            Ok(_) => {
                for delivery in &deliveries {
                    if let Err(e) = delivery.ack().await {
                        warn!(err = %e, "failed to ack job");
                    }
                }
            }
            Err(e) => {
                error!(err = %e, "failed to report results, leaving jobs unacked");
            }
        }
    }
}
