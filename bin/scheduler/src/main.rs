//! Scheduler binary: ticks on an interval and fans due checks out to every
//! region's queue.

use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use clap::Parser;
use config::SchedulerCli;
use dotenvy::dotenv;
use models::Region;
use queue::{JobPublisher, NatsJobPublisher};
use runtime::run_until_shutdown;
use scheduler::Scheduler;
use storage::PgStore;
use tracing::info;
use tracing_subscriber::filter::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    if let Ok(custom_env_file) = std::env::var("ENV_FILE") {
        dotenvy::from_filename(custom_env_file)?;
    } else {
        dotenv().ok();
    }

    let opts = SchedulerCli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Scheduler starting...");

    let store = Arc::new(PgStore::connect(&opts.database.database_url).await?);
    store.migrate().await?;

    let nats_client = async_nats::connect(&opts.nats.nats_url).await?;
    let mut publishers: HashMap<Region, Arc<dyn JobPublisher>> = HashMap::new();
    for region in &opts.queue.regions {
        let publisher = NatsJobPublisher::new(nats_client.clone(), *region).await?;
        publishers.insert(*region, Arc::new(publisher));
    }
    info!(regions = ?opts.queue.regions, tick_secs = opts.scheduler.tick_secs, "transport ready");

    let health_addr = SocketAddr::from(([0, 0, 0, 0], opts.health.health_port));
    tokio::spawn(runtime::health::serve(health_addr));

    let scheduler = Scheduler::new(
        store,
        publishers,
        Duration::from_secs(opts.scheduler.tick_secs),
        Duration::from_secs(opts.queue.publish_timeout_secs),
    );

    run_until_shutdown(scheduler.run(), || {
        info!("Shutting down scheduler...");
    })
    .await
}
