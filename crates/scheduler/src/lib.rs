//! Periodic scheduling of check jobs onto the per-region queues.
//!
//! Each tick loads active monitors, selects the due ones, builds one job per
//! (monitor, region) pair and publishes to every region's queue
//! concurrently. Regions fail independently; `last_checked_at` advances as
//! long as at least one region accepted the tick's jobs, so a single region
//! outage never turns into a scheduling storm.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;
use eyre::Result;
use futures::future::join_all;
use models::{CheckJob, Region};
use queue::JobPublisher;
use storage::Store;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

pub mod due;

pub use due::is_due;

/// Outcome of one scheduler tick, logged for observability.
#[derive(Debug)]
pub struct TickReport {
    /// Monitors that were due this tick
    pub due_monitors: usize,
    /// Jobs accepted by at least their region's queue
    pub jobs_sent: usize,
    /// Regions whose queue rejected or timed out
    pub failed_regions: Vec<Region>,
    /// Wall time spent in the tick
    pub elapsed: Duration,
}

/// The scheduling engine. Owns a store handle and one publisher per enabled
/// region; regions are injected so tests can swap in fakes.
pub struct Scheduler {
    store: Arc<dyn Store>,
    publishers: HashMap<Region, Arc<dyn JobPublisher>>,
    tick_interval: Duration,
    publish_timeout: Duration,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("regions", &self.publishers.keys().collect::<Vec<_>>())
            .field("tick_interval", &self.tick_interval)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Build a scheduler over the given store and region publishers.
    pub fn new(
        store: Arc<dyn Store>,
        publishers: HashMap<Region, Arc<dyn JobPublisher>>,
        tick_interval: Duration,
        publish_timeout: Duration,
    ) -> Self {
        Self { store, publishers, tick_interval, publish_timeout }
    }

    /// Tick forever. A failed tick is logged and the loop continues; missed
    /// ticks are delayed rather than bursted.
    pub async fn run(&self) -> Result<()> {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match self.tick().await {
                Ok(report) => info!(
                    due = report.due_monitors,
                    sent = report.jobs_sent,
                    failed_regions = ?report.failed_regions,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "scheduler tick"
                ),
                Err(e) => error!(err = %e, "scheduler tick failed"),
            }
        }
    }

    /// Run one scheduling pass.
    pub async fn tick(&self) -> Result<TickReport> {
        let started = std::time::Instant::now();
        let now = Utc::now();

        let connected: Vec<_> =
            self.publishers.values().filter(|p| p.is_connected()).cloned().collect();
        // A disconnected region fails the tick for its jobs even when the
        // others carry on.
        let mut failed_regions: Vec<Region> = self
            .publishers
            .values()
            .filter(|p| !p.is_connected())
            .map(|p| p.region())
            .collect();
        if !failed_regions.is_empty() {
            warn!(regions = ?failed_regions, "region transport disconnected");
        }
        if connected.is_empty() {
            warn!("no region transport connected, skipping tick");
            return Ok(TickReport {
                due_monitors: 0,
                jobs_sent: 0,
                failed_regions,
                elapsed: started.elapsed(),
            });
        }

        let monitors = self.store.active_monitors().await?;
        let due: Vec<_> = monitors.into_iter().filter(|m| is_due(m, now)).collect();
        if due.is_empty() {
            return Ok(TickReport {
                due_monitors: 0,
                jobs_sent: 0,
                failed_regions,
                elapsed: started.elapsed(),
            });
        }

        let publishes = connected.iter().map(|publisher| {
            let region = publisher.region();
            let jobs: Vec<CheckJob> =
                due.iter().map(|m| CheckJob::for_monitor(m, region)).collect();
            async move {
                let sent = jobs.len();
                match tokio::time::timeout(self.publish_timeout, publisher.publish_jobs(&jobs))
                    .await
                {
                    Ok(Ok(())) => (region, Ok(sent)),
                    Ok(Err(e)) => (region, Err(e)),
                    Err(_) => (region, Err(eyre::eyre!("publish timed out"))),
                }
            }
        });

        let mut jobs_sent = 0;
        for (region, outcome) in join_all(publishes).await {
            match outcome {
                Ok(sent) => jobs_sent += sent,
                Err(e) => {
                    warn!(region = %region, err = %e, "region publish failed");
                    failed_regions.push(region);
                }
            }
        }

        // Advance the clock only if some region accepted this tick's jobs;
        // a fully-failed tick retries the same monitors next time.
        if jobs_sent > 0 {
            let ids: Vec<String> = due.iter().map(|m| m.id.clone()).collect();
            self.store.mark_scheduled(&ids, now).await?;
        }

        Ok(TickReport {
            due_monitors: due.len(),
            jobs_sent,
            failed_regions,
            elapsed: started.elapsed(),
        })
    }
}
