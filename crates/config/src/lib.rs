//! Stayup configuration
use clap::Parser;
use models::Region;
use url::Url;

/// Postgres database configuration options
#[derive(Debug, Clone, Parser)]
pub struct DatabaseOpts {
    /// Postgres connection string
    #[clap(long, env = "DATABASE_URL")]
    pub database_url: String,
}

/// NATS connection options
#[derive(Debug, Clone, Parser)]
pub struct NatsOpts {
    /// NATS server URL
    #[clap(long, env = "NATS_URL", default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,
}

/// Job fan-out configuration options
#[derive(Debug, Clone, Parser)]
pub struct QueueOpts {
    /// Regions jobs are fanned out to (comma separated)
    #[clap(
        long,
        env = "MONITOR_REGIONS",
        value_delimiter = ',',
        default_value = "us-east-1,eu-west-1,ap-south-1"
    )]
    pub regions: Vec<Region>,
    /// Per-region publish timeout in seconds
    #[clap(long, env = "QUEUE_PUBLISH_TIMEOUT_SECS", default_value = "5")]
    pub publish_timeout_secs: u64,
}

/// Scheduler tick configuration options
#[derive(Debug, Clone, Parser)]
pub struct SchedulerOpts {
    /// Seconds between scheduler ticks
    #[clap(long, env = "SCHEDULER_TICK_SECS", default_value = "60")]
    pub tick_secs: u64,
}

/// Ingestion gateway configuration options
#[derive(Debug, Clone, Parser)]
pub struct GatewayOpts {
    /// Gateway bind host
    #[clap(long, env = "GATEWAY_HOST", default_value = "0.0.0.0")]
    pub host: String,
    /// Gateway bind port
    #[clap(long, env = "GATEWAY_PORT", default_value = "3000")]
    pub port: u16,
    /// Shared secret workers must present on result submission
    #[clap(long, env = "INTERNAL_API_SECRET")]
    pub internal_api_secret: String,
}

/// Probe worker configuration options
#[derive(Debug, Clone, Parser)]
pub struct WorkerOpts {
    /// Region this worker probes from
    #[clap(long, env = "WORKER_REGION", default_value = "us-east-1")]
    pub region: Region,
    /// Ingestion endpoint results are reported to
    #[clap(long, env = "API_ENDPOINT", default_value = "http://127.0.0.1:3000")]
    pub api_endpoint: Url,
    /// Shared secret presented on result submission
    #[clap(long, env = "API_SECRET", default_value = "")]
    pub api_secret: String,
    /// Enable the exponential-backoff retry strategy for probes.
    /// Off by default: a job is attempted exactly once per delivery.
    #[clap(long, env = "PROBE_RETRIES")]
    pub probe_retries: bool,
    /// Maximum jobs pulled and probed per batch
    #[clap(long, env = "WORKER_BATCH_SIZE", default_value = "10")]
    pub batch_size: usize,
}

/// Outbound email configuration options
#[derive(Debug, Clone, Parser)]
pub struct MailOpts {
    /// Mail API base URL
    #[clap(long, env = "MAIL_API_URL", default_value = "https://api.mailchannels.net")]
    pub mail_api_url: Url,
    /// Mail API key
    #[clap(long, env = "MAIL_API_KEY", default_value = "")]
    pub mail_api_key: String,
    /// From address for alert emails
    #[clap(long, env = "EMAIL_FROM", default_value = "noreply@stayup.dev")]
    pub email_from: String,
}

/// Health server configuration options
#[derive(Debug, Clone, Parser)]
pub struct HealthOpts {
    /// Health server port
    #[clap(long, env = "HEALTH_PORT", default_value = "8090")]
    pub health_port: u16,
}

/// CLI options for the scheduler binary
#[derive(Debug, Clone, Parser)]
pub struct SchedulerCli {
    /// Postgres configuration
    #[clap(flatten)]
    pub database: DatabaseOpts,

    /// NATS connection
    #[clap(flatten)]
    pub nats: NatsOpts,

    /// Job fan-out configuration
    #[clap(flatten)]
    pub queue: QueueOpts,

    /// Tick configuration
    #[clap(flatten)]
    pub scheduler: SchedulerOpts,

    /// Health server configuration
    #[clap(flatten)]
    pub health: HealthOpts,
}

/// CLI options for the gateway binary
#[derive(Debug, Clone, Parser)]
pub struct GatewayCli {
    /// Postgres configuration
    #[clap(flatten)]
    pub database: DatabaseOpts,

    /// Ingestion gateway configuration
    #[clap(flatten)]
    pub gateway: GatewayOpts,

    /// Outbound email configuration
    #[clap(flatten)]
    pub mail: MailOpts,
}

/// CLI options for the probe worker binary
#[derive(Debug, Clone, Parser)]
pub struct WorkerCli {
    /// NATS connection
    #[clap(flatten)]
    pub nats: NatsOpts,

    /// Probe worker configuration
    #[clap(flatten)]
    pub worker: WorkerOpts,

    /// Health server configuration
    #[clap(flatten)]
    pub health: HealthOpts,
}
