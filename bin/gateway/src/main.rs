//! Gateway binary: accepts result batches from probe workers and drives the
//! incident lifecycle.

use std::{net::SocketAddr, sync::Arc};

use clap::Parser;
use config::GatewayCli;
use dotenvy::dotenv;
use gateway::{AppState, router};
use incident::{IncidentEngine, MailClient, Mailer, Notifier};
use runtime::shutdown_signal;
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

    let opts = GatewayCli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Gateway starting...");

    let store = Arc::new(PgStore::connect(&opts.database.database_url).await?);
    store.migrate().await?;

    let engine = Arc::new(IncidentEngine::new(Arc::clone(&store)));
    let mailer: Arc<dyn Mailer> = Arc::new(MailClient::new(
        &opts.mail.mail_api_url,
        opts.mail.mail_api_key,
        opts.mail.email_from,
    )?);
    let notifier = Arc::new(Notifier::new(Arc::clone(&store), mailer));

    let state =
        AppState { store, engine, notifier, secret: opts.gateway.internal_api_secret };
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", opts.gateway.host, opts.gateway.port).parse()?;
    info!("Gateway listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
