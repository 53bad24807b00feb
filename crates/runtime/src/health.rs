//! Standalone health endpoint for binaries without an HTTP surface of
//! their own (the scheduler and the probe workers).

use std::net::SocketAddr;

use axum::{Json, Router, routing::get};
use eyre::Result;
use models::HealthResponse;
use tracing::info;

use crate::shutdown::shutdown_signal;

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok".to_owned() })
}

/// Serve `GET /health` on `addr` until the process is asked to stop.
pub async fn serve(addr: SocketAddr) -> Result<()> {
    let app = Router::new().route("/health", get(health));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "health endpoint up");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
