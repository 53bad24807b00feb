//! Result ingestion gateway.
//!
//! Workers POST result batches here; the gateway authenticates them,
//! persists each result, drives the incident engine and hands any produced
//! alerts to the notifier without blocking the response.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use incident::{IncidentEngine, Notifier};
use models::{CheckResult, ErrorResponse, HealthResponse, IngestAck, Region};
use serde::Deserialize;
use storage::Store;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Header carrying the shared ingestion secret.
pub const API_SECRET_HEADER: &str = "x-api-secret";

/// Shared state handed to every handler.
pub struct AppState<S> {
    /// Persistence backend
    pub store: Arc<S>,
    /// Incident state machine
    pub engine: Arc<IncidentEngine<S>>,
    /// Alert dispatcher
    pub notifier: Arc<Notifier<S>>,
    /// Shared secret workers must present
    pub secret: String,
}

impl<S> std::fmt::Debug for AppState<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            engine: Arc::clone(&self.engine),
            notifier: Arc::clone(&self.notifier),
            secret: self.secret.clone(),
        }
    }
}

/// Batch envelope. Individual results are decoded one by one so a single
/// malformed item never rejects the rest of the batch.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    results: Vec<serde_json::Value>,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    region: Option<Region>,
}

/// Build the gateway router.
pub fn router<S: Store>(state: AppState<S>) -> Router {
    Router::new()
        .route("/webhooks/monitor-results", post(ingest::<S>))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok".to_owned() })
}

async fn ingest<S: Store>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let presented = headers.get(API_SECRET_HEADER).and_then(|v| v.to_str().ok());
    if presented != Some(state.secret.as_str()) {
        return (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new("Unauthorized")))
            .into_response();
    }

    let envelope: Envelope = match serde_json::from_str(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(err = %e, "rejecting malformed result batch");
            return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new("Invalid payload")))
                .into_response();
        }
    };

    let request_id = envelope.request_id.unwrap_or_default();
    let mut processed = 0;
    let mut skipped = 0;

    for item in envelope.results {
        match serde_json::from_value::<CheckResult>(item) {
            Ok(result) => {
                if process_result(&state, &result, &request_id).await {
                    processed += 1;
                } else {
                    skipped += 1;
                }
            }
            Err(e) => {
                warn!(request_id = %request_id, err = %e, "skipping malformed result");
                skipped += 1;
            }
        }
    }

    info!(
        request_id = %request_id,
        region = ?envelope.region,
        processed,
        skipped,
        "result batch ingested"
    );
    (StatusCode::OK, Json(IngestAck { success: true, processed, skipped })).into_response()
}

/// Handle one result end to end. Returns false when the result had to be
/// skipped; failures here never abort the rest of the batch.
async fn process_result<S: Store>(
    state: &AppState<S>,
    result: &CheckResult,
    request_id: &str,
) -> bool {
    match state.store.monitor(&result.monitor_id).await {
        Ok(Some(monitor)) if !monitor.is_deleted => {}
        Ok(_) => {
            warn!(monitor_id = %result.monitor_id, "skipping result for unknown monitor");
            return false;
        }
        Err(e) => {
            error!(monitor_id = %result.monitor_id, err = %e, "monitor lookup failed");
            return false;
        }
    }

    if let Err(e) = state.store.insert_check_result(result).await {
        error!(monitor_id = %result.monitor_id, err = %e, "failed to persist result");
        return false;
    }
    if let Err(e) = state.store.apply_result_to_monitor(result).await {
        error!(monitor_id = %result.monitor_id, err = %e, "failed to update monitor");
        return false;
    }

    match state.engine.apply(result).await {
        Ok(Some(alert)) => {
            let notifier = Arc::clone(&state.notifier);
            tokio::spawn(async move {
                if let Err(e) = notifier.dispatch(alert).await {
                    error!(err = %e, "alert dispatch failed");
                }
            });
        }
        Ok(None) => {}
        Err(e) => {
            error!(monitor_id = %result.monitor_id, err = %e, "incident transition failed");
            return false;
        }
    }

    let details = serde_json::json!({
        "region": result.region,
        "status": result.status,
        "statusCode": result.status_code,
        "responseTime": result.response_time_ms,
        "requestId": request_id,
    });
    if let Err(e) = state.store.append_monitor_log(&result.monitor_id, "checked", details).await
    {
        // The result itself is already applied; only the audit trail is lost.
        warn!(monitor_id = %result.monitor_id, err = %e, "failed to append audit log");
    }
    true
}
