use serde::{Deserialize, Serialize};

/// Response payload for health endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"ok"` when the service is up
    pub status: String,
}

/// Acknowledgement returned by the ingestion endpoint.
///
/// 200 is returned for any successfully-processed subset: `skipped` counts
/// results that failed item-level validation or processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestAck {
    /// True whenever the batch was accepted at all
    pub success: bool,
    /// Number of results processed
    pub processed: usize,
    /// Number of results skipped
    pub skipped: usize,
}

/// Error payload returned by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always false
    pub success: bool,
    /// Short error label
    pub error: String,
}

impl ErrorResponse {
    /// Build an error payload.
    pub fn new(error: impl Into<String>) -> Self {
        Self { success: false, error: error.into() }
    }
}
