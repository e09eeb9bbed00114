/// Health check endpoint
///
/// ```text
/// GET /health
/// ```
///
/// Returns 200 with `"status": "healthy"` when the store answers, 503 with
/// `"status": "degraded"` otherwise:
///
/// ```json
/// { "data": { "status": "healthy", "version": "0.1.0", "database": "connected" } }
/// ```

use axum::{extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{app::AppState, response::Envelope};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Envelope<HealthResponse>) {
    let connected = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Store health check failed");
            false
        }
    };

    let (status, label, database) = if connected {
        (StatusCode::OK, "healthy", "connected")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded", "disconnected")
    };

    (
        status,
        Envelope::new(HealthResponse {
            status: label.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: database.to_string(),
        }),
    )
}
