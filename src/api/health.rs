use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub database: String,
}

/// Liveness plus a store round trip; 503 while the database is unreachable
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let version = env!("CARGO_PKG_VERSION").to_string();

    let (status, code, database) = match state.store.health_check().await {
        Ok(()) => ("healthy", StatusCode::OK, "connected"),
        Err(e) => {
            warn!("Health check failed: {}", e);
            ("degraded", StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };

    let response = HealthResponse {
        status: status.to_string(),
        version,
        environment: state.environment.to_string(),
        database: database.to_string(),
    };

    (code, Json(response))
}
