//! System endpoints: health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::resilience::{BreakerMetrics, CircuitState};

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `healthy` when connected with a closed write breaker, else `degraded`.
    status: String,
    timestamp: String,
    version: String,
    /// Whether a database session is installed.
    database_connected: bool,
    /// Write breaker metrics.
    write_breaker: BreakerMetrics,
    /// Writes holding a bulkhead slot.
    writes_in_flight: usize,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health, version, session state and write breaker metrics.",
    responses(
        (status = 200, description = "Service health report", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let service = &state.employee_service;
    let database_connected = service.is_connected().await;
    let write_breaker = service.breaker_metrics();
    let healthy = database_connected && write_breaker.state == CircuitState::Closed;

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "degraded" }.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database_connected,
            write_breaker,
            writes_in_flight: service.writes_in_flight(),
        }),
    )
}

/// System routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
