//! emp-gateway server entry point.
//!
//! Connects to Cassandra, then starts the Axum HTTP server. A failed
//! startup connection aborts the process.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use emp_gateway::api;
use emp_gateway::app_state::AppState;
use emp_gateway::config::ServiceConfig;
use emp_gateway::persistence::{CassandraConnector, ConnectionManager, RecordStore};
use emp_gateway::resilience::GuardedWriter;
use emp_gateway::service::EmployeeService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = ServiceConfig::from_env().context("invalid configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(addr = %config.listen_addr, "starting emp-gateway");

    // Establish the initial session
    let connector = Arc::new(CassandraConnector::new(config.cassandra.clone()));
    let connections = Arc::new(ConnectionManager::new(connector));
    connections
        .connect()
        .await
        .context("initial Cassandra connection failed")?;

    // Build service layer
    let store = RecordStore::new(connections);
    let writer = GuardedWriter::new(store.clone(), config.breaker.clone());
    let employee_service = Arc::new(EmployeeService::new(store, writer));

    // Build application state
    let app_state = AppState { employee_service };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
