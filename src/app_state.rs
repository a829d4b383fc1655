//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::EmployeeService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Employee service for all reads and writes.
    pub employee_service: Arc<EmployeeService>,
}
