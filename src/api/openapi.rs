//! OpenAPI document for the gateway.

use utoipa::OpenApi;

use super::handlers::{employee, system};
use crate::domain::Employee;
use crate::error::{ErrorBody, ErrorResponse};
use crate::resilience::{BreakerMetrics, CircuitState};

/// Collected OpenAPI description of every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "emp-gateway",
        description = "Employee records over Cassandra with a circuit-broken write path."
    ),
    paths(
        employee::list_employees,
        employee::get_employee,
        employee::upsert_employee,
        system::health_handler,
    ),
    components(schemas(
        Employee,
        ErrorResponse,
        ErrorBody,
        system::HealthResponse,
        BreakerMetrics,
        CircuitState,
    )),
    tags(
        (name = "Employees", description = "Employee record reads and writes"),
        (name = "System", description = "Service health"),
    )
)]
pub struct ApiDoc;
