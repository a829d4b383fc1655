//! Employee handlers: list, get, upsert.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::domain::Employee;
use crate::error::{ErrorResponse, ServiceError};

/// `GET /emp` — List all employees.
///
/// # Errors
///
/// Returns [`ServiceError::Read`] if the table scan fails.
#[utoipa::path(
    get,
    path = "/emp",
    tag = "Employees",
    summary = "List employees",
    description = "Returns every employee record. Absent fields are omitted.",
    responses(
        (status = 200, description = "All employees", body = Vec<Employee>),
        (status = 500, description = "Read failed", body = ErrorResponse),
    )
)]
pub async fn list_employees(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let employees = state.employee_service.list_employees().await?;
    Ok(Json(employees))
}

/// `GET /emp/{id}` — Get one employee.
///
/// # Errors
///
/// Returns [`ServiceError::EmployeeNotFound`] for an unknown id.
#[utoipa::path(
    get,
    path = "/emp/{id}",
    tag = "Employees",
    summary = "Get an employee",
    description = "Returns a single employee record by id.",
    params(
        ("id" = String, Path, description = "Employee id"),
    ),
    responses(
        (status = 200, description = "Employee record", body = Employee),
        (status = 404, description = "Employee not found", body = ErrorResponse),
        (status = 500, description = "Read failed", body = ErrorResponse),
    )
)]
pub async fn get_employee(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let employee = state.employee_service.get_employee(&id).await?;
    Ok(Json(employee))
}

/// `POST /emp` — Create or replace an employee.
///
/// The write runs behind the `upsert_cassandra` circuit breaker. Any
/// failure, including a rejection by the breaker, yields
/// `503 "Cassandra unavailable"`.
///
/// # Errors
///
/// Returns [`ServiceError::InvalidRequest`] for a malformed body and
/// [`ServiceError::Unavailable`] when the guarded write fails.
#[utoipa::path(
    post,
    path = "/emp",
    tag = "Employees",
    summary = "Upsert an employee",
    description = "Writes the record keyed by `id`. Fields missing from the body are stored as null.",
    request_body = Employee,
    responses(
        (status = 200, description = "Record written; echoed back", body = Employee),
        (status = 400, description = "Malformed body or empty id", body = ErrorResponse),
        (status = 503, description = "Database unavailable", body = String, example = json!("Cassandra unavailable")),
    )
)]
pub async fn upsert_employee(
    State(state): State<AppState>,
    payload: Result<Json<Employee>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(employee) = payload.map_err(|e| ServiceError::InvalidRequest(e.body_text()))?;
    let written = state.employee_service.upsert_employee(employee).await?;
    Ok((StatusCode::OK, Json(written)))
}

/// Employee routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/emp", get(list_employees).post(upsert_employee))
        .route("/emp/{id}", get(get_employee))
}
