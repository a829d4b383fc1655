//! Service layer: orchestrates employee reads and guarded writes.

pub mod employee_service;

pub use employee_service::EmployeeService;
