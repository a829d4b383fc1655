//! Domain layer: the employee record and its row mapping.

pub mod employee;

pub use employee::{Employee, EmployeeRow};
