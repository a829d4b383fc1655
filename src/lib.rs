//! # emp-gateway
//!
//! REST service for employee records stored in Cassandra.
//!
//! Reads go straight to the current database session. Writes go through a
//! circuit breaker with a bounded-concurrency bulkhead and a per-call
//! timeout; a write that finds no usable session reconnects once and
//! retries. Every failed write is reported to the client as
//! `503 "Cassandra unavailable"`.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── EmployeeService (service/)
//!     │       │
//!     │       ├── reads ──────────────────────┐
//!     │       └── GuardedWriter (resilience/) │
//!     │             breaker, bulkhead,        │
//!     │             timeout, reconnect-retry  │
//!     │                      │                │
//!     ├── RecordStore (persistence/) ◄────────┘
//!     ├── ConnectionManager (persistence/)
//!     │
//!     └── Cassandra (scylla driver)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod resilience;
pub mod service;
