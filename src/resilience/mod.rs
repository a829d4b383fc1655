//! Fault tolerance for the write path: circuit breaker, bulkhead, and the
//! guarded writer that stacks them over a reconnect-retry.

pub mod bulkhead;
pub mod circuit_breaker;
pub mod config;
pub mod guarded_writer;
mod rolling;

pub use bulkhead::{Bulkhead, BulkheadLayer, BulkheadService};
pub use circuit_breaker::{
    Admission, BreakerMetrics, CircuitBreaker, CircuitBreakerLayer, CircuitBreakerService,
    CircuitState,
};
pub use config::BreakerConfig;
pub use guarded_writer::{GuardedWriter, PendingWrite, StoreWriter};
pub use rolling::HealthCounts;
