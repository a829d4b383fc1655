//! Employee service: reads go straight to the store, writes go through the
//! guarded writer.

use futures_util::TryStreamExt;

use crate::domain::Employee;
use crate::error::ServiceError;
use crate::persistence::RecordStore;
use crate::resilience::{BreakerMetrics, GuardedWriter};

/// Orchestration layer behind the HTTP handlers.
///
/// Reads are not guarded: they use the current session directly and report
/// failures as they are. Writes are validated, then handed to the
/// [`GuardedWriter`].
#[derive(Debug, Clone)]
pub struct EmployeeService {
    store: RecordStore,
    writer: GuardedWriter,
}

impl EmployeeService {
    /// Creates a new `EmployeeService`.
    #[must_use]
    pub fn new(store: RecordStore, writer: GuardedWriter) -> Self {
        Self { store, writer }
    }

    /// Returns every employee.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Read`] if the scan fails or any row cannot be
    /// decoded.
    pub async fn list_employees(&self) -> Result<Vec<Employee>, ServiceError> {
        tracing::debug!("listing employees");
        let employees: Vec<Employee> = self.store.list_all().await.try_collect().await?;
        Ok(employees)
    }

    /// Returns one employee by id.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::EmployeeNotFound`] for an unknown id and
    /// [`ServiceError::Read`] on read failure.
    pub async fn get_employee(&self, id: &str) -> Result<Employee, ServiceError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::EmployeeNotFound(id.to_string()))
    }

    /// Creates or replaces an employee through the guarded writer.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidRequest`] for a blank id and
    /// [`ServiceError::Unavailable`] for any guarded-write failure.
    pub async fn upsert_employee(&self, employee: Employee) -> Result<Employee, ServiceError> {
        if employee.id.trim().is_empty() {
            return Err(ServiceError::InvalidRequest("id must not be empty".to_string()));
        }
        tracing::info!(id = %employee.id, "upserting employee");
        Ok(self.writer.upsert(employee).await?)
    }

    /// Returns the write breaker's current metrics.
    #[must_use]
    pub fn breaker_metrics(&self) -> BreakerMetrics {
        self.writer.breaker().metrics()
    }

    /// Number of writes currently holding a bulkhead slot, including
    /// writes whose callers already timed out.
    #[must_use]
    pub fn writes_in_flight(&self) -> usize {
        self.writer.bulkhead().in_flight()
    }

    /// Returns `true` when a database session is installed.
    pub async fn is_connected(&self) -> bool {
        self.store.connections().is_connected().await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::{DecodeError, GuardError};
    use crate::persistence::ConnectionManager;
    use crate::persistence::memory::MemoryCluster;
    use crate::resilience::BreakerConfig;

    async fn make_service(cluster: &MemoryCluster) -> EmployeeService {
        let connections = Arc::new(ConnectionManager::new(cluster.connector()));
        let Ok(_) = connections.connect().await else {
            panic!("connect failed");
        };
        let store = RecordStore::new(connections);
        let writer = GuardedWriter::new(store.clone(), BreakerConfig::default());
        EmployeeService::new(store, writer)
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let cluster = MemoryCluster::new();
        let service = make_service(&cluster).await;
        let emp = Employee::new("1").with_last_name("Hopper").with_age(85);

        let result = service.upsert_employee(emp.clone()).await;
        assert!(result.is_ok());

        let Ok(fetched) = service.get_employee("1").await else {
            panic!("employee not found");
        };
        assert_eq!(fetched, emp);
    }

    #[tokio::test]
    async fn blank_id_is_rejected_before_writing() {
        let cluster = MemoryCluster::new();
        let service = make_service(&cluster).await;

        let result = service.upsert_employee(Employee::new("  ")).await;
        assert!(matches!(result, Err(ServiceError::InvalidRequest(_))));
        assert_eq!(cluster.update_calls(), 0);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let cluster = MemoryCluster::new();
        let service = make_service(&cluster).await;

        let result = service.get_employee("404").await;
        assert!(matches!(result, Err(ServiceError::EmployeeNotFound(_))));
    }

    #[tokio::test]
    async fn write_failure_is_unavailable() {
        let cluster = MemoryCluster::new();
        let service = make_service(&cluster).await;
        cluster.fail_next_write(crate::error::WriteError::QueryFailed("boom".into()));

        let result = service.upsert_employee(Employee::new("1")).await;
        assert!(matches!(
            result,
            Err(ServiceError::Unavailable(GuardError::Write(_)))
        ));
        assert_eq!(service.breaker_metrics().error_count, 1);
    }

    #[tokio::test]
    async fn list_surfaces_decode_errors() {
        let cluster = MemoryCluster::new();
        cluster.insert(Employee::new("1"));
        cluster.fail_reads(DecodeError("firstname: expected text".into()).into());
        let service = make_service(&cluster).await;

        let result = service.list_employees().await;
        assert!(matches!(result, Err(ServiceError::Read(_))));
    }
}
