//! Employee statements issued against the current session.

use std::sync::Arc;

use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;

use super::ConnectionManager;
use crate::domain::Employee;
use crate::error::{ReadError, WriteError};

/// Runs reads and keyed writes against whatever session the
/// [`ConnectionManager`] currently holds.
///
/// Every call takes its own snapshot of the session, so a reconnect in
/// another task only affects calls that start after it.
#[derive(Debug, Clone)]
pub struct RecordStore {
    connections: Arc<ConnectionManager>,
}

impl RecordStore {
    /// Creates a store backed by the given connection manager.
    #[must_use]
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }

    /// Returns the underlying connection manager.
    #[must_use]
    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    /// Streams every employee row.
    ///
    /// The stream yields [`ReadError::NoConnection`] once if no session is
    /// installed, and a [`ReadError::Decode`] for any row that does not
    /// match the expected shape. Consumers should stop at the first error.
    pub async fn list_all(&self) -> BoxStream<'static, Result<Employee, ReadError>> {
        match self.connections.current().await {
            Some(session) => session.select_all(),
            None => stream::once(async { Err(ReadError::NoConnection) }).boxed(),
        }
    }

    /// Reads one employee by id.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::NoConnection`] without a session, or the
    /// session's query/decode error.
    pub async fn get(&self, id: &str) -> Result<Option<Employee>, ReadError> {
        let session = self
            .connections
            .current()
            .await
            .ok_or(ReadError::NoConnection)?;
        session.select_one(id).await
    }

    /// Writes `employee` with a keyed update-or-insert.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::NoConnection`] when no session is installed or
    /// the session has lost its connections, and
    /// [`WriteError::QueryFailed`] for any other failure.
    pub async fn upsert(&self, employee: &Employee) -> Result<(), WriteError> {
        tracing::debug!(id = %employee.id, "updating employee");
        let session = self
            .connections
            .current()
            .await
            .ok_or(WriteError::NoConnection)?;
        session.update(employee).await
    }
}
