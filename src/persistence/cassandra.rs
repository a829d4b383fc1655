//! Cassandra / ScyllaDB implementation of [`Session`] and [`Connector`]
//! using the `scylla` driver.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{FutureExt, StreamExt, TryFutureExt};
use scylla::client::session::Session as DriverSession;
use scylla::client::session_builder::SessionBuilder;
use scylla::errors::{
    ExecutionError, NextPageError, NextRowError, PagerExecutionError, PrepareError, RequestError,
};

use super::{Connector, Session};
use crate::config::CassandraConfig;
use crate::domain::{Employee, EmployeeRow};
use crate::error::{ConnectionError, DecodeError, ReadError, WriteError};

/// Session against one keyspace, bound to the `emps`-shaped table.
#[derive(Debug, Clone)]
pub struct CassandraSession {
    inner: Arc<DriverSession>,
    table: String,
}

impl CassandraSession {
    fn select_all_cql(&self) -> String {
        format!("SELECT id, firstname, lastname, age FROM {}", self.table)
    }

    fn select_one_cql(&self) -> String {
        format!(
            "SELECT id, firstname, lastname, age FROM {} WHERE id = ?",
            self.table
        )
    }

    fn update_cql(&self) -> String {
        format!(
            "UPDATE {} SET firstname = ?, lastname = ?, age = ? WHERE id = ?",
            self.table
        )
    }
}

impl Session for CassandraSession {
    fn select_all(&self) -> BoxStream<'static, Result<Employee, ReadError>> {
        let inner = Arc::clone(&self.inner);
        let cql = self.select_all_cql();

        async move {
            let pager = inner
                .query_iter(cql, ())
                .await
                .map_err(|e| {
                    if pager_is_connectivity(&e) {
                        ReadError::NoConnection
                    } else {
                        ReadError::Query(e.to_string())
                    }
                })?;
            let rows = pager
                .rows_stream::<EmployeeRow>()
                .map_err(|e| DecodeError(e.to_string()))?;
            Ok::<_, ReadError>(rows.map(|row| row.map(Employee::from).map_err(classify_row)))
        }
        .try_flatten_stream()
        .boxed()
    }

    fn select_one<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Employee>, ReadError>> {
        async move {
            let result = self
                .inner
                .query_unpaged(self.select_one_cql(), (id.to_owned(),))
                .await
                .map_err(|e| {
                    if is_connectivity(&e) {
                        ReadError::NoConnection
                    } else {
                        ReadError::Query(e.to_string())
                    }
                })?;
            let rows = result
                .into_rows_result()
                .map_err(|e| ReadError::Query(e.to_string()))?;
            let mut iter = rows
                .rows::<EmployeeRow>()
                .map_err(|e| DecodeError(e.to_string()))?;
            let first = iter
                .next()
                .transpose()
                .map_err(|e| DecodeError(e.to_string()))?;
            Ok(first.map(Employee::from))
        }
        .boxed()
    }

    fn update<'a>(&'a self, employee: &'a Employee) -> BoxFuture<'a, Result<(), WriteError>> {
        async move {
            self.inner
                .query_unpaged(self.update_cql(), employee.update_values())
                .await
                .map_err(|e| {
                    if is_connectivity(&e) {
                        WriteError::NoConnection
                    } else {
                        WriteError::QueryFailed(e.to_string())
                    }
                })?;
            Ok(())
        }
        .boxed()
    }
}

/// True when the driver could not reach any node, as opposed to a node
/// rejecting the statement.
fn is_connectivity(err: &ExecutionError) -> bool {
    matches!(
        err,
        ExecutionError::ConnectionPoolError(_)
            | ExecutionError::EmptyPlan
            | ExecutionError::PrepareError(PrepareError::ConnectionPoolError(_))
    )
}

fn request_is_connectivity(err: &RequestError) -> bool {
    matches!(
        err,
        RequestError::ConnectionPoolError(_) | RequestError::EmptyPlan
    )
}

/// Same split as [`is_connectivity`], for the paged scan.
fn pager_is_connectivity(err: &PagerExecutionError) -> bool {
    match err {
        PagerExecutionError::NextPageError(NextPageError::RequestFailure(e)) => {
            request_is_connectivity(e)
        }
        PagerExecutionError::PrepareError(PrepareError::ConnectionPoolError(_)) => true,
        _ => false,
    }
}

fn classify_row(err: NextRowError) -> ReadError {
    match err {
        NextRowError::RowDeserializationError(e) => DecodeError(e.to_string()).into(),
        NextRowError::NextPageError(NextPageError::RequestFailure(e))
            if request_is_connectivity(&e) =>
        {
            ReadError::NoConnection
        }
        other => ReadError::Query(other.to_string()),
    }
}

/// Creates [`CassandraSession`]s from the configured contact points.
#[derive(Debug, Clone)]
pub struct CassandraConnector {
    config: CassandraConfig,
}

impl CassandraConnector {
    /// Creates a connector for the given cluster settings.
    #[must_use]
    pub fn new(config: CassandraConfig) -> Self {
        Self { config }
    }

    async fn build(&self) -> Result<CassandraSession, ConnectionError> {
        if self.config.nodes.is_empty() {
            return Err(ConnectionError::NoContactPoints);
        }

        let mut builder = SessionBuilder::new()
            .use_keyspace(self.config.keyspace.as_str(), false)
            .connection_timeout(Duration::from_secs(self.config.connect_timeout_secs));
        for node in &self.config.nodes {
            builder = builder.known_node(node);
        }
        if let (Some(user), Some(password)) = (&self.config.username, &self.config.password) {
            builder = builder.user(user, password);
        }

        let inner = builder
            .build()
            .await
            .map_err(|e| ConnectionError::Session(e.to_string()))?;

        Ok(CassandraSession {
            inner: Arc::new(inner),
            table: self.config.table.clone(),
        })
    }
}

impl Connector for CassandraConnector {
    fn connect(&self) -> BoxFuture<'_, Result<Arc<dyn Session>, ConnectionError>> {
        async move {
            let session = self.build().await?;
            tracing::info!(
                nodes = ?self.config.nodes,
                keyspace = %self.config.keyspace,
                "cassandra session established"
            );
            Ok(Arc::new(session) as Arc<dyn Session>)
        }
        .boxed()
    }
}
