//! Persistence layer: Cassandra sessions, the session slot, and the
//! record store.
//!
//! [`Session`] and [`Connector`] are the seam to the database driver. The
//! production implementation lives in [`cassandra`]; tests run against the
//! in-memory implementation in `memory`.

pub mod cassandra;
pub mod connection;
#[cfg(test)]
pub mod memory;
pub mod record_store;

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;

use crate::domain::Employee;
use crate::error::{ConnectionError, ReadError, WriteError};

pub use cassandra::{CassandraConnector, CassandraSession};
pub use connection::ConnectionManager;
pub use record_store::RecordStore;

/// A live database session able to run the `emps` statements.
///
/// Dropping the last reference to a session releases its connections.
pub trait Session: Send + Sync + fmt::Debug {
    /// Streams every row of the table. The stream is lazy and finite, and a
    /// new one is produced on each call.
    fn select_all(&self) -> BoxStream<'static, Result<Employee, ReadError>>;

    /// Reads a single row by primary key.
    fn select_one<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Employee>, ReadError>>;

    /// Runs the keyed `UPDATE` for `employee`.
    ///
    /// Must report [`WriteError::NoConnection`] when the driver has no
    /// usable connection, so the caller can reconnect.
    fn update<'a>(&'a self, employee: &'a Employee) -> BoxFuture<'a, Result<(), WriteError>>;
}

/// Builds new sessions against a fixed cluster and keyspace.
pub trait Connector: Send + Sync + fmt::Debug {
    /// Establishes a fresh session.
    fn connect(&self) -> BoxFuture<'_, Result<Arc<dyn Session>, ConnectionError>>;
}
