//! In-memory cluster used by tests.
//!
//! [`MemoryCluster`] plays the database: it stores rows, counts connects and
//! writes, tracks how many sessions are alive, and can be scripted to fail
//! the next connect, the next writes, or every read.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::{self, BoxStream};
use futures_util::{FutureExt, StreamExt};

use super::{Connector, Session};
use crate::domain::Employee;
use crate::error::{ConnectionError, ReadError, WriteError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct ClusterState {
    rows: Mutex<BTreeMap<String, Employee>>,
    write_failures: Mutex<VecDeque<WriteError>>,
    connect_failures: Mutex<VecDeque<String>>,
    read_failure: Mutex<Option<ReadError>>,
    write_delay: Mutex<Option<Duration>>,
    connect_calls: AtomicUsize,
    update_calls: AtomicUsize,
    live_sessions: AtomicUsize,
}

/// Shared handle to the fake database.
#[derive(Debug, Clone, Default)]
pub struct MemoryCluster {
    state: Arc<ClusterState>,
}

impl MemoryCluster {
    /// Creates an empty, healthy cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a connector producing sessions against this cluster.
    #[must_use]
    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(MemoryConnector {
            state: Arc::clone(&self.state),
        })
    }

    /// Makes the next `connect` fail with `reason`.
    pub fn fail_next_connect(&self, reason: &str) {
        lock(&self.state.connect_failures).push_back(reason.to_string());
    }

    /// Queues `err` as the result of the next write.
    pub fn fail_next_write(&self, err: WriteError) {
        lock(&self.state.write_failures).push_back(err);
    }

    /// Makes every full-table scan end with `err` after the stored rows.
    pub fn fail_reads(&self, err: ReadError) {
        *lock(&self.state.read_failure) = Some(err);
    }

    /// Makes every write take `delay` before completing.
    pub fn slow_writes(&self, delay: Duration) {
        *lock(&self.state.write_delay) = Some(delay);
    }

    /// Stores a row directly, bypassing sessions.
    pub fn insert(&self, employee: Employee) {
        lock(&self.state.rows).insert(employee.id.clone(), employee);
    }

    /// Returns the stored row for `id`.
    #[must_use]
    pub fn row(&self, id: &str) -> Option<Employee> {
        lock(&self.state.rows).get(id).cloned()
    }

    /// Number of `connect` attempts so far.
    #[must_use]
    pub fn connect_calls(&self) -> usize {
        self.state.connect_calls.load(Ordering::SeqCst)
    }

    /// Number of `update` attempts so far.
    #[must_use]
    pub fn update_calls(&self) -> usize {
        self.state.update_calls.load(Ordering::SeqCst)
    }

    /// Number of sessions not yet dropped.
    #[must_use]
    pub fn live_sessions(&self) -> usize {
        self.state.live_sessions.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct MemoryConnector {
    state: Arc<ClusterState>,
}

impl Connector for MemoryConnector {
    fn connect(&self) -> BoxFuture<'_, Result<Arc<dyn Session>, ConnectionError>> {
        async move {
            self.state.connect_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(reason) = lock(&self.state.connect_failures).pop_front() {
                return Err(ConnectionError::Session(reason));
            }
            self.state.live_sessions.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(MemorySession {
                state: Arc::clone(&self.state),
            }) as Arc<dyn Session>)
        }
        .boxed()
    }
}

#[derive(Debug)]
struct MemorySession {
    state: Arc<ClusterState>,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.state.live_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Session for MemorySession {
    fn select_all(&self) -> BoxStream<'static, Result<Employee, ReadError>> {
        let rows: Vec<Result<Employee, ReadError>> =
            lock(&self.state.rows).values().cloned().map(Ok).collect();
        let tail = lock(&self.state.read_failure).clone().map(Err);
        stream::iter(rows).chain(stream::iter(tail)).boxed()
    }

    fn select_one<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Employee>, ReadError>> {
        async move { Ok(lock(&self.state.rows).get(id).cloned()) }.boxed()
    }

    fn update<'a>(&'a self, employee: &'a Employee) -> BoxFuture<'a, Result<(), WriteError>> {
        async move {
            self.state.update_calls.fetch_add(1, Ordering::SeqCst);
            let delay = *lock(&self.state.write_delay);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(err) = lock(&self.state.write_failures).pop_front() {
                return Err(err);
            }
            lock(&self.state.rows).insert(employee.id.clone(), employee.clone());
            Ok(())
        }
        .boxed()
    }
}
