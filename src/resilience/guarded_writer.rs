//! Breaker- and bulkhead-guarded employee writes with one reconnect-retry.
//!
//! Every write passes through a tower stack, outermost first:
//!
//! ```text
//! CircuitBreakerLayer -> timeout -> BulkheadLayer -> StoreWriter
//! ```
//!
//! The breaker records every failure raised below it, a full bulkhead and
//! an elapsed timeout included. The bulkhead runs the write on its own
//! task, so a write the timeout gave up on keeps its slot until it ends.
//! [`StoreWriter`] rebuilds a lost session and retries exactly once; any
//! other failure is final. A supervising task drives the stack and hands
//! the outcome to the caller through a [`PendingWrite`].

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tower::timeout::error::Elapsed;
use tower::util::BoxCloneSyncService;
use tower::{BoxError, Layer, Service, ServiceBuilder, ServiceExt};

use super::{
    BreakerConfig, Bulkhead, BulkheadLayer, CircuitBreaker, CircuitBreakerLayer,
    CircuitBreakerService,
};
use crate::domain::Employee;
use crate::error::{GuardError, WriteError};
use crate::persistence::RecordStore;

type Outcome = Result<Employee, GuardError>;

type WriteStack = CircuitBreakerService<BoxCloneSyncService<Employee, Employee, GuardError>>;

/// Handle to a submitted write.
///
/// The outcome is produced exactly once. [`wait`](Self::wait) blocks until
/// it is available (at most the breaker timeout after submission);
/// [`try_outcome`](Self::try_outcome) checks without blocking and returns
/// `None` while the write is still running.
#[derive(Debug)]
#[must_use = "a submitted write reports its outcome through this handle"]
pub struct PendingWrite {
    rx: oneshot::Receiver<Outcome>,
}

impl PendingWrite {
    /// Waits for the outcome.
    ///
    /// # Errors
    ///
    /// Returns the [`GuardError`] the write ended with, or
    /// [`GuardError::Aborted`] if the supervising task went away without
    /// reporting.
    pub async fn wait(self) -> Outcome {
        self.rx
            .await
            .unwrap_or_else(|_| Err(GuardError::Aborted("outcome channel closed".to_string())))
    }

    /// Returns the outcome if it has arrived, `None` while the write is
    /// still pending.
    ///
    /// The outcome is handed out once; later calls report
    /// [`GuardError::Aborted`].
    pub fn try_outcome(&mut self) -> Option<Outcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(GuardError::Aborted(
                "outcome already taken or channel closed".to_string(),
            ))),
        }
    }
}

/// Innermost service of the write stack: one upsert, plus one
/// reconnect-retry when the session is gone.
#[derive(Debug, Clone)]
pub struct StoreWriter {
    store: RecordStore,
}

impl StoreWriter {
    /// Writes through `store`.
    #[must_use]
    pub const fn new(store: RecordStore) -> Self {
        Self { store }
    }
}

impl Service<Employee> for StoreWriter {
    type Response = Employee;
    type Error = GuardError;
    type Future = BoxFuture<'static, Outcome>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, employee: Employee) -> Self::Future {
        let store = self.store.clone();
        Box::pin(async move { write_with_reconnect(&store, employee).await })
    }
}

/// Runs [`RecordStore::upsert`] behind a circuit breaker, a timeout and a
/// bulkhead, reconnecting and retrying once when the session is gone.
#[derive(Debug, Clone)]
pub struct GuardedWriter {
    service: WriteStack,
    breaker: Arc<CircuitBreaker>,
    bulkhead: Bulkhead,
}

impl GuardedWriter {
    /// Creates a writer for `store` using the given breaker settings.
    #[must_use]
    pub fn new(store: RecordStore, config: BreakerConfig) -> Self {
        let timeout = config.timeout;
        let bulkhead = Bulkhead::new(config.max_concurrent);
        let breaker = Arc::new(CircuitBreaker::new(config));

        let limited = ServiceBuilder::new()
            .map_err(move |err: BoxError| into_guard_error(err, timeout))
            .timeout(timeout)
            .layer(BulkheadLayer::new(bulkhead.clone()))
            .service(StoreWriter::new(store));
        let service =
            CircuitBreakerLayer::new(Arc::clone(&breaker)).layer(BoxCloneSyncService::new(limited));

        Self {
            service,
            breaker,
            bulkhead,
        }
    }

    /// The breaker guarding the writes.
    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// The bulkhead limiting concurrent writes.
    #[must_use]
    pub const fn bulkhead(&self) -> &Bulkhead {
        &self.bulkhead
    }

    /// Submits a write and returns immediately.
    ///
    /// A call refused by the breaker or the bulkhead never reaches the
    /// database; its outcome arrives without waiting on any I/O.
    pub fn submit(&self, employee: Employee) -> PendingWrite {
        let (tx, rx) = oneshot::channel();
        let service = self.service.clone();

        tokio::spawn(async move {
            let id = employee.id.clone();
            let outcome = service.oneshot(employee).await;
            match &outcome {
                Ok(_) => tracing::debug!(%id, "guarded write succeeded"),
                Err(e @ (GuardError::CircuitOpen { .. } | GuardError::BulkheadFull { .. })) => {
                    tracing::warn!(%id, error = %e, "write rejected");
                }
                Err(e) => tracing::error!(%id, error = %e, "guarded write failed"),
            }
            let _ = tx.send(outcome);
        });

        PendingWrite { rx }
    }

    /// Submits a write and waits for its outcome.
    ///
    /// On success the written record is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::CircuitOpen`] or [`GuardError::BulkheadFull`]
    /// when the call is refused, [`GuardError::Timeout`] when it does not
    /// finish in time, [`GuardError::Connection`] when the reconnect fails,
    /// and [`GuardError::Write`] when the write (or its retry) fails.
    pub async fn upsert(&self, employee: Employee) -> Outcome {
        self.submit(employee).wait().await
    }
}

fn into_guard_error(err: BoxError, timeout: Duration) -> GuardError {
    match err.downcast::<GuardError>() {
        Ok(err) => *err,
        Err(err) if err.is::<Elapsed>() => GuardError::Timeout(timeout),
        Err(err) => GuardError::Aborted(err.to_string()),
    }
}

/// Writes once; on a lost session reconnects and writes exactly once more.
async fn write_with_reconnect(store: &RecordStore, employee: Employee) -> Outcome {
    match store.upsert(&employee).await {
        Ok(()) => Ok(employee),
        Err(WriteError::NoConnection) => {
            tracing::warn!(id = %employee.id, "session unavailable, reconnecting");
            store.connections().connect().await?;
            store.upsert(&employee).await?;
            tracing::info!(id = %employee.id, "write succeeded after reconnect");
            Ok(employee)
        }
        Err(e) => Err(e.into()),
    }
}
