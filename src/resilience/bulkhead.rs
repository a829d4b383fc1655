//! Concurrency cap for a single guarded command.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::{self, BoxFuture};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tower::{Layer, Service};

use crate::error::GuardError;

/// Non-waiting bulkhead: a call either gets a slot immediately or is
/// rejected.
///
/// The returned permit frees the slot when dropped, so a write that keeps
/// running after its caller stopped waiting still occupies its slot.
#[derive(Debug, Clone)]
pub struct Bulkhead {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl Bulkhead {
    /// Creates a bulkhead with `max_concurrent` slots.
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Takes a slot without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::BulkheadFull`] when every slot is taken.
    pub fn try_acquire(&self) -> Result<OwnedSemaphorePermit, GuardError> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .map_err(|_| GuardError::BulkheadFull {
                max_concurrent: self.max_concurrent,
            })
    }

    /// Number of slots currently taken.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.max_concurrent
            .saturating_sub(self.semaphore.available_permits())
    }
}

/// Applies a shared [`Bulkhead`] to a service.
#[derive(Debug, Clone)]
pub struct BulkheadLayer {
    bulkhead: Bulkhead,
}

impl BulkheadLayer {
    /// Limits wrapped services to the slots of `bulkhead`.
    #[must_use]
    pub const fn new(bulkhead: Bulkhead) -> Self {
        Self { bulkhead }
    }
}

impl<S> Layer<S> for BulkheadLayer {
    type Service = BulkheadService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BulkheadService {
            inner,
            bulkhead: self.bulkhead.clone(),
        }
    }
}

/// Service whose calls each run on their own task while holding a bulkhead
/// slot.
///
/// Dropping the returned future detaches the task instead of cancelling it:
/// the call runs to the end and keeps its slot until then.
#[derive(Debug, Clone)]
pub struct BulkheadService<S> {
    inner: S,
    bulkhead: Bulkhead,
}

impl<S, Req> Service<Req> for BulkheadService<S>
where
    S: Service<Req, Error = GuardError>,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
{
    type Response = S::Response;
    type Error = GuardError;
    type Future = BoxFuture<'static, Result<S::Response, GuardError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Req) -> Self::Future {
        let permit = match self.bulkhead.try_acquire() {
            Ok(permit) => permit,
            Err(full) => return Box::pin(future::ready(Err(full))),
        };
        let response = self.inner.call(request);
        let task = tokio::spawn(async move {
            let _permit = permit;
            response.await
        });
        Box::pin(async move {
            task.await
                .unwrap_or_else(|join_error| Err(GuardError::Aborted(join_error.to_string())))
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use tokio_test::{assert_err, assert_ok};
    use tower::ServiceExt;

    use super::*;

    #[test]
    fn rejects_when_full() {
        let bulkhead = Bulkhead::new(2);
        let first = bulkhead.try_acquire();
        let second = bulkhead.try_acquire();
        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(bulkhead.in_flight(), 2);

        let third = bulkhead.try_acquire();
        assert!(matches!(
            third,
            Err(GuardError::BulkheadFull { max_concurrent: 2 })
        ));
    }

    #[test]
    fn dropping_a_permit_frees_the_slot() {
        let bulkhead = Bulkhead::new(1);
        let permit = bulkhead.try_acquire();
        assert!(bulkhead.try_acquire().is_err());
        drop(permit);
        assert!(bulkhead.try_acquire().is_ok());
        assert_eq!(bulkhead.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_call_keeps_its_slot_until_it_ends() {
        let bulkhead = Bulkhead::new(1);
        let service = BulkheadLayer::new(bulkhead.clone()).layer(tower::service_fn(
            |delay: Duration| async move {
                tokio::time::sleep(delay).await;
                Ok::<_, GuardError>(())
            },
        ));

        let abandoned = service.clone().oneshot(Duration::from_secs(5));
        let gave_up = tokio::time::timeout(Duration::from_secs(1), abandoned).await;
        assert!(gave_up.is_err());
        assert_eq!(bulkhead.in_flight(), 1);

        let err = assert_err!(service.clone().oneshot(Duration::ZERO).await);
        assert!(matches!(err, GuardError::BulkheadFull { max_concurrent: 1 }));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(bulkhead.in_flight(), 0);
        assert_ok!(service.oneshot(Duration::ZERO).await);
    }
}
