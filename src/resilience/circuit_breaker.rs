//! Three-state circuit breaker with a rolling error-rate trip policy.
//!
//! ```text
//!            error% > threshold and volume reached
//!   Closed ─────────────────────────────────────────► Open
//!     ▲                                                │
//!     │ trial succeeds                 sleep window    │
//!     │                                elapsed         ▼
//!     └──────────────────────────────────────────── HalfOpen
//!                   trial fails: back to Open ◄────────┘
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures_util::future::{self, BoxFuture};
use serde::Serialize;
use tokio::time::Instant;
use tower::{Layer, Service};
use utoipa::ToSchema;

use super::BreakerConfig;
use super::rolling::{HealthCounts, RollingCounter};
use crate::error::GuardError;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass through and their outcomes are counted.
    Closed,
    /// Calls are rejected until the sleep window elapses.
    Open,
    /// A single trial call is in flight; everything else is rejected.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BreakerMetrics {
    /// Command name.
    pub name: String,
    /// Current state.
    pub state: CircuitState,
    /// Outcomes recorded in the rolling window.
    pub total_requests: u64,
    /// Failed outcomes recorded in the rolling window.
    pub error_count: u64,
    /// Error percentage over the rolling window.
    pub error_percentage: u32,
}

/// Proof that the breaker admitted a call. Hand it back with the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "the outcome of an admitted call must be recorded"]
pub struct Admission {
    trial: bool,
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    opened_at: Instant,
    counter: RollingCounter,
}

/// Circuit breaker for one named command.
///
/// Outcomes are kept in bucketed rolling counters. The trip condition is
/// checked after every outcome recorded while closed, successes included:
/// once the window holds at least `volume_threshold` outcomes and the error
/// percentage is strictly above `error_percent_threshold`, the breaker
/// opens. After `sleep_window`
/// exactly one call is admitted as a trial; its outcome alone decides
/// whether the breaker closes or reopens. Outcomes of calls admitted before
/// the breaker opened are still counted but never move the state out of
/// open or half-open.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    circuit: Mutex<Circuit>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        let counter = RollingCounter::new(config.rolling_window, config.rolling_buckets);
        Self {
            config,
            circuit: Mutex::new(Circuit {
                state: CircuitState::Closed,
                opened_at: Instant::now(),
                counter,
            }),
        }
    }

    /// Asks to run one call.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::CircuitOpen`] while the breaker is open and its
    /// sleep window has not elapsed, or while a half-open trial is in
    /// flight.
    pub fn try_acquire(&self) -> Result<Admission, GuardError> {
        let mut circuit = self.lock();
        let state = circuit.state;
        match state {
            CircuitState::Closed => Ok(Admission { trial: false }),
            CircuitState::Open => {
                if circuit.opened_at.elapsed() >= self.config.sleep_window {
                    self.transition(&mut circuit, CircuitState::HalfOpen);
                    Ok(Admission { trial: true })
                } else {
                    Err(self.rejection())
                }
            }
            CircuitState::HalfOpen => Err(self.rejection()),
        }
    }

    /// Records the outcome of an admitted call.
    pub fn record(&self, admission: Admission, success: bool) {
        let now = Instant::now();
        let mut circuit = self.lock();
        circuit.counter.record(now, !success);

        match (circuit.state, admission.trial, success) {
            (CircuitState::HalfOpen, true, true) => {
                circuit.counter.reset();
                self.transition(&mut circuit, CircuitState::Closed);
            }
            (CircuitState::HalfOpen, true, false) => {
                circuit.opened_at = now;
                self.transition(&mut circuit, CircuitState::Open);
            }
            (CircuitState::Closed, _, _) => {
                let counts = circuit.counter.counts(now);
                if self.should_trip(counts) {
                    tracing::warn!(
                        command = %self.config.name,
                        requests = counts.total,
                        error_percentage = counts.error_percentage(),
                        "error threshold exceeded"
                    );
                    circuit.opened_at = now;
                    self.transition(&mut circuit, CircuitState::Open);
                }
            }
            _ => {}
        }
    }

    /// Current state.
    ///
    /// An open breaker whose sleep window has elapsed still reports
    /// [`CircuitState::Open`] until a call arrives to test it.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Returns a snapshot of state and rolling counts.
    #[must_use]
    pub fn metrics(&self) -> BreakerMetrics {
        let circuit = self.lock();
        let counts = circuit.counter.counts(Instant::now());
        BreakerMetrics {
            name: self.config.name.clone(),
            state: circuit.state,
            total_requests: counts.total,
            error_count: counts.errors,
            error_percentage: counts.error_percentage(),
        }
    }

    fn should_trip(&self, counts: HealthCounts) -> bool {
        counts.total >= self.config.volume_threshold
            && counts.exceeds(self.config.error_percent_threshold)
    }

    fn transition(&self, circuit: &mut Circuit, to: CircuitState) {
        let from = circuit.state;
        circuit.state = to;
        tracing::info!(command = %self.config.name, %from, %to, "circuit state changed");
    }

    fn rejection(&self) -> GuardError {
        tracing::debug!(command = %self.config.name, "call short-circuited");
        GuardError::CircuitOpen {
            name: self.config.name.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Applies a shared [`CircuitBreaker`] to a service.
#[derive(Debug, Clone)]
pub struct CircuitBreakerLayer {
    breaker: Arc<CircuitBreaker>,
}

impl CircuitBreakerLayer {
    /// Wraps services in `breaker`.
    #[must_use]
    pub const fn new(breaker: Arc<CircuitBreaker>) -> Self {
        Self { breaker }
    }
}

impl<S> Layer<S> for CircuitBreakerLayer {
    type Service = CircuitBreakerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CircuitBreakerService {
            inner,
            breaker: Arc::clone(&self.breaker),
        }
    }
}

/// Service guarded by a [`CircuitBreaker`].
///
/// A refused call fails with [`GuardError::CircuitOpen`] without reaching
/// the inner service. Every admitted call has its outcome recorded once the
/// inner future resolves, whatever error it carries.
#[derive(Debug, Clone)]
pub struct CircuitBreakerService<S> {
    inner: S,
    breaker: Arc<CircuitBreaker>,
}

impl<S, Req> Service<Req> for CircuitBreakerService<S>
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
        let admission = match self.breaker.try_acquire() {
            Ok(admission) => admission,
            Err(rejected) => return Box::pin(future::ready(Err(rejected))),
        };
        let breaker = Arc::clone(&self.breaker);
        let response = self.inner.call(request);
        Box::pin(async move {
            let outcome = response.await;
            breaker.record(admission, outcome.is_ok());
            outcome
        })
    }
}
