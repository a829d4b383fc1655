//! Owner of the single current database session.
//!
//! [`ConnectionManager`] keeps the active session in a slot guarded by a
//! [`tokio::sync::RwLock`]. Readers clone the `Arc` out of the slot and run
//! their query against that snapshot, so a concurrent reconnect never tears
//! a reader's view. Reconnects are serialized by a separate mutex.
//!
//! The slot stays empty while a reconnect is in progress, which can last up
//! to the connect timeout. Writes arriving in that gap see no session and
//! queue their own reconnect behind the running one; each of those then
//! replaces the session that was just installed. Such back-to-back
//! reconnects are logged at `warn` level.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use super::{Connector, Session};
use crate::error::ConnectionError;

/// Holds and (re)establishes the process-wide session.
///
/// At most one session is current at any time: [`connect`](Self::connect)
/// empties the slot, releasing the previous session, before it builds the
/// next one.
#[derive(Debug)]
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    current: RwLock<Option<Arc<dyn Session>>>,
    /// Serializes reconnects; holds when the last one finished.
    reconnect: Mutex<Option<Instant>>,
}

/// A reconnect starting this soon after the previous one finished is
/// reported as back-to-back.
const BACK_TO_BACK: Duration = Duration::from_secs(1);

/// True when a reconnect starting at `now` directly follows the one that
/// finished at `last`.
fn is_back_to_back(last: Option<Instant>, now: Instant) -> bool {
    last.is_some_and(|finished| now.saturating_duration_since(finished) < BACK_TO_BACK)
}

impl ConnectionManager {
    /// Creates a manager with an empty slot. Call
    /// [`connect`](Self::connect) to install the first session.
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            current: RwLock::new(None),
            reconnect: Mutex::new(None),
        }
    }

    /// Releases the current session (if any) and establishes a new one.
    ///
    /// Concurrent callers are serialized; each one performs its own
    /// release-and-connect cycle. Queries already holding the previous
    /// session keep their reference and may finish or fail against it.
    ///
    /// # Errors
    ///
    /// Returns the [`ConnectionError`] from the connector. The slot is left
    /// empty in that case.
    pub async fn connect(&self) -> Result<Arc<dyn Session>, ConnectionError> {
        let mut last_finished = self.reconnect.lock().await;
        let started = Instant::now();
        if is_back_to_back(*last_finished, started) {
            tracing::warn!(
                since_previous_ms = last_finished
                    .map_or(0, |at| started.saturating_duration_since(at).as_millis()),
                "reconnecting right after a previous reconnect"
            );
        }

        if let Some(previous) = self.current.write().await.take() {
            tracing::debug!(
                outstanding_refs = Arc::strong_count(&previous) - 1,
                "releasing previous session"
            );
            drop(previous);
        }

        let result = self.connector.connect().await;
        *last_finished = Some(Instant::now());
        match result {
            Ok(session) => {
                *self.current.write().await = Some(Arc::clone(&session));
                tracing::info!("session installed");
                Ok(session)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to establish session");
                Err(e)
            }
        }
    }

    /// Returns a snapshot of the current session, or `None` when the slot is
    /// empty.
    pub async fn current(&self) -> Option<Arc<dyn Session>> {
        self.current.read().await.clone()
    }

    /// Returns `true` when a session is installed.
    pub async fn is_connected(&self) -> bool {
        self.current.read().await.is_some()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Employee;
    use crate::persistence::memory::MemoryCluster;

    #[tokio::test]
    async fn starts_disconnected() {
        let cluster = MemoryCluster::new();
        let manager = ConnectionManager::new(cluster.connector());
        assert!(!manager.is_connected().await);
        assert!(manager.current().await.is_none());
    }

    #[tokio::test]
    async fn connect_installs_session() {
        let cluster = MemoryCluster::new();
        let manager = ConnectionManager::new(cluster.connector());

        let result = manager.connect().await;
        assert!(result.is_ok());
        assert!(manager.is_connected().await);
        assert_eq!(cluster.connect_calls(), 1);
        assert_eq!(cluster.live_sessions(), 1);
    }

    #[tokio::test]
    async fn reconnect_releases_previous_session() {
        let cluster = MemoryCluster::new();
        let manager = ConnectionManager::new(cluster.connector());

        let _ = manager.connect().await;
        let _ = manager.connect().await;
        let _ = manager.connect().await;

        assert_eq!(cluster.connect_calls(), 3);
        assert_eq!(cluster.live_sessions(), 1);
    }

    #[tokio::test]
    async fn failed_connect_leaves_slot_empty() {
        let cluster = MemoryCluster::new();
        let manager = ConnectionManager::new(cluster.connector());
        let _ = manager.connect().await;

        cluster.fail_next_connect("cluster unreachable");
        let result = manager.connect().await;

        assert!(result.is_err());
        assert!(!manager.is_connected().await);
        assert_eq!(cluster.live_sessions(), 0);
    }

    #[tokio::test]
    async fn stale_snapshot_outlives_reconnect() {
        let cluster = MemoryCluster::new();
        let manager = ConnectionManager::new(cluster.connector());
        let _ = manager.connect().await;

        let Some(stale) = manager.current().await else {
            panic!("expected a session");
        };
        let _ = manager.connect().await;

        // The old handle is no longer current but still usable by its holder.
        assert_eq!(cluster.live_sessions(), 2);
        let write = stale.update(&Employee::new("1")).await;
        assert!(write.is_ok());
        drop(stale);
        assert_eq!(cluster.live_sessions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_back_reconnects_are_detected() {
        let start = Instant::now();
        assert!(!is_back_to_back(None, start));
        assert!(is_back_to_back(Some(start), start + Duration::from_millis(999)));
        assert!(!is_back_to_back(Some(start), start + BACK_TO_BACK));
    }

    #[tokio::test(start_paused = true)]
    async fn queued_reconnects_each_replace_the_session() {
        let cluster = MemoryCluster::new();
        let manager = ConnectionManager::new(cluster.connector());
        let _ = manager.connect().await;

        // Two writers that both saw the slot empty reconnect one after the
        // other; the second tears down what the first installed.
        let Ok(first) = manager.connect().await else {
            panic!("reconnect failed");
        };
        let Ok(second) = manager.connect().await else {
            panic!("reconnect failed");
        };
        drop(first);

        let Some(current) = manager.current().await else {
            panic!("expected a session");
        };
        assert!(Arc::ptr_eq(&second, &current));
        drop((second, current));
        assert_eq!(cluster.connect_calls(), 3);
        assert_eq!(cluster.live_sessions(), 1);
        assert!(is_back_to_back(*manager.reconnect.lock().await, Instant::now()));

        tokio::time::advance(BACK_TO_BACK).await;
        assert!(!is_back_to_back(*manager.reconnect.lock().await, Instant::now()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_connects_keep_one_session() {
        let cluster = MemoryCluster::new();
        let manager = Arc::new(ConnectionManager::new(cluster.connector()));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                let _ = manager.connect().await;
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }

        assert_eq!(cluster.connect_calls(), 16);
        assert_eq!(cluster.live_sessions(), 1);
        assert!(manager.is_connected().await);
    }
}
