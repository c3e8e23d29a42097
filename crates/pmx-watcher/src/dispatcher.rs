//! The event dispatch loop.
//!
//! [`Dispatcher`] is the single consumer of the backend's event stream. For
//! each raw event it resolves the target under the state lock, releases the
//! lock, and then invokes the subscribers in registration order on its own
//! task. Primitive errors are logged and counted; the loop only ends when the
//! stream does, which happens when the backend is closed.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backend::EventStream;
use crate::engine::WatchState;

/// Lifecycle of the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatcherState {
    /// Consuming events.
    Running,
    /// The event stream ended.
    Terminated,
}

/// Counters collected over one run of the dispatch loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Raw events read from the stream.
    pub received: usize,
    /// Subscriber callbacks invoked.
    pub dispatched: usize,
    /// Raw events that resolved to no subscriber.
    pub discarded: usize,
    /// Primitive errors read from the stream.
    pub errors: usize,
}

/// Consumes a backend's event stream and notifies subscribers.
///
/// Obtained from [`PathWatcher::new`](crate::PathWatcher::new); run it with
/// [`spawn`](Self::spawn) or await [`run`](Self::run) directly.
pub struct Dispatcher {
    state: Arc<Mutex<WatchState>>,
    events: EventStream,
    state_tx: watch::Sender<DispatcherState>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("state", &*self.state_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub(crate) fn new(
        state: Arc<Mutex<WatchState>>,
        events: EventStream,
        state_tx: watch::Sender<DispatcherState>,
    ) -> Self {
        Self {
            state,
            events,
            state_tx,
        }
    }

    /// Runs the loop until the event stream ends.
    pub async fn run(mut self) -> DispatchStats {
        tracing::info!("Dispatcher running");
        let mut stats = DispatchStats::default();

        while let Some(item) = self.events.recv().await {
            let event = match item {
                Ok(event) => event,
                Err(err) => {
                    stats.errors += 1;
                    tracing::warn!(
                        error = %err,
                        recoverable = err.is_recoverable(),
                        "Watch primitive reported an error"
                    );
                    continue;
                }
            };
            stats.received += 1;

            let resolved = self.state.lock().resolve(&event);
            let Some(dispatch) = resolved else {
                stats.discarded += 1;
                tracing::trace!(
                    path = %event.path,
                    kind = ?event.kind,
                    "Discarded unroutable event"
                );
                continue;
            };

            tracing::trace!(
                path = %dispatch.path,
                kind = %dispatch.kind,
                subscribers = dispatch.subscribers.len(),
                "Dispatching event"
            );
            stats.dispatched += dispatch.deliver();
        }

        self.state_tx.send_replace(DispatcherState::Terminated);
        tracing::info!(
            received = stats.received,
            dispatched = stats.dispatched,
            discarded = stats.discarded,
            errors = stats.errors,
            "Dispatcher terminated"
        );
        stats
    }

    /// Spawns [`run`](Self::run) onto the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn(self) -> JoinHandle<DispatchStats> {
        tokio::spawn(self.run())
    }
}
