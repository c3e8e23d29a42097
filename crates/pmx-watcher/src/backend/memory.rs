//! In-process watch backend.
//!
//! [`MemoryBackend`] behaves like an OS primitive without touching the OS:
//! it records which paths hold a low-level watch and every add/remove call,
//! can be told to reject paths, and lets the caller inject raw events and
//! primitive errors into its stream. Tests use it to drive the engine and
//! dispatcher deterministically; `pathmux plan` uses it for dry runs.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use pmx_core::{FxHashMap, FxHashSet};
use tokio::sync::mpsc;

use super::{BackendEvent, EventStream, WatchBackend};
use crate::error::WatchError;
use crate::events::RawEvent;

/// A call made against a [`MemoryBackend`], in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BackendCall {
    /// `add_watch(path, recursive)`
    Add(Utf8PathBuf),
    /// `remove_watch(path)`
    Remove(Utf8PathBuf),
}

#[derive(Debug, Default)]
struct MemoryState {
    watches: FxHashMap<Utf8PathBuf, bool>,
    rejected: FxHashSet<Utf8PathBuf>,
    calls: Vec<BackendCall>,
    tx: Option<mpsc::UnboundedSender<BackendEvent>>,
}

/// A backend that keeps its watches in memory.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use pmx_watcher::{MemoryBackend, RawEvent, RawEventKind, WatchBackend};
///
/// let (backend, mut events) = MemoryBackend::new();
/// backend.add_watch(Utf8Path::new("a/x.txt"), false)?;
/// assert_eq!(backend.watched_paths(), vec!["a/x.txt"]);
///
/// backend.emit(RawEvent::new("a/x.txt", RawEventKind::Write));
/// assert!(events.try_recv().is_ok());
/// # Ok::<(), pmx_watcher::WatchError>(())
/// ```
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    /// Creates the backend and its event stream.
    #[must_use]
    pub fn new() -> (Arc<Self>, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let backend = Self {
            state: Mutex::new(MemoryState {
                tx: Some(tx),
                ..MemoryState::default()
            }),
        };
        (Arc::new(backend), rx)
    }

    /// Makes every later `add_watch` for `path` fail.
    pub fn reject(&self, path: impl Into<Utf8PathBuf>) {
        self.state.lock().rejected.insert(path.into());
    }

    /// Injects a raw event into the stream.
    ///
    /// Dropped silently once the backend is closed.
    pub fn emit(&self, event: RawEvent) {
        self.send(Ok(event));
    }

    /// Injects a primitive error into the stream.
    pub fn emit_error(&self, error: WatchError) {
        self.send(Err(error));
    }

    fn send(&self, item: BackendEvent) {
        let state = self.state.lock();
        if let Some(tx) = &state.tx {
            let _ = tx.send(item);
        } else {
            tracing::trace!("Memory backend closed, dropping injected event");
        }
    }

    /// Returns the paths currently holding a watch, sorted.
    #[must_use]
    pub fn watched_paths(&self) -> Vec<Utf8PathBuf> {
        let mut paths: Vec<Utf8PathBuf> = self.state.lock().watches.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Returns whether `path`'s watch is recursive, or `None` if unwatched.
    #[must_use]
    pub fn is_recursive(&self, path: &Utf8Path) -> Option<bool> {
        self.state.lock().watches.get(path).copied()
    }

    /// Returns every add/remove call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.clone()
    }

    /// Forgets the recorded call log.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }
}

impl WatchBackend for MemoryBackend {
    fn add_watch(&self, path: &Utf8Path, recursive: bool) -> Result<(), WatchError> {
        let mut state = self.state.lock();
        if state.tx.is_none() {
            return Err(WatchError::Closed);
        }
        if state.rejected.contains(path) {
            return Err(WatchError::rejected(path, "rejected by memory backend"));
        }
        state.calls.push(BackendCall::Add(path.to_owned()));
        state.watches.insert(path.to_owned(), recursive);
        Ok(())
    }

    fn remove_watch(&self, path: &Utf8Path) -> Result<(), WatchError> {
        let mut state = self.state.lock();
        if state.tx.is_none() {
            return Err(WatchError::Closed);
        }
        state.calls.push(BackendCall::Remove(path.to_owned()));
        match state.watches.remove(path) {
            Some(_) => Ok(()),
            None => Err(WatchError::rejected(path, "no watch to remove")),
        }
    }

    fn close(&self) {
        let mut state = self.state.lock();
        if state.tx.take().is_some() {
            state.watches.clear();
            tracing::debug!("Memory backend closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.state.lock().tx.is_none()
    }
}
