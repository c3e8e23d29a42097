//! The public watcher handle.
//!
//! [`PathWatcher`] ties a backend, a metadata source and the shared
//! [`WatchState`] together. Construction returns the handle together with
//! its [`Dispatcher`], which the caller spawns:
//!
//! ```no_run
//! use std::sync::Arc;
//! use pmx_core::WatchConfig;
//! use pmx_watcher::{ChannelSubscriber, PathWatcher};
//!
//! # async fn example() -> Result<(), pmx_watcher::WatchError> {
//! let (watcher, dispatcher) = PathWatcher::new(&WatchConfig::default())?;
//! let dispatcher = dispatcher.spawn();
//!
//! let (subscriber, mut notifications) = ChannelSubscriber::channel();
//! watcher.watch("src", Arc::clone(&subscriber))?;
//!
//! while let Some(notification) = notifications.recv().await {
//!     println!("{} {}", notification.kind, notification.path);
//! }
//!
//! watcher.close();
//! let stats = dispatcher.await;
//! # Ok(())
//! # }
//! ```
//!
//! The handle is cheap to clone; every clone drives the same state.

use std::sync::Arc;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use pmx_core::WatchConfig;
use tokio::sync::watch;

use crate::backend::{EventStream, NotifyBackend, WatchBackend};
use crate::coverage::CoverageDepth;
use crate::dispatcher::{Dispatcher, DispatcherState};
use crate::engine::{WatchSnapshot, WatchState};
use crate::error::WatchError;
use crate::metadata::{Metadata, RealMetadata};
use crate::subscriber::SubscriberRef;

/// Handle for registering and removing path subscriptions.
///
/// # Thread Safety
///
/// `watch` and `unwatch` may be called from any thread, concurrently with
/// each other and with the running dispatcher. Each call holds the state lock
/// for its whole duration, including the backend calls it makes.
#[derive(Clone)]
pub struct PathWatcher {
    inner: Arc<Inner>,
}

struct Inner {
    state: Arc<Mutex<WatchState>>,
    backend: Arc<dyn WatchBackend>,
    metadata: Arc<dyn Metadata>,
    state_rx: watch::Receiver<DispatcherState>,
    /// Relative paths are joined onto this, when set.
    base_dir: Option<Utf8PathBuf>,
    depth: CoverageDepth,
}

impl std::fmt::Debug for PathWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathWatcher")
            .field("backend", &self.inner.backend)
            .field("base_dir", &self.inner.base_dir)
            .field("depth", &self.inner.depth)
            .field("dispatcher", &self.dispatcher_state())
            .finish_non_exhaustive()
    }
}

impl PathWatcher {
    /// Creates a watcher over the `notify` backend and the real filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Config`] for an invalid configuration,
    /// [`WatchError::Notify`] if the OS watcher cannot be created, and
    /// [`WatchError::Io`] if the working directory cannot be read.
    pub fn new(config: &WatchConfig) -> Result<(Self, Dispatcher), WatchError> {
        config.validate()?;
        let (backend, events) = NotifyBackend::new(config)?;
        Self::with_backend(Arc::new(backend), events, Arc::new(RealMetadata), config)
    }

    /// Creates a watcher over an explicit backend and metadata source.
    ///
    /// `events` must be the stream returned alongside `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Config`] for an invalid configuration and
    /// [`WatchError::Io`] or [`WatchError::NonUtf8Path`] if relative paths
    /// are resolved against a working directory that cannot be read.
    pub fn with_backend<B, M>(
        backend: Arc<B>,
        events: EventStream,
        metadata: Arc<M>,
        config: &WatchConfig,
    ) -> Result<(Self, Dispatcher), WatchError>
    where
        B: WatchBackend + 'static,
        M: Metadata + 'static,
    {
        config.validate()?;

        let base_dir = if config.resolve_relative {
            Some(match &config.base_dir {
                Some(dir) => dir.clone(),
                None => current_dir()?,
            })
        } else {
            None
        };

        let depth = CoverageDepth::from_recursive(config.recursive);
        let state = Arc::new(Mutex::new(WatchState::new(depth)));
        let (state_tx, state_rx) = watch::channel(DispatcherState::Running);
        let dispatcher = Dispatcher::new(Arc::clone(&state), events, state_tx);

        let watcher = Self {
            inner: Arc::new(Inner {
                state,
                backend,
                metadata,
                state_rx,
                base_dir,
                depth,
            }),
        };
        Ok((watcher, dispatcher))
    }

    /// Notifies `subscriber` of changes to `path`.
    ///
    /// The path must exist. Watching a directory also reports files created
    /// directly inside it, with the new file's path.
    ///
    /// # Errors
    ///
    /// - [`WatchError::InvalidPath`] for an empty path
    /// - [`WatchError::PathNotFound`] if the path does not exist
    /// - [`WatchError::Closed`] after [`close`](Self::close)
    /// - the backend's error if it refuses the low-level watch
    pub fn watch(
        &self,
        path: impl AsRef<Utf8Path>,
        subscriber: SubscriberRef,
    ) -> Result<(), WatchError> {
        let path = self.resolve(path.as_ref())?;
        if self.inner.backend.is_closed() {
            return Err(WatchError::Closed);
        }
        if !self.inner.metadata.exists(&path) {
            return Err(WatchError::path_not_found(path));
        }
        let is_dir = self.inner.metadata.is_dir(&path);

        self.inner
            .state
            .lock()
            .watch(&*self.inner.backend, &path, subscriber, is_dir)
    }

    /// Removes `subscriber` from `path`, or every subscriber when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::NotWatched`] if `path` has no subscribers.
    pub fn unwatch(
        &self,
        path: impl AsRef<Utf8Path>,
        subscriber: Option<&SubscriberRef>,
    ) -> Result<(), WatchError> {
        let path = self.resolve(path.as_ref())?;
        self.inner
            .state
            .lock()
            .unwatch(&*self.inner.backend, &path, subscriber)
    }

    /// Closes the backend, which ends the dispatcher, and drops all state.
    ///
    /// Idempotent.
    pub fn close(&self) {
        self.inner.backend.close();
        *self.inner.state.lock() = WatchState::new(self.inner.depth);
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.backend.is_closed()
    }

    /// Returns a sorted copy of the current registry and coverage sets.
    #[must_use]
    pub fn snapshot(&self) -> WatchSnapshot {
        self.inner.state.lock().snapshot()
    }

    /// Returns `true` if `path` has at least one subscriber.
    #[must_use]
    pub fn is_watched(&self, path: impl AsRef<Utf8Path>) -> bool {
        self.subscriber_count(path) > 0
    }

    /// Returns how many registrations `path` has.
    #[must_use]
    pub fn subscriber_count(&self, path: impl AsRef<Utf8Path>) -> usize {
        let Ok(path) = self.resolve(path.as_ref()) else {
            return 0;
        };
        self.inner.state.lock().registry().subscribers_of(&path).len()
    }

    /// Returns the dispatcher's current state.
    #[must_use]
    pub fn dispatcher_state(&self) -> DispatcherState {
        *self.inner.state_rx.borrow()
    }

    /// Waits until the dispatcher has terminated.
    ///
    /// Returns immediately if the dispatcher was dropped without running.
    pub async fn terminated(&self) {
        let mut state_rx = self.inner.state_rx.clone();
        let _ = state_rx
            .wait_for(|state| *state == DispatcherState::Terminated)
            .await;
    }

    /// Normalizes `path` into a registry key.
    ///
    /// Relative paths are joined onto the base directory first. `.` and `..`
    /// are resolved lexically; symlinks are not followed.
    fn resolve(&self, path: &Utf8Path) -> Result<Utf8PathBuf, WatchError> {
        let invalid = |reason: &str| WatchError::InvalidPath {
            path: path.to_owned(),
            reason: reason.to_owned(),
        };
        if path.as_str().is_empty() {
            return Err(invalid("path is empty"));
        }

        let joined = match &self.inner.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_owned(),
        };

        let mut normalized = Utf8PathBuf::new();
        for component in joined.components() {
            match component {
                Utf8Component::CurDir => {}
                Utf8Component::ParentDir => {
                    if !normalized.pop() && !normalized.has_root() {
                        return Err(invalid("path climbs above its starting point"));
                    }
                }
                other => normalized.push(other),
            }
        }

        if normalized.as_str().is_empty() {
            return Err(invalid("path names the current directory"));
        }
        Ok(normalized)
    }
}

fn current_dir() -> Result<Utf8PathBuf, WatchError> {
    let cwd = std::env::current_dir()?;
    Utf8PathBuf::try_from(cwd).map_err(|err| WatchError::non_utf8_path(err.into_path_buf()))
}
