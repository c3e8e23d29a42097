//! The low-level change-notification primitive.
//!
//! A [`WatchBackend`] can only watch individual paths. It has no notion of
//! subscribers or coverage; the engine decides which paths it is asked to
//! watch. Every backend constructor returns the backend together with its
//! [`EventStream`], a lazy, unbounded, non-restartable sequence of raw events
//! and primitive errors. [`WatchBackend::close`] ends the stream.
//!
//! - [`NotifyBackend`] - the real OS primitive, via the `notify` crate
//! - [`MemoryBackend`] - an in-process primitive for tests and dry runs

pub mod memory;
pub mod native;

use camino::Utf8Path;
use tokio::sync::mpsc;

use crate::error::WatchError;
use crate::events::RawEvent;

pub use self::memory::{BackendCall, MemoryBackend};
pub use self::native::NotifyBackend;

/// One item of a backend's event stream.
pub type BackendEvent = Result<RawEvent, WatchError>;

/// Receiving end of a backend's event stream.
///
/// Yields `None` once the backend has been closed.
pub type EventStream = mpsc::UnboundedReceiver<BackendEvent>;

/// A primitive that watches individual filesystem paths.
///
/// Implementations must be callable from any thread. The engine calls them
/// while holding the watcher's state lock, so they must not call back into
/// the watcher.
pub trait WatchBackend: Send + Sync + std::fmt::Debug {
    /// Starts watching `path`.
    ///
    /// `recursive` is only meaningful for directories: when set, the watch
    /// reports events for every descendant, not just direct children.
    fn add_watch(&self, path: &Utf8Path, recursive: bool) -> Result<(), WatchError>;

    /// Stops watching `path`.
    fn remove_watch(&self, path: &Utf8Path) -> Result<(), WatchError>;

    /// Releases the primitive and ends the event stream.
    ///
    /// Idempotent. Later `add_watch` calls fail with [`WatchError::Closed`].
    fn close(&self);

    /// Returns `true` once [`close`](Self::close) has been called.
    fn is_closed(&self) -> bool;
}
