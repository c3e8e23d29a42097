//! Error types for the pmx-watcher crate.
//!
//! This module provides the [`WatchError`] type for every failure the watcher
//! can report, whether returned synchronously from `watch`/`unwatch` or
//! delivered asynchronously on the backend's event stream.

use camino::Utf8PathBuf;

/// Errors that can occur during path watching.
///
/// # Error Recovery Strategy
///
/// Returned synchronously from [`PathWatcher::watch`](crate::PathWatcher::watch)
/// and [`PathWatcher::unwatch`](crate::PathWatcher::unwatch), never retried:
///
/// - **Notify / Rejected** ([`WatchError::Notify`], [`WatchError::Rejected`]):
///   the low-level primitive refused the path
/// - **Path not found** ([`WatchError::PathNotFound`]): the path must exist
/// - **Invalid path** ([`WatchError::InvalidPath`]): empty or malformed path
/// - **Not watched** ([`WatchError::NotWatched`]): `unwatch` on an unknown path
/// - **Closed** ([`WatchError::Closed`]): the backend was already closed
/// - **Config** ([`WatchError::Config`]): the watcher could not be built
///
/// Delivered on the event stream and only logged by the dispatcher:
///
/// - **Overflow** ([`WatchError::Overflow`]): events were dropped - recoverable
/// - **Non-UTF-8 path** ([`WatchError::NonUtf8Path`]): event skipped - recoverable
///
/// # Examples
///
/// ```
/// use pmx_watcher::WatchError;
///
/// fn handle_error(err: &WatchError) {
///     if err.is_recoverable() {
///         eprintln!("Warning: {err}");
///     } else {
///         eprintln!("Watch failed: {err}");
///     }
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The notify watcher rejected an operation or reported a failure.
    #[error("notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// A non-notify backend refused to watch a path.
    #[error("backend rejected '{path}': {reason}")]
    Rejected {
        /// The rejected path.
        path: Utf8PathBuf,
        /// Why the backend refused it.
        reason: String,
    },

    /// The specified path does not exist.
    #[error("path does not exist: {0}")]
    PathNotFound(Utf8PathBuf),

    /// The path is empty or otherwise unusable.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The offending path.
        path: Utf8PathBuf,
        /// Explanation of why the path is invalid.
        reason: String,
    },

    /// `unwatch` was called for a path that has no subscribers.
    #[error("path is not watched: {0}")]
    NotWatched(Utf8PathBuf),

    /// The backend was closed; no further watches can be added.
    #[error("watch backend is closed")]
    Closed,

    /// The backend's event queue overflowed and events were lost.
    #[error("event queue overflowed, some changes were not reported")]
    Overflow,

    /// An event carried a path that is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),

    /// The watch configuration was rejected.
    #[error("invalid watch configuration: {0}")]
    Config(#[from] pmx_core::ConfigError),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    /// Creates a new [`WatchError::PathNotFound`] error.
    #[inline]
    pub fn path_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::PathNotFound(path.into())
    }

    /// Creates a new [`WatchError::NotWatched`] error.
    #[inline]
    pub fn not_watched(path: impl Into<Utf8PathBuf>) -> Self {
        Self::NotWatched(path.into())
    }

    /// Creates a new [`WatchError::Rejected`] error.
    #[inline]
    pub fn rejected(path: impl Into<Utf8PathBuf>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new [`WatchError::NonUtf8Path`] error.
    #[inline]
    pub fn non_utf8_path(path: impl Into<std::path::PathBuf>) -> Self {
        Self::NonUtf8Path(path.into())
    }

    /// Returns `true` if the dispatcher can keep going after this error.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Overflow | Self::NonUtf8Path(_))
    }

    /// Returns `true` if this error is fatal for the operation that hit it.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns the path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::PathNotFound(path)
            | Self::NotWatched(path)
            | Self::Rejected { path, .. }
            | Self::InvalidPath { path, .. } => Some(path),
            Self::Notify(_)
            | Self::Closed
            | Self::Overflow
            | Self::NonUtf8Path(_)
            | Self::Config(_)
            | Self::Io(_) => None,
        }
    }
}
