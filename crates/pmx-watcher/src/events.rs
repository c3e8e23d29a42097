//! Event types flowing through the watcher.
//!
//! # Event Flow
//!
//! ```text
//! OS primitive (notify)
//!        │  RawEvent { path, kind }
//!        ▼
//!   EventStream (unbounded channel)
//!        │
//!        ▼
//!   Dispatcher ── resolves target under the state lock
//!        │
//!        ▼
//!   Subscriber::file_* (path)    ──►  Notification (ChannelSubscriber)
//! ```

use std::fmt;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// The kind of a raw, path-addressed event from the low-level primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawEventKind {
    /// File contents were written.
    Write,
    /// A file or directory was created.
    Create,
    /// A file or directory was removed.
    Remove,
    /// The old-name half of a rename.
    RenameFrom,
    /// The new-name half of a rename.
    RenameTo,
}

impl RawEventKind {
    /// Returns `true` for kinds that bring a new name into existence.
    ///
    /// Only these are synthesized for a covering parent directory.
    #[inline]
    #[must_use]
    pub const fn introduces_path(self) -> bool {
        matches!(self, Self::Create | Self::RenameTo)
    }

    /// Maps this raw kind onto the subscriber callback it triggers.
    #[inline]
    #[must_use]
    pub const fn notification_kind(self) -> NotificationKind {
        match self {
            Self::Write => NotificationKind::Changed,
            Self::Create | Self::RenameTo => NotificationKind::Created,
            Self::Remove => NotificationKind::Removed,
            Self::RenameFrom => NotificationKind::Renamed,
        }
    }
}

/// A raw event as reported by the low-level primitive.
///
/// # Examples
///
/// ```
/// use pmx_watcher::{RawEvent, RawEventKind};
///
/// let event = RawEvent::new("a/x.txt", RawEventKind::Write);
/// assert_eq!(event.path.as_str(), "a/x.txt");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawEvent {
    /// The path the event refers to.
    pub path: Utf8PathBuf,

    /// What happened to it.
    pub kind: RawEventKind,
}

impl RawEvent {
    /// Creates a new raw event.
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>, kind: RawEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Which subscriber callback a notification corresponds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// [`Subscriber::file_changed`](crate::Subscriber::file_changed)
    Changed,
    /// [`Subscriber::file_created`](crate::Subscriber::file_created)
    Created,
    /// [`Subscriber::file_removed`](crate::Subscriber::file_removed)
    Removed,
    /// [`Subscriber::file_renamed`](crate::Subscriber::file_renamed)
    Renamed,
}

impl NotificationKind {
    /// Returns a short lowercase label, e.g. for log or CLI output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Changed => "changed",
            Self::Created => "created",
            Self::Removed => "removed",
            Self::Renamed => "renamed",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A delivered notification, as recorded by [`ChannelSubscriber`](crate::ChannelSubscriber).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// The callback that fired.
    pub kind: NotificationKind,

    /// The path passed to the callback.
    pub path: Utf8PathBuf,

    /// When the notification was delivered.
    pub timestamp: Instant,
}

impl Notification {
    /// Creates a notification stamped with the current instant.
    #[inline]
    #[must_use]
    pub fn new(kind: NotificationKind, path: &Utf8Path) -> Self {
        Self {
            kind,
            path: path.to_owned(),
            timestamp: Instant::now(),
        }
    }
}
