//! The subscriber capability.
//!
//! Anything registered with [`PathWatcher::watch`](crate::PathWatcher::watch)
//! implements [`Subscriber`]. Subscribers are shared as [`SubscriberRef`]
//! (`Arc<dyn Subscriber>`) and identified by pointer, so the same `Arc` passed
//! to `unwatch` removes exactly the registration it was created with.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use camino::Utf8Path;
//! use pmx_watcher::{Subscriber, SubscriberRef};
//!
//! struct ReloadBuffer;
//!
//! impl Subscriber for ReloadBuffer {
//!     fn file_changed(&self, path: &Utf8Path) {
//!         println!("reloading {path}");
//!     }
//!     fn file_created(&self, _path: &Utf8Path) {}
//!     fn file_removed(&self, _path: &Utf8Path) {}
//!     fn file_renamed(&self, _path: &Utf8Path) {}
//! }
//!
//! let subscriber: SubscriberRef = Arc::new(ReloadBuffer);
//! ```

use std::sync::Arc;

use camino::Utf8Path;
use tokio::sync::mpsc;

use crate::events::{Notification, NotificationKind};

/// Receiver of change notifications.
///
/// All four methods are required; implement the ones you do not care about
/// as no-ops. Callbacks run synchronously on the dispatcher task and must
/// return promptly: a slow callback delays every event queued behind it.
pub trait Subscriber: Send + Sync {
    /// A watched file's contents changed.
    fn file_changed(&self, path: &Utf8Path);

    /// A watched path, or a new child of a watched directory, was created.
    fn file_created(&self, path: &Utf8Path);

    /// A watched path was removed.
    fn file_removed(&self, path: &Utf8Path);

    /// A watched path was renamed away. `path` is the original name.
    fn file_renamed(&self, path: &Utf8Path);
}

/// Shared handle to a subscriber.
pub type SubscriberRef = Arc<dyn Subscriber>;

/// Returns `true` if both handles point at the same subscriber.
#[inline]
#[must_use]
pub fn same_subscriber(a: &SubscriberRef, b: &SubscriberRef) -> bool {
    Arc::ptr_eq(a, b)
}

/// Invokes the callback matching `kind`.
pub(crate) fn notify_subscriber(
    subscriber: &dyn Subscriber,
    kind: NotificationKind,
    path: &Utf8Path,
) {
    match kind {
        NotificationKind::Changed => subscriber.file_changed(path),
        NotificationKind::Created => subscriber.file_created(path),
        NotificationKind::Removed => subscriber.file_removed(path),
        NotificationKind::Renamed => subscriber.file_renamed(path),
    }
}

/// A subscriber that forwards every callback into a tokio channel.
///
/// Lets async code consume notifications with `recv().await` instead of
/// implementing [`Subscriber`].
///
/// # Examples
///
/// ```
/// use pmx_watcher::ChannelSubscriber;
///
/// let (subscriber, mut rx) = ChannelSubscriber::channel();
/// assert!(rx.try_recv().is_err());
/// # drop(subscriber);
/// ```
#[derive(Debug, Clone)]
pub struct ChannelSubscriber {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSubscriber {
    /// Creates the subscriber and the receiving half of its channel.
    #[must_use]
    pub fn channel() -> (SubscriberRef, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }

    fn forward(&self, kind: NotificationKind, path: &Utf8Path) {
        if self.tx.send(Notification::new(kind, path)).is_err() {
            tracing::trace!(path = %path, "Notification receiver dropped");
        }
    }
}

impl Subscriber for ChannelSubscriber {
    fn file_changed(&self, path: &Utf8Path) {
        self.forward(NotificationKind::Changed, path);
    }

    fn file_created(&self, path: &Utf8Path) {
        self.forward(NotificationKind::Created, path);
    }

    fn file_removed(&self, path: &Utf8Path) {
        self.forward(NotificationKind::Removed, path);
    }

    fn file_renamed(&self, path: &Utf8Path) {
        self.forward(NotificationKind::Renamed, path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_subscriber_is_pointer_identity() {
        let (a, _rx_a) = ChannelSubscriber::channel();
        let (b, _rx_b) = ChannelSubscriber::channel();
        let a2 = Arc::clone(&a);

        assert!(same_subscriber(&a, &a2));
        assert!(!same_subscriber(&a, &b));
    }

    #[test]
    fn test_channel_subscriber_forwards_each_kind() {
        let (sub, mut rx) = ChannelSubscriber::channel();
        let path = Utf8Path::new("a/x.txt");

        for kind in [
            NotificationKind::Changed,
            NotificationKind::Created,
            NotificationKind::Removed,
            NotificationKind::Renamed,
        ] {
            notify_subscriber(sub.as_ref(), kind, path);
            let received = rx.try_recv().unwrap();
            assert_eq!(received.kind, kind);
            assert_eq!(received.path, path);
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_subscriber_tolerates_dropped_receiver() {
        let (sub, rx) = ChannelSubscriber::channel();
        drop(rx);
        sub.file_changed(Utf8Path::new("a/x.txt"));
    }
}
