//! Path-level change notification multiplexer.
//!
//! This crate sits on top of a low-level change-notification primitive that
//! can only watch individual paths, and turns it into a subscription service:
//! any number of subscribers may watch any number of files and directories,
//! and each hears about the paths it asked for.
//!
//! # Overview
//!
//! - **Deduplication**: a watched directory absorbs the low-level watches of
//!   everything below it, and gives them back when it is unwatched
//! - **Order independence**: watching a directory before or after its
//!   children ends in the same state
//! - **Concrete paths**: a file created inside a watched directory is
//!   reported with the new file's own path
//! - **Async dispatch**: one tokio task consumes the event stream and invokes
//!   subscribers in registration order
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  PathWatcher (any thread)                                        │
//! │    watch / unwatch ──► Mutex<WatchState> ──► WatchBackend        │
//! │                        ├─ WatchRegistry     add_watch            │
//! │                        └─ CoverageTracker   remove_watch         │
//! └──────────────────────────────────────────────────│───────────────┘
//!                                                    │ EventStream
//!                                                    ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  Dispatcher (tokio task)                                         │
//! │    resolve under lock ──► Subscriber::file_* (lock released)     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Crate Dependencies
//!
//! ```text
//! pmx-cli ──► pmx-watcher ──► pmx-core
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use camino::Utf8Path;
//! use pmx_core::WatchConfig;
//! use pmx_watcher::{PathWatcher, Subscriber};
//!
//! struct Reload;
//!
//! impl Subscriber for Reload {
//!     fn file_changed(&self, path: &Utf8Path) {
//!         println!("reload {path}");
//!     }
//!     fn file_created(&self, _path: &Utf8Path) {}
//!     fn file_removed(&self, _path: &Utf8Path) {}
//!     fn file_renamed(&self, _path: &Utf8Path) {}
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (watcher, dispatcher) = PathWatcher::new(&WatchConfig::default())?;
//!     let dispatcher = dispatcher.spawn();
//!
//!     watcher.watch("src/main.rs", Arc::new(Reload))?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     watcher.close();
//!     dispatcher.await?;
//!     Ok(())
//! }
//! ```
//!
//! # Testing Without the OS
//!
//! [`MemoryBackend`] and [`MemoryMetadata`] stand in for the OS primitive
//! and the filesystem:
//!
//! ```
//! use std::sync::Arc;
//! use pmx_core::WatchConfig;
//! use pmx_watcher::{ChannelSubscriber, MemoryBackend, MemoryMetadata, PathWatcher};
//!
//! let (backend, events) = MemoryBackend::new();
//! let metadata = Arc::new(MemoryMetadata::new());
//! metadata.add_file("a/x.txt");
//!
//! let config = WatchConfig { resolve_relative: false, ..WatchConfig::default() };
//! let (watcher, _dispatcher) =
//!     PathWatcher::with_backend(Arc::clone(&backend), events, metadata, &config)?;
//!
//! watcher.watch("a/x.txt", ChannelSubscriber::channel().0)?;
//! watcher.watch("a", ChannelSubscriber::channel().0)?;
//! assert_eq!(backend.watched_paths(), vec!["a"]);
//! # Ok::<(), pmx_watcher::WatchError>(())
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod backend;
pub mod coverage;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod events;
pub mod metadata;
pub mod registry;
pub mod subscriber;
pub mod watcher;

// Re-export error types
pub use error::WatchError;

// Re-export event types
pub use events::{Notification, NotificationKind, RawEvent, RawEventKind};

// Re-export subscriber types
pub use subscriber::{ChannelSubscriber, Subscriber, SubscriberRef, same_subscriber};

// Re-export engine types
pub use coverage::{CoverageDepth, CoverageTracker};
pub use engine::{Dispatch, WatchSnapshot, WatchState};
pub use registry::{SubscriberList, WatchRegistry};

// Re-export backend and metadata types
pub use backend::{
    BackendCall, BackendEvent, EventStream, MemoryBackend, NotifyBackend, WatchBackend,
};
pub use metadata::{MemoryMetadata, Metadata, RealMetadata};

// Re-export watcher types
pub use dispatcher::{DispatchStats, Dispatcher, DispatcherState};
pub use watcher::PathWatcher;
