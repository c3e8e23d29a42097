//! The OS watch primitive, via `notify`.
//!
//! `notify` delivers events on its own thread through a synchronous handler.
//! The handler translates each `notify::Event` into zero or more
//! [`RawEvent`]s and forwards them through an unbounded tokio channel, so the
//! dispatcher can consume them with `recv().await`. Dropping the notify
//! watcher drops the handler and its sender, which ends the stream.

use std::path::PathBuf;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, PollWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use pmx_core::{BackendKind, WatchConfig};
use tokio::sync::mpsc;

use super::{BackendEvent, EventStream, WatchBackend};
use crate::error::WatchError;
use crate::events::{RawEvent, RawEventKind};

/// Watch backend over the platform's `notify` watcher.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use pmx_core::WatchConfig;
/// use pmx_watcher::{NotifyBackend, WatchBackend};
///
/// # async fn example() -> Result<(), pmx_watcher::WatchError> {
/// let (backend, mut events) = NotifyBackend::new(&WatchConfig::default())?;
/// backend.add_watch(Utf8Path::new("/tmp"), true)?;
///
/// while let Some(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct NotifyBackend {
    /// `None` once closed.
    watcher: Mutex<Option<Box<dyn Watcher + Send>>>,
    kind: BackendKind,
}

impl std::fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBackend")
            .field("kind", &self.kind)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl NotifyBackend {
    /// Creates the notify watcher selected by `config.backend`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Notify`] if the platform watcher cannot be
    /// initialized (for example when the inotify instance limit is reached).
    pub fn new(config: &WatchConfig) -> Result<(Self, EventStream), WatchError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = move |result: notify::Result<notify::Event>| {
            for item in translate(result) {
                if tx.send(item).is_err() {
                    tracing::trace!("Event stream receiver dropped");
                    break;
                }
            }
        };

        let watcher: Box<dyn Watcher + Send> = match config.backend {
            BackendKind::Native => Box::new(notify::recommended_watcher(handler)?),
            BackendKind::Poll => {
                let interval = Duration::from_millis(config.poll_interval_ms);
                let notify_config = notify::Config::default().with_poll_interval(interval);
                Box::new(PollWatcher::new(handler, notify_config)?)
            }
        };

        tracing::debug!(backend = ?config.backend, "Notify backend created");

        let backend = Self {
            watcher: Mutex::new(Some(watcher)),
            kind: config.backend,
        };
        Ok((backend, rx))
    }
}

impl WatchBackend for NotifyBackend {
    fn add_watch(&self, path: &Utf8Path, recursive: bool) -> Result<(), WatchError> {
        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        let mut guard = self.watcher.lock();
        let watcher = guard.as_mut().ok_or(WatchError::Closed)?;
        watcher.watch(path.as_std_path(), mode)?;
        Ok(())
    }

    fn remove_watch(&self, path: &Utf8Path) -> Result<(), WatchError> {
        let mut guard = self.watcher.lock();
        let watcher = guard.as_mut().ok_or(WatchError::Closed)?;
        watcher.unwatch(path.as_std_path())?;
        Ok(())
    }

    fn close(&self) {
        if self.watcher.lock().take().is_some() {
            tracing::info!(backend = ?self.kind, "Notify backend closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.watcher.lock().is_none()
    }
}

/// Translates one notify callback into stream items.
fn translate(result: notify::Result<notify::Event>) -> Vec<BackendEvent> {
    let event = match result {
        Ok(event) => event,
        Err(err) => return vec![Err(WatchError::Notify(err))],
    };

    if event.need_rescan() {
        return vec![Err(WatchError::Overflow)];
    }

    match event.kind {
        EventKind::Create(_) => uniform(event.paths, RawEventKind::Create),
        EventKind::Remove(_) => uniform(event.paths, RawEventKind::Remove),
        EventKind::Modify(ModifyKind::Name(mode)) => renamed(event.paths, mode),
        EventKind::Modify(ModifyKind::Metadata(_)) | EventKind::Access(_) => Vec::new(),
        EventKind::Modify(_) => uniform(event.paths, RawEventKind::Write),
        _ => {
            tracing::trace!(kind = ?event.kind, "Ignoring unclassified notify event");
            Vec::new()
        }
    }
}

fn renamed(paths: Vec<PathBuf>, mode: RenameMode) -> Vec<BackendEvent> {
    match mode {
        RenameMode::From => uniform(paths, RawEventKind::RenameFrom),
        RenameMode::To => uniform(paths, RawEventKind::RenameTo),
        RenameMode::Both if paths.len() == 2 => {
            let mut paths = paths.into_iter();
            let mut items = Vec::with_capacity(2);
            if let Some(from) = paths.next() {
                items.push(raw(from, RawEventKind::RenameFrom));
            }
            if let Some(to) = paths.next() {
                items.push(raw(to, RawEventKind::RenameTo));
            }
            items
        }
        // Backends that cannot pair renames report each half on its own.
        _ => paths
            .into_iter()
            .map(|path| {
                let kind = if path.exists() {
                    RawEventKind::RenameTo
                } else {
                    RawEventKind::RenameFrom
                };
                raw(path, kind)
            })
            .collect(),
    }
}

fn uniform(paths: Vec<PathBuf>, kind: RawEventKind) -> Vec<BackendEvent> {
    paths.into_iter().map(|path| raw(path, kind)).collect()
}

fn raw(path: PathBuf, kind: RawEventKind) -> BackendEvent {
    Utf8PathBuf::try_from(path)
        .map(|path| RawEvent::new(path, kind))
        .map_err(|err| WatchError::non_utf8_path(err.into_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, Flag, MetadataKind, RemoveKind};
    use std::fs;
    use tempfile::TempDir;

    fn event(kind: EventKind, paths: &[&str]) -> notify::Result<notify::Event> {
        let mut event = notify::Event::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        Ok(event)
    }

    fn kinds(items: &[BackendEvent]) -> Vec<(String, RawEventKind)> {
        items
            .iter()
            .map(|item| match item {
                Ok(raw) => (raw.path.to_string(), raw.kind),
                Err(err) => panic!("unexpected error item: {err}"),
            })
            .collect()
    }

    #[test]
    fn test_translate_create_remove_write() {
        let created = translate(event(EventKind::Create(CreateKind::File), &["/w/a"]));
        assert_eq!(kinds(&created), vec![("/w/a".into(), RawEventKind::Create)]);

        let removed = translate(event(EventKind::Remove(RemoveKind::Any), &["/w/a"]));
        assert_eq!(kinds(&removed), vec![("/w/a".into(), RawEventKind::Remove)]);

        let written = translate(event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/w/a"],
        ));
        assert_eq!(kinds(&written), vec![("/w/a".into(), RawEventKind::Write)]);
    }

    #[test]
    fn test_translate_ignores_metadata_and_access() {
        let meta = translate(event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
            &["/w/a"],
        ));
        assert!(meta.is_empty());

        let access = translate(event(EventKind::Access(AccessKind::Any), &["/w/a"]));
        assert!(access.is_empty());
    }

    #[test]
    fn test_translate_rename_halves() {
        let from = translate(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/w/old"],
        ));
        assert_eq!(kinds(&from), vec![("/w/old".into(), RawEventKind::RenameFrom)]);

        let to = translate(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &["/w/new"],
        ));
        assert_eq!(kinds(&to), vec![("/w/new".into(), RawEventKind::RenameTo)]);
    }

    #[test]
    fn test_translate_rename_both_splits_pair() {
        let both = translate(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/w/old", "/w/new"],
        ));
        assert_eq!(
            kinds(&both),
            vec![
                ("/w/old".into(), RawEventKind::RenameFrom),
                ("/w/new".into(), RawEventKind::RenameTo),
            ]
        );
    }

    #[test]
    fn test_translate_unpaired_rename_checks_existence() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let present = temp_dir.path().join("present.txt");
        fs::write(&present, "x").expect("Failed to write file");
        let absent = temp_dir.path().join("absent.txt");

        let items = translate(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Any)),
            &[
                present.to_str().expect("utf-8 temp path"),
                absent.to_str().expect("utf-8 temp path"),
            ],
        ));
        let kinds: Vec<_> = kinds(&items).into_iter().map(|(_, k)| k).collect();
        assert_eq!(kinds, vec![RawEventKind::RenameTo, RawEventKind::RenameFrom]);
    }

    #[test]
    fn test_translate_rescan_is_overflow() {
        let mut event = notify::Event::new(EventKind::Other);
        event = event.set_flag(Flag::Rescan);
        let items = translate(Ok(event));
        assert!(matches!(items.as_slice(), [Err(WatchError::Overflow)]));
    }

    #[test]
    fn test_translate_notify_error() {
        let items = translate(Err(notify::Error::generic("queue broke")));
        assert!(matches!(items.as_slice(), [Err(WatchError::Notify(_))]));
    }

    #[cfg(unix)]
    #[test]
    fn test_translate_non_utf8_path() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = PathBuf::from(OsStr::from_bytes(b"/w/\xff.txt"));
        let event = notify::Event::new(EventKind::Create(CreateKind::File)).add_path(path);
        let items = translate(Ok(event));
        assert!(matches!(items.as_slice(), [Err(WatchError::NonUtf8Path(_))]));
    }

    #[tokio::test]
    async fn test_notify_backend_receives_events() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = Utf8Path::from_path(temp_dir.path()).expect("Invalid path");

        let (backend, mut events) =
            NotifyBackend::new(&WatchConfig::default()).expect("Failed to create backend");
        backend.add_watch(path, true).expect("Failed to add watch");

        fs::write(temp_dir.path().join("test.txt"), "hello").expect("Failed to write file");

        let received = tokio::time::timeout(Duration::from_secs(2), events.recv()).await;
        backend.close();

        // Timing-dependent, may not always fire in CI
        if let Ok(Some(Ok(event))) = received {
            assert!(event.path.as_str().contains("test.txt"));
        }
    }

    #[tokio::test]
    async fn test_notify_backend_close() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = Utf8Path::from_path(temp_dir.path()).expect("Invalid path");

        let (backend, _events) =
            NotifyBackend::new(&WatchConfig::default()).expect("Failed to create backend");
        assert!(!backend.is_closed());

        backend.close();
        backend.close();
        assert!(backend.is_closed());
        assert!(matches!(backend.add_watch(path, true), Err(WatchError::Closed)));
        assert!(matches!(backend.remove_watch(path), Err(WatchError::Closed)));
    }

    #[test]
    fn test_notify_backend_missing_path() {
        let (backend, _events) =
            NotifyBackend::new(&WatchConfig::default()).expect("Failed to create backend");
        let result = backend.add_watch(Utf8Path::new("/nonexistent/path/for/pathmux"), false);
        assert!(matches!(result, Err(WatchError::Notify(_))));
    }

    #[test]
    fn test_poll_backend_creation() {
        let config = WatchConfig {
            backend: BackendKind::Poll,
            poll_interval_ms: 50,
            ..WatchConfig::default()
        };
        let (backend, _events) = NotifyBackend::new(&config).expect("Failed to create backend");
        assert!(format!("{backend:?}").contains("Poll"));
    }
}
