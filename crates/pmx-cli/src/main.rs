//! CLI entry point for the pathmux watcher.
//!
//! This binary embeds the watcher for manual verification: it watches the
//! given paths and prints every notification, or dry-runs the deduplication
//! to show which paths would hold a low-level watch.
//!
//! # Usage
//!
//! ```bash
//! pathmux [OPTIONS] <COMMAND>
//!
//! # Print notifications until Ctrl-C
//! pathmux watch src Cargo.toml
//!
//! # JSON lines, polling backend
//! pathmux --backend poll watch --json src
//!
//! # Show the low-level watch plan
//! pathmux plan src src/main.rs
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand, ValueEnum};
use pmx_core::{BackendKind, Config};
use pmx_watcher::{
    ChannelSubscriber, DispatchStats, MemoryBackend, NotificationKind, PathWatcher, RealMetadata,
    Subscriber, SubscriberRef, WatchSnapshot,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Path-level file change notifications with watch deduplication.
#[derive(Parser)]
#[command(name = "pathmux", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON configuration file.
    #[arg(short, long, global = true, env = "PATHMUX_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Low-level watch primitive (overrides the config file).
    #[arg(long, global = true, value_enum)]
    backend: Option<BackendArg>,

    /// Directory watches cover direct children only.
    #[arg(long, global = true)]
    non_recursive: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Watch paths and print every notification until interrupted.
    Watch {
        /// Files or directories to watch.
        #[arg(required = true)]
        paths: Vec<Utf8PathBuf>,

        /// Print notifications as JSON lines.
        #[arg(long)]
        json: bool,
    },

    /// Show which paths would hold a low-level watch, without watching.
    Plan {
        /// Files or directories to plan for.
        #[arg(required = true)]
        paths: Vec<Utf8PathBuf>,

        /// Print the plan as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Backend selection on the command line.
#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    /// The platform's native watcher.
    Native,
    /// Periodic polling.
    Poll,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Native => Self::Native,
            BackendArg::Poll => Self::Poll,
        }
    }
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or the configured level. `notify` is
/// filtered to `warn`.
fn init_tracing(config: &Config, verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { config.log.level.as_str() };
        EnvFilter::new(format!("{level},notify=warn"))
    });

    // Check if colors should be disabled (flag, config, or NO_COLOR env var)
    let use_ansi = !no_color && config.log.color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_ansi(use_ansi))
        .with(filter)
        .init();
}

/// Loads the config file, if any, and applies command-line overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the result is invalid.
fn build_config(cli: &Cli) -> color_eyre::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .map_err(|e| color_eyre::eyre::eyre!("Failed to load config {path}: {e}"))?,
        None => Config::default(),
    };

    if let Some(backend) = cli.backend {
        config.watch.backend = backend.into();
    }
    if cli.non_recursive {
        config.watch.recursive = false;
    }

    config.validate()?;
    Ok(config)
}

// =============================================================================
// SUBSCRIBERS
// =============================================================================

/// Prints one line per notification to stdout.
struct PrintSubscriber {
    json: bool,
}

#[derive(Serialize)]
struct NotificationLine<'a> {
    kind: NotificationKind,
    path: &'a Utf8Path,
}

impl PrintSubscriber {
    fn print(&self, kind: NotificationKind, path: &Utf8Path) {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();

        if self.json {
            match serde_json::to_string(&NotificationLine { kind, path }) {
                Ok(line) => {
                    let _ = writeln!(handle, "{line}");
                }
                Err(e) => tracing::warn!(error = %e, "Failed to serialize notification"),
            }
        } else {
            let _ = writeln!(handle, "{:<8} {path}", kind.label());
        }
    }
}

impl Subscriber for PrintSubscriber {
    fn file_changed(&self, path: &Utf8Path) {
        self.print(NotificationKind::Changed, path);
    }

    fn file_created(&self, path: &Utf8Path) {
        self.print(NotificationKind::Created, path);
    }

    fn file_removed(&self, path: &Utf8Path) {
        self.print(NotificationKind::Removed, path);
    }

    fn file_renamed(&self, path: &Utf8Path) {
        self.print(NotificationKind::Renamed, path);
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Watches `paths` until Ctrl-C or SIGTERM, then prints dispatch statistics.
///
/// # Errors
///
/// Returns an error if the watcher cannot be created or a path cannot be
/// watched.
async fn run_watch(
    config: &Config,
    paths: &[Utf8PathBuf],
    json: bool,
) -> color_eyre::Result<()> {
    let (watcher, dispatcher) = PathWatcher::new(&config.watch)?;
    let dispatcher = dispatcher.spawn();

    let subscriber: SubscriberRef = Arc::new(PrintSubscriber { json });
    for path in paths {
        watcher
            .watch(path, Arc::clone(&subscriber))
            .map_err(|e| color_eyre::eyre::eyre!("Failed to watch {path}: {e}"))?;
    }

    let snapshot = watcher.snapshot();
    info!(
        paths = snapshot.watched.len(),
        low_level = snapshot.active.len(),
        backend = ?config.watch.backend,
        "Watching, press Ctrl-C to stop"
    );

    wait_for_shutdown().await?;

    watcher.close();
    let stats = dispatcher.await?;
    print_stats(&stats, json);

    Ok(())
}

/// Waits for Ctrl-C, or SIGTERM on Unix.
async fn wait_for_shutdown() -> color_eyre::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received Ctrl-C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl-C, shutting down");
    }

    Ok(())
}

/// Dry-runs watching `paths` against the in-memory backend.
///
/// # Errors
///
/// Returns an error if a path does not exist or the plan cannot be printed.
fn run_plan(config: &Config, paths: &[Utf8PathBuf], json: bool) -> color_eyre::Result<()> {
    let (backend, events) = MemoryBackend::new();
    let (watcher, _dispatcher) =
        PathWatcher::with_backend(backend, events, Arc::new(RealMetadata), &config.watch)?;

    let (subscriber, _notifications) = ChannelSubscriber::channel();
    for path in paths {
        watcher
            .watch(path, Arc::clone(&subscriber))
            .map_err(|e| color_eyre::eyre::eyre!("Failed to plan {path}: {e}"))?;
    }

    let snapshot = watcher.snapshot();
    watcher.close();

    if json {
        let content = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| color_eyre::eyre::eyre!("Failed to serialize JSON: {}", e))?;
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{content}")?;
    } else {
        print_plan(&snapshot);
    }

    Ok(())
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

/// Describes how a watched path is covered.
fn plan_status(snapshot: &WatchSnapshot, path: &Utf8Path) -> &'static str {
    let is_active = snapshot.active.iter().any(|p| p == path);
    let is_covering = snapshot.covering.iter().any(|p| p == path);
    match (is_active, is_covering) {
        (true, true) => "watch, covers descendants",
        (true, false) => "watch",
        (false, _) => "covered by ancestor",
    }
}

/// Prints the watch plan.
fn print_plan(snapshot: &WatchSnapshot) {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();

    let _ = writeln!(handle, "Watch Plan");
    let _ = writeln!(handle, "==========");
    let _ = writeln!(handle);
    for path in snapshot.watched.keys() {
        let _ = writeln!(handle, "  {path}  ({})", plan_status(snapshot, path));
    }
    let _ = writeln!(handle);
    let _ = writeln!(handle, "Watched paths:      {}", snapshot.watched.len());
    let _ = writeln!(handle, "Low-level watches:  {}", snapshot.active.len());
    let _ = writeln!(handle, "Covering dirs:      {}", snapshot.covering.len());
}

/// Prints dispatch statistics after a watch session.
fn print_stats(stats: &DispatchStats, json: bool) {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();

    if json {
        if let Ok(line) = serde_json::to_string(stats) {
            let _ = writeln!(handle, "{line}");
        }
        return;
    }

    let _ = writeln!(handle);
    let _ = writeln!(handle, "Dispatch Summary");
    let _ = writeln!(handle, "================");
    let _ = writeln!(handle, "  Raw events:       {}", stats.received);
    let _ = writeln!(handle, "  Notifications:    {}", stats.dispatched);
    let _ = writeln!(handle, "  Discarded:        {}", stats.discarded);
    let _ = writeln!(handle, "  Primitive errors: {}", stats.errors);
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Load configuration
    let config = build_config(&cli)?;

    // 4. Initialize tracing (handles --no-color for log output)
    init_tracing(&config, cli.verbose, cli.no_color);

    // 5. Route to appropriate command
    match &cli.command {
        Commands::Watch { paths, json } => run_watch(&config, paths, *json).await,
        Commands::Plan { paths, json } => run_plan(&config, paths, *json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_build_config_overrides() {
        let cli = parse(&["pathmux", "--backend", "poll", "--non-recursive", "plan", "src"]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.watch.backend, BackendKind::Poll);
        assert!(!config.watch.recursive);
    }

    #[test]
    fn test_build_config_defaults() {
        let cli = parse(&["pathmux", "watch", "a", "b"]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.watch.backend, BackendKind::Native);
        assert!(config.watch.recursive);
        match cli.command {
            Commands::Watch { paths, json } => {
                assert_eq!(paths, vec!["a", "b"]);
                assert!(!json);
            }
            Commands::Plan { .. } => panic!("expected watch command"),
        }
    }

    #[test]
    fn test_watch_requires_paths() {
        assert!(Cli::try_parse_from(["pathmux", "watch"]).is_err());
    }

    #[test]
    fn test_plan_status() {
        let snapshot = WatchSnapshot {
            watched: BTreeMap::from([("a".into(), 1), ("a/x.txt".into(), 1), ("b".into(), 1)]),
            active: vec!["a".into(), "b".into()],
            covering: vec!["a".into()],
        };
        assert_eq!(plan_status(&snapshot, Utf8Path::new("a")), "watch, covers descendants");
        assert_eq!(plan_status(&snapshot, Utf8Path::new("b")), "watch");
        assert_eq!(plan_status(&snapshot, Utf8Path::new("a/x.txt")), "covered by ancestor");
    }
}
