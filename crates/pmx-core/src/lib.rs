//! Configuration, errors, and shared collection types for pathmux.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - Configuration structures ([`Config`], [`WatchConfig`], [`LogConfig`])
//! - Configuration errors ([`ConfigError`])
//! - Type aliases for `FxHashMap`/`FxHashSet` (faster than std for path keys)

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod hash;

pub use config::{BackendKind, Config, LogConfig, WatchConfig};
pub use error::ConfigError;
pub use hash::{FxHashMap, FxHashSet, fx_hash_map, fx_hash_set};
