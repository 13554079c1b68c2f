#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! vertx-run — launch, debug and hot-redeploy Vert.x applications from a declarative configuration.
//!
//! The crate turns a flat launch configuration into a JVM command line, supervises the
//! resulting process and, in redeploy mode, restarts it whenever watched files change.
//! Most implementation details live under the internal modules:
//! - `config`: Launch configuration model, loader, and schema helpers.
//! - `command`: Pure command-line synthesis for run and debug modes, plus manifest attributes.
//! - `supervisor`: Child process lifecycle and the redeploy state machine.
//! - `watcher`: Glob matching, change coalescing and filesystem notifications.
//!
//! Use `vertx_run::prelude::*` to bring commonly used items into scope quickly.

/// Public module: configuration (models, loader, schema helpers).
pub mod config;
/// Public module: command-line synthesis (run/debug commands, manifest attributes).
pub mod command;
/// Public module: error taxonomy.
pub mod error;
/// Public module: process supervision and redeploy.
pub mod supervisor;
/// Public module: file watching (globs, coalescing, notify watcher).
pub mod watcher;

pub use error::{Error, Result};

/// Crate-level constants for consumers that want to inspect package metadata at runtime.
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version (e.g., "0.1.0").
#[inline]
pub const fn version() -> &'static str {
    PKG_VERSION
}

/// Parse a simple level name (trace|debug|info|warn|error), case-insensitively.
pub fn parse_level(name: &str) -> Option<tracing::Level> {
    use tracing::Level;

    match name.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize tracing (logging) with a reasonable default.
/// - Uses `level` when given, otherwise honors the `RUST_LOG` environment variable.
/// - Falls back to `info` level.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init_tracing(level: Option<&str>) {
    use tracing_subscriber::fmt;

    let level = level
        .map(str::to_string)
        .or_else(|| std::env::var("RUST_LOG").ok())
        .and_then(|s| parse_level(&s))
        .unwrap_or(tracing::Level::INFO);

    // Logs go to stderr so stdout stays with the application and `command` output.
    let _ = fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

/// A convenient set of exports for most consumers.
///
/// Bring this into scope with:
/// `use vertx_run::prelude::*;`
pub mod prelude {
    // Common result/error handling
    pub use anyhow::{Context, anyhow, bail, ensure};

    // Tracing macros
    pub use tracing::{debug, error, info, instrument, trace, warn};

    // Timing helpers
    pub use std::time::Duration;
    pub use tokio_util::sync::CancellationToken;

    pub use crate as vertx_run;
    pub use crate::command::{LaunchCommand, Mode};
    pub use crate::config::{LaunchConfig, Launcher};
    pub use crate::supervisor::{ChildHandle, OutputMode, ProcessSupervisor, Redeployer};
    pub use crate::watcher::{ChangeSource, FileWatcher};
    pub use crate::{Error, Result};

    // Frequently used internal modules
    pub use crate::{command, config, supervisor, watcher};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_names() {
        assert_eq!(parse_level("WARNING"), Some(tracing::Level::WARN));
        assert_eq!(parse_level("trace"), Some(tracing::Level::TRACE));
        assert_eq!(parse_level("verbose"), None);
    }
}
