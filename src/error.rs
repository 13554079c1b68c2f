//! Error taxonomy shared by the command builder, the supervisor and the watcher.
//!
//! Configuration loading and the binary wrap these in `anyhow` with context;
//! library operations return [`Result`] so callers can match on the variant
//! (for instance, the redeploy loop keeps running after a `Launch` error).

use std::io;

/// Errors surfaced while building, launching or redeploying an application.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required setting is missing or unusable. Nothing has been spawned.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The child process could not be started.
    #[error("failed to launch '{program}': {reason}")]
    Launch { program: String, reason: String },

    /// The rebuild command ran before a restart exited unsuccessfully.
    #[error("on-redeploy command `{command}` failed with exit code {}", display_code(*code))]
    OnRedeployFailure { command: String, code: Option<i32> },

    /// Filesystem watching could not be set up.
    #[error("cannot watch '{target}': {reason}")]
    Watch { target: String, reason: String },

    /// A termination signal could not be delivered.
    #[error("failed to signal process {pid}: {source}")]
    Terminate {
        pid: u32,
        #[source]
        source: io::Error,
    },
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

fn display_code(code: Option<i32>) -> String {
    code.map_or_else(|| "none (terminated by signal)".to_string(), |c| c.to_string())
}
