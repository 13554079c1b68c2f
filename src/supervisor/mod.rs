#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

/*!
Supervisor module.

This module wires together:
- `process`: launching one child process and controlling it through a `ChildHandle`
- `redeploy`: the restart state machine driven by file changes

Typical usage without redeploy:
- Build the argument vector with `command::build`.
- `ProcessSupervisor::launch` it in the configured work directory.
- `run_to_exit` until it exits or a stop is requested.

Example:
```no_run
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vertx_run::supervisor::{OutputMode, ProcessSupervisor, run_to_exit};

# async fn demo() -> vertx_run::Result<()> {
let argv = vec!["java".to_string(), "-version".to_string()];
let child = ProcessSupervisor::new(OutputMode::Inherit).launch(&argv, Path::new("."))?;
let code = run_to_exit(&child, Duration::from_secs(1), &CancellationToken::new()).await?;
# Ok(())
# }
```
*/

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::Result;

pub mod process;
pub mod redeploy;

// Re-exports for convenient access from `vertx_run::supervisor::*`
pub use process::{ChildHandle, OutputMode, ProcessState, ProcessSupervisor};
pub use redeploy::{
    CommandFactory, RedeployOutcome, RedeployState, Redeployer, run_on_redeploy,
};

/// Wait for `child` to exit and return its exit code.
///
/// When `cancel` fires first, the child is asked to terminate, given `termination_period`
/// to exit, and then killed.
pub async fn run_to_exit(
    child: &ChildHandle,
    termination_period: Duration,
    cancel: &CancellationToken,
) -> Result<Option<i32>> {
    tokio::select! {
        code = child.wait() => return Ok(code),
        _ = cancel.cancelled() => {}
    }

    info!(
        target: "vertx_run::supervisor",
        pid = child.pid(),
        "Stop requested; terminating application"
    );
    child.terminate(false)?;
    if let Ok(code) = tokio::time::timeout(termination_period, child.wait()).await {
        return Ok(code);
    }

    warn!(
        target: "vertx_run::supervisor",
        pid = child.pid(),
        termination_period_ms = termination_period.as_millis() as u64,
        "Application did not exit in time; killing it"
    );
    child.terminate(true)?;
    Ok(child.wait().await)
}
