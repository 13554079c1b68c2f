//! Hot-redeploy state machine.
//!
//! One cycle per coalesced change batch:
//!
//! `Idle → ChangeDetected → RunningOnRedeployCommand → GracePeriod → TerminatingOld → StartingNew → Idle`
//!
//! A failing on-redeploy command aborts the cycle and leaves the current process alone.
//! A launch failure is logged and the loop keeps waiting, so the next change retries.
//! Every step races the cancellation token; once it fires the loop moves to
//! `ShuttingDown`, kills the live child and reports its exit code.
//!
//! The loop is the only writer of the current child handle.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::process::{ChildHandle, ProcessSupervisor};
use crate::command::{self, Mode};
use crate::config::LaunchConfig;
use crate::error::{Error, Result};
use crate::watcher::{ChangeBatch, ChangeSource};

/// Produces the argument vector (program first) for each (re)start.
pub type CommandFactory = Box<dyn Fn(&LaunchConfig) -> Result<Vec<String>> + Send + Sync>;

/// Where the redeploy loop currently is.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RedeployState {
    Idle,
    ChangeDetected,
    RunningOnRedeployCommand,
    GracePeriod,
    TerminatingOld,
    StartingNew,
    ShuttingDown,
}

/// Result of a finished redeploy loop.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RedeployOutcome {
    /// Exit code of the last supervised process.
    pub exit_code: Option<i32>,
    /// Restart cycles that reached `StartingNew`.
    pub restarts: u32,
}

enum Wake {
    Stop,
    Changed(ChangeBatch),
    SourceClosed,
    Exited(Option<i32>),
}

/// Runs the application and restarts it whenever its change source reports a batch.
pub struct Redeployer {
    config: Arc<LaunchConfig>,
    supervisor: ProcessSupervisor,
    command: CommandFactory,
    cancel: CancellationToken,
    state: watch::Sender<RedeployState>,
    current: Option<ChildHandle>,
    restarts: u32,
}

impl Redeployer {
    /// A redeployer launching `command::build(config, Mode::Run)` on every start.
    pub fn new(
        config: Arc<LaunchConfig>,
        supervisor: ProcessSupervisor,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(RedeployState::Idle);
        Self {
            config,
            supervisor,
            command: Box::new(|cfg: &LaunchConfig| {
                command::build(cfg, Mode::Run).map(|cmd| cmd.argv())
            }),
            cancel,
            state,
            current: None,
            restarts: 0,
        }
    }

    /// Replace how the command line is produced for each start.
    pub fn with_command_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&LaunchConfig) -> Result<Vec<String>> + Send + Sync + 'static,
    {
        self.command = Box::new(factory);
        self
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<RedeployState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> RedeployState {
        *self.state.borrow()
    }

    /// Start the application, then restart it once per change batch until cancelled.
    pub async fn run<S: ChangeSource>(mut self, mut changes: S) -> RedeployOutcome {
        info!(target: "vertx_run::redeploy", "Redeploy loop started");
        self.start_new();
        let mut watching = true;

        loop {
            self.set_state(RedeployState::Idle);
            let wake = tokio::select! {
                _ = self.cancel.cancelled() => Wake::Stop,
                batch = changes.next_batch(), if watching => match batch {
                    Some(batch) => Wake::Changed(batch),
                    None => Wake::SourceClosed,
                },
                code = exited(self.current.as_ref()) => Wake::Exited(code),
            };

            match wake {
                Wake::Stop => break,
                Wake::Changed(batch) => {
                    if !self.cycle(batch).await {
                        break;
                    }
                }
                Wake::SourceClosed => {
                    warn!(target: "vertx_run::redeploy", "Change source closed; no further redeploys");
                    watching = false;
                }
                Wake::Exited(code) => {
                    warn!(
                        target: "vertx_run::redeploy",
                        ?code,
                        "Application exited; waiting for changes to redeploy"
                    );
                    if !watching {
                        break;
                    }
                }
            }
        }

        self.shutdown().await
    }

    /// One restart cycle. Returns `false` when cancelled midway.
    async fn cycle(&mut self, batch: ChangeBatch) -> bool {
        self.set_state(RedeployState::ChangeDetected);
        info!(
            target: "vertx_run::redeploy",
            changed = batch.len(),
            first = ?batch.paths().first(),
            "Change detected"
        );

        if let Some(cmd) = self.config.on_redeploy().map(<[String]>::to_vec) {
            self.set_state(RedeployState::RunningOnRedeployCommand);
            let result = tokio::select! {
                _ = self.cancel.cancelled() => return false,
                result = run_on_redeploy(&cmd, &self.config.work_directory) => result,
            };
            if let Err(e) = result {
                warn!(
                    target: "vertx_run::redeploy",
                    error = %e,
                    "Redeploy aborted; keeping the current process"
                );
                return true;
            }
        }

        self.set_state(RedeployState::GracePeriod);
        if !self.pause(self.config.grace_period()).await {
            return false;
        }

        self.set_state(RedeployState::TerminatingOld);
        if let Some(old) = self.current.take() {
            if !self.stop_old(&old).await {
                self.current = Some(old);
                return false;
            }
        }
        if self.cancel.is_cancelled() {
            return false;
        }

        self.set_state(RedeployState::StartingNew);
        self.restarts += 1;
        self.start_new();
        true
    }

    /// Graceful stop bounded by the termination period, then a kill.
    async fn stop_old(&self, old: &ChildHandle) -> bool {
        if let Err(e) = old.terminate(false) {
            warn!(target: "vertx_run::redeploy", error = %e, "Graceful termination failed");
        }
        let period = self.config.termination_period();
        tokio::select! {
            _ = self.cancel.cancelled() => return false,
            waited = tokio::time::timeout(period, old.wait()) => {
                if let Ok(code) = waited {
                    debug!(target: "vertx_run::redeploy", ?code, "Old process exited");
                    return true;
                }
            }
        }

        warn!(
            target: "vertx_run::redeploy",
            pid = old.pid(),
            termination_period_ms = self.config.termination_period_ms,
            "Old process did not exit in time; killing it"
        );
        if let Err(e) = old.terminate(true) {
            warn!(target: "vertx_run::redeploy", error = %e, "Kill failed");
        }
        old.wait().await;
        true
    }

    fn start_new(&mut self) {
        let argv = match (self.command)(&self.config) {
            Ok(argv) => argv,
            Err(e) => {
                error!(target: "vertx_run::redeploy", error = %e, "Cannot build launch command");
                return;
            }
        };
        match self.supervisor.launch(&argv, &self.config.work_directory) {
            Ok(child) => self.current = Some(child),
            Err(e) => error!(
                target: "vertx_run::redeploy",
                error = %e,
                "Launch failed; the next change will retry"
            ),
        }
    }

    async fn pause(&self, period: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(period) => true,
        }
    }

    async fn shutdown(mut self) -> RedeployOutcome {
        self.set_state(RedeployState::ShuttingDown);
        let exit_code = match self.current.take() {
            Some(child) => {
                if let Err(e) = child.terminate(true) {
                    warn!(target: "vertx_run::redeploy", error = %e, "Kill failed during shutdown");
                }
                child.wait().await
            }
            None => None,
        };
        info!(
            target: "vertx_run::redeploy",
            ?exit_code,
            restarts = self.restarts,
            "Redeploy loop stopped"
        );
        RedeployOutcome {
            exit_code,
            restarts: self.restarts,
        }
    }

    fn set_state(&self, state: RedeployState) {
        debug!(target: "vertx_run::redeploy", ?state, "State");
        self.state.send_replace(state);
    }
}

/// Resolves with the exit code of a running child; never resolves otherwise.
async fn exited(current: Option<&ChildHandle>) -> Option<i32> {
    match current {
        Some(child) if child.is_running() => child.wait().await,
        _ => std::future::pending().await,
    }
}

/// Run the on-redeploy command to completion inside `work_dir` (no shell involved).
pub async fn run_on_redeploy(cmd: &[String], work_dir: &Path) -> Result<()> {
    let Some((program, args)) = cmd.split_first() else {
        return Ok(());
    };
    let rendered = cmd.join(" ");
    info!(target: "vertx_run::redeploy", command = %rendered, "Running on-redeploy command");

    let status = Command::new(program)
        .args(args)
        .current_dir(work_dir)
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|e| Error::Launch {
            program: program.clone(),
            reason: e.to_string(),
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(Error::OnRedeployFailure {
            command: rendered,
            code: status.code(),
        })
    }
}
