//! Supervised child process.
//!
//! A launched process is owned by a monitor task that waits for its exit and publishes
//! the result on a `watch` channel. The [`ChildHandle`] given back to the caller only
//! observes that channel and sends stop requests to the monitor, so it can be queried,
//! awaited and terminated from several places without sharing the `Child` itself.
//! Signals are only ever sent by the monitor, before it has reaped the child, so a
//! recycled pid is never hit.
//!
//! Dropping the handle kills the process.

use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};

/// How long `wait` keeps draining captured stdout after the process has exited.
/// Descendants that inherited the pipe can hold it open indefinitely.
const STDOUT_DRAIN: Duration = Duration::from_millis(250);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum StopRequest {
    Terminate,
    Kill,
}

/// What happens to the child's standard streams.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Share the supervisor's stdin/stdout/stderr.
    #[default]
    Inherit,
    /// Collect stdout line by line (see [`ChildHandle::stdout_lines`]); stderr is inherited.
    Capture,
}

/// Lifecycle state of a supervised process.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    /// Exited with the given code; `None` when killed by a signal or the status was lost.
    Exited(Option<i32>),
}

impl ProcessState {
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessState::Running)
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessState::Running => None,
            ProcessState::Exited(code) => *code,
        }
    }
}

/// Launches child processes with a fixed stream configuration.
#[derive(Debug, Clone, Default)]
pub struct ProcessSupervisor {
    output: OutputMode,
}

impl ProcessSupervisor {
    pub fn new(output: OutputMode) -> Self {
        Self { output }
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output
    }

    /// Start exactly one child process running `argv` (program first) inside `work_dir`.
    ///
    /// Fails with [`Error::Launch`] when `argv` is empty, `work_dir` is not an existing
    /// directory, or the program cannot be spawned.
    pub fn launch(&self, argv: &[String], work_dir: &Path) -> Result<ChildHandle> {
        let Some((program, args)) = argv.split_first() else {
            return Err(Error::Launch {
                program: String::new(),
                reason: "empty command line".to_string(),
            });
        };

        if !work_dir.is_dir() {
            return Err(Error::Launch {
                program: program.clone(),
                reason: format!("working directory {} does not exist", work_dir.display()),
            });
        }

        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(work_dir).kill_on_drop(true);
        match self.output {
            OutputMode::Inherit => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
            OutputMode::Capture => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::inherit());
            }
        }

        let mut child = cmd.spawn().map_err(|e| Error::Launch {
            program: program.clone(),
            reason: if e.kind() == std::io::ErrorKind::NotFound {
                "executable not found".to_string()
            } else {
                e.to_string()
            },
        })?;

        let pid = child.id();
        info!(
            target: "vertx_run::supervisor",
            pid, %program, work_dir = %work_dir.display(),
            "Process started"
        );
        debug!(target: "vertx_run::supervisor", ?argv, "Process command line");

        let stdout = Arc::new(Mutex::new(Vec::new()));
        let reader = child.stdout.take().map(|out| {
            let lines_out = Arc::clone(&stdout);
            tokio::spawn(async move {
                let mut lines = BufReader::new(out).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    trace!(target: "vertx_run::supervisor", pid, %line, "stdout");
                    if let Ok(mut buf) = lines_out.lock() {
                        buf.push(line);
                    }
                }
            })
        });

        let (state_tx, state_rx) = watch::channel(ProcessState::Running);
        let (stop_tx, mut stop_rx) = mpsc::unbounded_channel::<StopRequest>();

        // The monitor owns the child. A kill request, or the handle going away, kills it.
        tokio::spawn(async move {
            let status = loop {
                tokio::select! {
                    status = child.wait() => break status,
                    request = stop_rx.recv() => match request {
                        Some(StopRequest::Terminate) => send_terminate(&mut child),
                        Some(StopRequest::Kill) | None => {
                            if let Err(e) = child.start_kill() {
                                warn!(target: "vertx_run::supervisor", pid, error = %e, "Failed to kill process");
                            }
                            break child.wait().await;
                        }
                    },
                }
            };
            let code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    error!(target: "vertx_run::supervisor", pid, error = %e, "Error waiting for process");
                    None
                }
            };
            info!(target: "vertx_run::supervisor", pid, ?code, "Process exited");
            let _ = state_tx.send(ProcessState::Exited(code));
        });

        Ok(ChildHandle {
            program: program.clone(),
            pid,
            state: state_rx,
            stop_tx,
            stdout,
            reader: Mutex::new(reader),
        })
    }
}

/// Deliver SIGTERM to a child that has not been reaped yet.
#[cfg(unix)]
fn send_terminate(child: &mut Child) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(errno) => {
            let err = Error::Terminate {
                pid,
                source: errno.into(),
            };
            warn!(target: "vertx_run::supervisor", error = %err, "Graceful termination failed");
        }
    }
}

/// Without POSIX signals, a graceful stop is a kill.
#[cfg(not(unix))]
fn send_terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!(target: "vertx_run::supervisor", pid = child.id(), error = %e, "Failed to kill process");
    }
}

/// Handle to one supervised child process.
#[derive(Debug)]
pub struct ChildHandle {
    program: String,
    pid: Option<u32>,
    state: watch::Receiver<ProcessState>,
    stop_tx: mpsc::UnboundedSender<StopRequest>,
    stdout: Arc<Mutex<Vec<String>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl ChildHandle {
    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Exit code once terminated; `None` while running or after death by signal.
    pub fn exit_code(&self) -> Option<i32> {
        self.state().exit_code()
    }

    /// Wait for the process to exit and return its exit code.
    ///
    /// Can be awaited by several callers at once. In capture mode the first caller also
    /// drains the remaining stdout, for at most a short grace; output still arriving
    /// after that (from a descendant holding the pipe) is dropped.
    pub async fn wait(&self) -> Option<i32> {
        let mut state = self.state.clone();
        let code = state
            .wait_for(|s| !s.is_running())
            .await
            .map(|s| s.exit_code())
            .unwrap_or(None);

        let reader = self.reader.lock().ok().and_then(|mut r| r.take());
        if let Some(mut reader) = reader {
            if tokio::time::timeout(STDOUT_DRAIN, &mut reader).await.is_err() {
                debug!(target: "vertx_run::supervisor", pid = self.pid, "stdout still open after exit; detaching reader");
                reader.abort();
            }
        }
        code
    }

    /// Ask the process to stop: SIGTERM when graceful (on unix), a kill when `forcibly`.
    ///
    /// Returns whether a request was handed to the monitor. Once the process has exited
    /// this is a no-op returning `Ok(false)`, however often it is called.
    pub fn terminate(&self, forcibly: bool) -> Result<bool> {
        if !self.is_running() {
            trace!(target: "vertx_run::supervisor", pid = self.pid, "terminate: already exited");
            return Ok(false);
        }
        debug!(target: "vertx_run::supervisor", pid = self.pid, forcibly, "Terminating process");
        let request = if forcibly {
            StopRequest::Kill
        } else {
            StopRequest::Terminate
        };
        Ok(self.stop_tx.send(request).is_ok())
    }

    /// Stdout lines captured so far (always empty in [`OutputMode::Inherit`]).
    pub fn stdout_lines(&self) -> Vec<String> {
        self.stdout
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn capture() -> ProcessSupervisor {
        ProcessSupervisor::new(OutputMode::Capture)
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let handle = capture()
            .launch(&argv(&["sh", "-c", "echo hello; pwd; exit 3"]), dir.path())
            .unwrap();

        assert_eq!(handle.wait().await, Some(3));
        assert!(!handle.is_running());
        assert_eq!(handle.exit_code(), Some(3));

        let lines = handle.stdout_lines();
        assert_eq!(lines[0], "hello");
        let reported = std::fs::canonicalize(&lines[1]).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[tokio::test]
    async fn terminate_after_exit_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let handle = capture().launch(&argv(&["true"]), dir.path()).unwrap();
        assert_eq!(handle.wait().await, Some(0));

        assert!(!handle.terminate(false).unwrap());
        assert!(!handle.terminate(false).unwrap());
        assert!(!handle.terminate(true).unwrap());
        assert_eq!(handle.exit_code(), Some(0));
    }

    #[tokio::test]
    async fn graceful_terminate_stops_running_process() {
        let dir = tempfile::tempdir().unwrap();
        let handle = capture().launch(&argv(&["sleep", "30"]), dir.path()).unwrap();
        assert!(handle.is_running());
        assert!(handle.pid().is_some());

        assert!(handle.terminate(false).unwrap());
        let code = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("process should exit after SIGTERM");
        assert_eq!(code, None);
        assert!(!handle.terminate(false).unwrap());
    }

    #[tokio::test]
    async fn forced_terminate_kills_process_ignoring_sigterm() {
        let dir = tempfile::tempdir().unwrap();
        let handle = capture()
            .launch(&argv(&["sh", "-c", "trap '' TERM; exec sleep 30"]), dir.path())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(handle.terminate(false).unwrap());
        let waited = tokio::time::timeout(Duration::from_millis(300), handle.wait()).await;
        assert!(waited.is_err(), "SIGTERM should be ignored");

        assert!(handle.terminate(true).unwrap());
        let code = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("process should exit after kill");
        assert_eq!(code, None);
    }

    #[tokio::test]
    async fn wait_returns_when_descendant_keeps_stdout_open() {
        let dir = tempfile::tempdir().unwrap();
        let handle = capture()
            .launch(&argv(&["sh", "-c", "echo started; sleep 4 & exit 0"]), dir.path())
            .unwrap();

        let started = std::time::Instant::now();
        let code = tokio::time::timeout(Duration::from_secs(3), handle.wait())
            .await
            .expect("wait must not follow the background sleep");
        assert_eq!(code, Some(0));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!handle.is_running());
        assert_eq!(handle.stdout_lines(), vec!["started".to_string()]);
    }

    #[tokio::test]
    async fn terminate_racing_exit_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let handle = capture().launch(&argv(&["true"]), dir.path()).unwrap();
        for _ in 0..20 {
            let _ = handle.terminate(false).unwrap();
            tokio::task::yield_now().await;
        }
        let code = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("process should exit");
        assert!(matches!(code, Some(0) | None));
        assert!(!handle.terminate(false).unwrap());
    }

    #[tokio::test]
    async fn concurrent_waiters_see_same_exit() {
        let dir = tempfile::tempdir().unwrap();
        let handle = capture()
            .launch(&argv(&["sh", "-c", "sleep 0.2; exit 7"]), dir.path())
            .unwrap();
        let (a, b) = tokio::join!(handle.wait(), handle.wait());
        assert_eq!((a, b), (Some(7), Some(7)));
    }

    #[tokio::test]
    async fn missing_work_directory_is_a_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = capture().launch(&argv(&["true"]), &missing).unwrap_err();
        match err {
            Error::Launch { program, reason } => {
                assert_eq!(program, "true");
                assert!(reason.contains("nope"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_executable_is_a_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = capture()
            .launch(&argv(&["definitely-not-a-real-program-4711"]), dir.path())
            .unwrap_err();
        assert!(matches!(err, Error::Launch { .. }));
        assert!(err.to_string().contains("definitely-not-a-real-program-4711"));
    }

    #[tokio::test]
    async fn empty_command_line_is_a_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = capture().launch(&[], dir.path()).unwrap_err();
        assert!(matches!(err, Error::Launch { .. }));
    }
}
