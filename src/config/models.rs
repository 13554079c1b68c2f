use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Fully-qualified class name of the framework's built-in launcher.
pub const DEFAULT_LAUNCHER: &str = "io.vertx.core.Launcher";

/// Root configuration for a launch.
///
/// Deserialized from a JSON file with camelCase keys. Every field has a default,
/// so an empty object `{}` is a valid (if not yet runnable) configuration.
///
/// Once assembled the configuration is treated as read-only: the binary freezes it
/// behind an `Arc` before anything is built or launched. Redeploy-related fields are
/// kept even when `redeploy_enabled` is false; they are simply not consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct LaunchConfig {
    /// Entry-point class bootstrapping the application.
    /// `io.vertx.core.Launcher` (the default) runs `mainModule` directly.
    #[schemars(with = "String")]
    pub launcher_class: Launcher,

    /// Application unit (verticle) to run. Required with the default launcher.
    pub main_module: String,

    /// Extra application arguments, appended last and in order.
    pub args: Vec<String>,

    /// Configuration file handed to the application with `--conf`.
    pub config_path: Option<String>,

    /// Working directory of the launched process.
    pub work_directory: PathBuf,

    /// Flags for the JVM hosting the application, in order.
    pub jvm_options: Vec<String>,

    /// Restart the application when watched files change.
    pub redeploy_enabled: bool,

    /// Glob patterns to watch. Relative patterns are resolved against `workDirectory`.
    pub watch_globs: Vec<String>,

    /// Command (program followed by its arguments) run before each restart, e.g. a recompilation.
    pub on_redeploy_command: Option<Vec<String>>,

    /// Length of the change-coalescing window, in milliseconds.
    pub scan_period_ms: u64,

    /// Delay between a successful rebuild and stopping the old process, in milliseconds.
    pub grace_period_ms: u64,

    /// How long the old process may take to exit before it is killed, in milliseconds.
    pub termination_period_ms: u64,

    /// Port the debug agent listens on.
    pub debug_port: u16,

    /// Whether the JVM waits for a debugger before starting.
    pub debug_suspend_on_start: bool,

    /// Program hosting the application (the JVM).
    pub java_executable: String,

    /// Runtime classpath produced by the packaging step.
    pub classpath: Vec<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            launcher_class: Launcher::Default,
            main_module: String::new(),
            args: Vec::new(),
            config_path: None,
            work_directory: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            jvm_options: Vec::new(),
            redeploy_enabled: true,
            watch_globs: vec!["src/**/*".to_string()],
            on_redeploy_command: None,
            scan_period_ms: 1000,
            grace_period_ms: 1000,
            termination_period_ms: 1000,
            debug_port: 5005,
            debug_suspend_on_start: false,
            java_executable: "java".to_string(),
            classpath: Vec::new(),
        }
    }
}

impl LaunchConfig {
    /// `--conf` value, treating a blank path as unset.
    pub fn config_file(&self) -> Option<&str> {
        self.config_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// On-redeploy command, treating an empty list as unset.
    pub fn on_redeploy(&self) -> Option<&[String]> {
        self.on_redeploy_command
            .as_deref()
            .filter(|cmd| !cmd.is_empty())
    }

    pub fn scan_period(&self) -> Duration {
        Duration::from_millis(self.scan_period_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn termination_period(&self) -> Duration {
        Duration::from_millis(self.termination_period_ms)
    }
}

/// The launcher class, tagged by whether it is the framework's built-in one.
///
/// Serialized as the plain class name; `"io.vertx.core.Launcher"` maps to [`Launcher::Default`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Launcher {
    #[default]
    Default,
    Custom(String),
}

impl Launcher {
    /// Class name passed to the JVM.
    pub fn class_name(&self) -> &str {
        match self {
            Launcher::Default => DEFAULT_LAUNCHER,
            Launcher::Custom(class) => class,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Launcher::Default)
    }
}

impl From<String> for Launcher {
    fn from(class: String) -> Self {
        if class == DEFAULT_LAUNCHER {
            Launcher::Default
        } else {
            Launcher::Custom(class)
        }
    }
}

impl From<&str> for Launcher {
    fn from(class: &str) -> Self {
        Launcher::from(class.to_string())
    }
}

impl From<Launcher> for String {
    fn from(launcher: Launcher) -> Self {
        match launcher {
            Launcher::Default => DEFAULT_LAUNCHER.to_string(),
            Launcher::Custom(class) => class,
        }
    }
}
