use tracing::{debug, trace};

use crate::config::{DEFAULT_LAUNCHER, LaunchConfig};
use crate::error::{Error, Result};

/// Largest duration the JVM options accept, used to switch off the blocked-thread checker.
const MAX_EXECUTE_TIME: i64 = i64::MAX;

/// How the application is started.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Mode {
    /// Plain run, through the redeploying launcher when redeploy is enabled.
    #[default]
    Run,
    /// Run with a remote debugging agent attached; never redeployed.
    Debug,
}

/// A fully resolved command line, split into the parts the JVM distinguishes.
///
/// Every token is atomic: nothing here is meant to be re-split on whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    /// Program hosting the application (the JVM).
    pub program: String,
    /// Options for the hosting runtime, placed before the main class.
    pub runtime_options: Vec<String>,
    /// Classpath entries, passed as a single `-cp` value when non-empty.
    pub classpath: Vec<String>,
    /// Class the runtime starts.
    pub main_class: String,
    /// Program arguments following the main class.
    pub arguments: Vec<String>,
}

impl LaunchCommand {
    /// Full argument vector, program first, ready for direct process invocation.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(
            self.runtime_options.len() + self.arguments.len() + 4,
        );
        argv.push(self.program.clone());
        argv.extend(self.runtime_options.iter().cloned());
        if !self.classpath.is_empty() {
            argv.push("-cp".to_string());
            argv.push(join_classpath(&self.classpath));
        }
        argv.push(self.main_class.clone());
        argv.extend(self.arguments.iter().cloned());
        argv
    }
}

/// Translate a configuration and a mode into the command line that starts the application.
///
/// Pure: no I/O and no side effects. Fails with [`Error::Configuration`] when the default
/// launcher is selected without a main module, whatever the mode.
pub fn build(config: &LaunchConfig, mode: Mode) -> Result<LaunchCommand> {
    let launcher = &config.launcher_class;
    let main_module = config.main_module.trim();

    if launcher.is_default() && main_module.is_empty() {
        return Err(Error::Configuration(format!(
            "mainModule must be specified when using {DEFAULT_LAUNCHER} as the launcher class"
        )));
    }

    let redeploy = mode == Mode::Run && config.redeploy_enabled;
    let mut arguments = vec!["run".to_string()];
    let main_class;

    if redeploy {
        main_class = DEFAULT_LAUNCHER.to_string();
        if launcher.is_default() {
            arguments.push(main_module.to_string());
        }
        push_flag(&mut arguments, "--launcher-class", launcher.class_name());
        if !config.jvm_options.is_empty() {
            push_flag(&mut arguments, "--java-opts", config.jvm_options.join(" "));
        }
        push_flag(&mut arguments, "--redeploy", config.watch_globs.join(","));
        if let Some(cmd) = config.on_redeploy() {
            push_flag(&mut arguments, "--on-redeploy", cmd.join(" "));
        }
        push_flag(
            &mut arguments,
            "--redeploy-grace-period",
            config.grace_period_ms.to_string(),
        );
        push_flag(
            &mut arguments,
            "--redeploy-scan-period",
            config.scan_period_ms.to_string(),
        );
        push_flag(
            &mut arguments,
            "--redeploy-termination-period",
            config.termination_period_ms.to_string(),
        );
    } else {
        main_class = launcher.class_name().to_string();
        if !main_module.is_empty() {
            arguments.push(main_module.to_string());
        }
    }

    if let Some(conf) = config.config_file() {
        push_flag(&mut arguments, "--conf", conf);
    }
    arguments.extend(config.args.iter().cloned());

    let mut runtime_options = Vec::with_capacity(config.jvm_options.len() + 4);
    if mode == Mode::Debug {
        runtime_options.extend(debug_options(config));
    }
    runtime_options.extend(config.jvm_options.iter().cloned());

    let command = LaunchCommand {
        program: config.java_executable.clone(),
        runtime_options,
        classpath: config.classpath.clone(),
        main_class,
        arguments,
    };
    debug!(
        target: "vertx_run::command",
        ?mode, redeploy,
        main_class = %command.main_class,
        "Built launch command"
    );
    trace!(target: "vertx_run::command", argv = ?command.argv(), "Launch command line");
    Ok(command)
}

/// The debugger quartet: JDWP agent, two disabled execution-time watchdogs, debug marker.
fn debug_options(config: &LaunchConfig) -> [String; 4] {
    let suspend = if config.debug_suspend_on_start { "y" } else { "n" };
    [
        format!(
            "-agentlib:jdwp=transport=dt_socket,server=y,suspend={suspend},address={}",
            config.debug_port
        ),
        format!("-Dvertx.options.maxEventLoopExecuteTime={MAX_EXECUTE_TIME}"),
        format!("-Dvertx.options.maxWorkerExecuteTime={MAX_EXECUTE_TIME}"),
        "-Dvertx.debug=true".to_string(),
    ]
}

fn push_flag(arguments: &mut Vec<String>, flag: &str, value: impl Into<String>) {
    arguments.push(flag.to_string());
    arguments.push(value.into());
}

fn join_classpath(entries: &[String]) -> String {
    let separator = if cfg!(windows) { ";" } else { ":" };
    entries.join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Launcher;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn redeploy_config() -> LaunchConfig {
        LaunchConfig {
            main_module: "App".into(),
            redeploy_enabled: true,
            watch_globs: strings(&["src/**"]),
            grace_period_ms: 1000,
            scan_period_ms: 1000,
            termination_period_ms: 1000,
            ..Default::default()
        }
    }

    #[test]
    fn redeploy_run_matches_launcher_contract() {
        let cmd = build(&redeploy_config(), Mode::Run).unwrap();
        assert_eq!(cmd.main_class, DEFAULT_LAUNCHER);
        assert_eq!(
            cmd.arguments,
            strings(&[
                "run",
                "App",
                "--launcher-class",
                DEFAULT_LAUNCHER,
                "--redeploy",
                "src/**",
                "--redeploy-grace-period",
                "1000",
                "--redeploy-scan-period",
                "1000",
                "--redeploy-termination-period",
                "1000",
            ])
        );
    }

    #[test]
    fn custom_launcher_without_redeploy_runs_directly() {
        let cfg = LaunchConfig {
            redeploy_enabled: false,
            launcher_class: Launcher::from("custom.Main"),
            main_module: String::new(),
            ..Default::default()
        };
        let cmd = build(&cfg, Mode::Run).unwrap();
        assert_eq!(cmd.arguments, strings(&["run"]));
        assert_eq!(cmd.main_class, "custom.Main");
        assert!(cmd.runtime_options.is_empty());
    }

    #[test]
    fn default_launcher_requires_main_module_in_every_mode() {
        for redeploy_enabled in [true, false] {
            for main_module in ["", "   "] {
                let cfg = LaunchConfig {
                    main_module: main_module.into(),
                    redeploy_enabled,
                    ..Default::default()
                };
                for mode in [Mode::Run, Mode::Debug] {
                    let err = build(&cfg, mode).unwrap_err();
                    assert!(matches!(err, Error::Configuration(_)), "{mode:?}");
                    assert!(err.to_string().contains(DEFAULT_LAUNCHER));
                }
            }
        }
    }

    #[test]
    fn redeploy_run_emits_optional_flags_in_order() {
        let cfg = LaunchConfig {
            launcher_class: Launcher::from("sample.AppLauncher"),
            main_module: "sample.App".into(),
            jvm_options: strings(&["-Xmx256m", "-Dfoo=bar"]),
            watch_globs: strings(&["src/**/*.java", "conf/*.json"]),
            on_redeploy_command: Some(strings(&["./gradlew", "classes"])),
            config_path: Some("conf/app.json".into()),
            args: strings(&["-instances", "2"]),
            grace_period_ms: 10,
            scan_period_ms: 20,
            termination_period_ms: 30,
            ..Default::default()
        };
        let cmd = build(&cfg, Mode::Run).unwrap();
        assert_eq!(cmd.main_class, DEFAULT_LAUNCHER);
        assert_eq!(
            cmd.arguments,
            strings(&[
                "run",
                "--launcher-class",
                "sample.AppLauncher",
                "--java-opts",
                "-Xmx256m -Dfoo=bar",
                "--redeploy",
                "src/**/*.java,conf/*.json",
                "--on-redeploy",
                "./gradlew classes",
                "--redeploy-grace-period",
                "10",
                "--redeploy-scan-period",
                "20",
                "--redeploy-termination-period",
                "30",
                "--conf",
                "conf/app.json",
                "-instances",
                "2",
            ])
        );
        assert_eq!(cmd.runtime_options, strings(&["-Xmx256m", "-Dfoo=bar"]));
    }

    #[test]
    fn no_redeploy_flags_when_redeploy_disabled() {
        let cfg = LaunchConfig {
            main_module: "sample.App".into(),
            redeploy_enabled: false,
            jvm_options: strings(&["-Xmx1g"]),
            on_redeploy_command: Some(strings(&["make"])),
            config_path: Some("app.json".into()),
            args: strings(&["extra"]),
            ..Default::default()
        };
        let cmd = build(&cfg, Mode::Run).unwrap();
        assert_eq!(cmd.main_class, DEFAULT_LAUNCHER);
        assert_eq!(
            cmd.arguments,
            strings(&["run", "sample.App", "--conf", "app.json", "extra"])
        );
        for flag in [
            "--redeploy",
            "--on-redeploy",
            "--launcher-class",
            "--java-opts",
            "--redeploy-grace-period",
            "--redeploy-scan-period",
            "--redeploy-termination-period",
        ] {
            assert!(!cmd.argv().iter().any(|t| t == flag), "{flag} leaked");
        }
    }

    #[test]
    fn debug_quartet_precedes_user_options() {
        let cfg = LaunchConfig {
            main_module: "sample.App".into(),
            redeploy_enabled: true,
            debug_port: 8000,
            debug_suspend_on_start: true,
            jvm_options: strings(&["-agentlib:jdwp=ignored", "-Xmx1g"]),
            ..Default::default()
        };
        let cmd = build(&cfg, Mode::Debug).unwrap();
        assert_eq!(
            cmd.runtime_options,
            strings(&[
                "-agentlib:jdwp=transport=dt_socket,server=y,suspend=y,address=8000",
                "-Dvertx.options.maxEventLoopExecuteTime=9223372036854775807",
                "-Dvertx.options.maxWorkerExecuteTime=9223372036854775807",
                "-Dvertx.debug=true",
                "-agentlib:jdwp=ignored",
                "-Xmx1g",
            ])
        );
        assert_eq!(cmd.arguments, strings(&["run", "sample.App"]));
        assert!(!cmd.arguments.iter().any(|t| t.starts_with("--redeploy")));
    }

    #[test]
    fn debug_with_custom_launcher_keeps_module_when_set() {
        let cfg = LaunchConfig {
            launcher_class: Launcher::from("sample.AppLauncher"),
            main_module: "sample.App".into(),
            config_path: Some("conf.json".into()),
            ..Default::default()
        };
        let cmd = build(&cfg, Mode::Debug).unwrap();
        assert_eq!(cmd.main_class, "sample.AppLauncher");
        assert_eq!(
            cmd.arguments,
            strings(&["run", "sample.App", "--conf", "conf.json"])
        );
        assert!(cmd.runtime_options[0].contains("suspend=n,address=5005"));
    }

    #[test]
    fn argv_places_classpath_before_main_class() {
        let cfg = LaunchConfig {
            launcher_class: Launcher::from("custom.Main"),
            redeploy_enabled: false,
            java_executable: "/opt/jdk/bin/java".into(),
            jvm_options: strings(&["-Xss2m"]),
            classpath: strings(&["build/classes", "lib/a.jar"]),
            ..Default::default()
        };
        let argv = build(&cfg, Mode::Run).unwrap().argv();
        let separator = if cfg!(windows) { ";" } else { ":" };
        assert_eq!(
            argv,
            vec![
                "/opt/jdk/bin/java".to_string(),
                "-Xss2m".to_string(),
                "-cp".to_string(),
                format!("build/classes{separator}lib/a.jar"),
                "custom.Main".to_string(),
                "run".to_string(),
            ]
        );
    }
}
