use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use vertx_run::command::{self, Mode};
use vertx_run::config::{self as cfg, LaunchConfig, Launcher};
use vertx_run::supervisor::{OutputMode, ProcessSupervisor, Redeployer, run_to_exit};
use vertx_run::watcher::FileWatcher;

/// vertx-run CLI
#[derive(Debug, Parser)]
#[command(
    name = vertx_run::PKG_NAME,
    version = vertx_run::PKG_VERSION,
    about = "Launch, debug and hot-redeploy Vert.x applications"
)]
struct Cli {
    /// Set log level (e.g., trace, debug, info, warn, error). Overrides RUST_LOG.
    #[arg(long = "log-level", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the application, restarting it on file changes when redeploy is enabled
    Run(LaunchArgs),
    /// Print the command line `run` would launch (as a JSON array) without launching it
    Command(LaunchArgs),
    /// Print the fat-jar manifest attributes for the configured launcher and main module
    Manifest(ConfigArgs),
    /// Print the JSON Schema for the configuration file and exit
    Schema,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    /// Path to the JSON configuration file (built-in defaults apply when omitted)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Main module (verticle) to run, overriding the configuration
    #[arg(long = "main-module")]
    main_module: Option<String>,

    /// Launcher class, overriding the configuration
    #[arg(long = "launcher")]
    launcher: Option<String>,
}

#[derive(Debug, Args)]
struct LaunchArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Attach a JDWP debugging agent (debug runs are never redeployed)
    #[arg(long = "debug")]
    debug: bool,

    /// Disable redeploy even when the configuration enables it
    #[arg(long = "no-redeploy")]
    no_redeploy: bool,

    /// Application arguments, appended after the configured ones
    #[arg(last = true)]
    app_args: Vec<String>,
}

impl LaunchArgs {
    fn mode(&self) -> Mode {
        if self.debug { Mode::Debug } else { Mode::Run }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    vertx_run::init_tracing(cli.log_level.as_deref());
    debug!(version = vertx_run::PKG_VERSION, command = ?cli.command, "Starting vertx-run");

    match cli.command {
        Commands::Schema => {
            let schema = cfg::generate_schema();
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Manifest(args) => {
            let config = load_config(&args).await?;
            print!(
                "{}",
                command::render_manifest(&command::manifest_attributes(&config))
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Command(args) => {
            let config = launch_config(&args).await?;
            let launch = command::build(&config, args.mode())?;
            println!("{}", serde_json::to_string_pretty(&launch.argv())?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run(args) => run(args).await,
    }
}

async fn run(args: LaunchArgs) -> anyhow::Result<ExitCode> {
    let mode = args.mode();
    let config = Arc::new(launch_config(&args).await?);

    // Configuration errors surface here, before anything is spawned.
    let launch = command::build(&config, mode)?;
    let redeploy = mode == Mode::Run && config.redeploy_enabled;
    info!(
        ?mode,
        redeploy,
        main_class = %launch.main_class,
        work_dir = %config.work_directory.display(),
        "Launching application"
    );

    let cancel = CancellationToken::new();
    let stop = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
            stop.cancel();
        }
    });

    let supervisor = ProcessSupervisor::new(OutputMode::Inherit);
    let code = if redeploy {
        let watcher = FileWatcher::start(
            &config.watch_globs,
            &config.work_directory,
            config.scan_period(),
        )
        .context("Redeploy was requested but file watching could not be set up")?;
        let outcome = Redeployer::new(Arc::clone(&config), supervisor, cancel)
            .run(watcher)
            .await;
        info!(restarts = outcome.restarts, "Redeploy session ended");
        outcome.exit_code
    } else {
        let child = supervisor.launch(&launch.argv(), &config.work_directory)?;
        run_to_exit(&child, config.termination_period(), &cancel).await?
    };

    info!(exit_code = ?code, "vertx-run exited");
    Ok(exit_code(code))
}

/// Load the configuration file (or defaults) and apply command-line overrides.
async fn load_config(args: &ConfigArgs) -> anyhow::Result<LaunchConfig> {
    let config = with_overrides(base_config(args).await?, args);
    cfg::validate_config(&config)?;
    Ok(config)
}

async fn launch_config(args: &LaunchArgs) -> anyhow::Result<LaunchConfig> {
    with_launch_overrides(base_config(&args.config).await?, args)
}

async fn base_config(args: &ConfigArgs) -> anyhow::Result<LaunchConfig> {
    match &args.config {
        Some(path) => cfg::load_from_path_async(path).await,
        None => {
            debug!("No configuration file given; using defaults");
            Ok(LaunchConfig::default())
        }
    }
}

fn with_overrides(mut config: LaunchConfig, args: &ConfigArgs) -> LaunchConfig {
    if let Some(main_module) = &args.main_module {
        config.main_module = main_module.clone();
    }
    if let Some(launcher) = &args.launcher {
        config.launcher_class = Launcher::from(launcher.as_str());
    }
    config
}

/// Apply every launch override, then validate the result as a whole.
fn with_launch_overrides(config: LaunchConfig, args: &LaunchArgs) -> anyhow::Result<LaunchConfig> {
    let mut config = with_overrides(config, &args.config);
    if args.no_redeploy {
        config.redeploy_enabled = false;
    }
    config.args.extend(args.app_args.iter().cloned());
    cfg::validate_config(&config)?;
    Ok(config)
}

/// Map the child's exit code onto ours; death by signal or an unknown status becomes 1.
fn exit_code(code: Option<i32>) -> ExitCode {
    code.and_then(|c| u8::try_from(c).ok())
        .map_or(ExitCode::FAILURE, ExitCode::from)
}
