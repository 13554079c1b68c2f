use anyhow::{Context, Result, bail, ensure};
use schemars::{Schema, schema_for};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

use super::models::LaunchConfig;
use crate::watcher::WatchSet;

/// Load configuration from a string slice.
///
/// A relative `workDirectory` is resolved against the current directory.
pub fn load_from_str(s: &str) -> Result<LaunchConfig> {
    let cfg: LaunchConfig =
        serde_json::from_str(s).context("Failed to parse JSON config string into LaunchConfig")?;
    finish(cfg, None)
}

/// Load configuration from any reader (e.g., a file).
pub fn load_from_reader<R: Read>(reader: R) -> Result<LaunchConfig> {
    let cfg: LaunchConfig =
        serde_json::from_reader(reader).context("Failed to parse JSON config from reader")?;
    finish(cfg, None)
}

/// Load configuration from a file path synchronously.
///
/// A relative `workDirectory` is resolved against the directory holding the file.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<LaunchConfig> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref)
        .with_context(|| format!("Failed to open config file {}", path_ref.display()))?;
    let cfg: LaunchConfig = serde_json::from_reader(file)
        .with_context(|| format!("Failed to parse JSON config from {}", path_ref.display()))?;
    let cfg = finish(cfg, path_ref.parent())?;
    debug!("Loaded config from {}", path_ref.display());
    Ok(cfg)
}

/// Load configuration from a file path asynchronously (Tokio).
pub async fn load_from_path_async<P: AsRef<Path>>(path: P) -> Result<LaunchConfig> {
    use tokio::fs;
    let path_ref = path.as_ref();
    let bytes = fs::read(path_ref)
        .await
        .with_context(|| format!("Failed to read config file {}", path_ref.display()))?;
    let cfg: LaunchConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse JSON config from {}", path_ref.display()))?;
    let cfg = finish(cfg, path_ref.parent())?;
    debug!("Loaded config from {}", path_ref.display());
    Ok(cfg)
}

/// Generate the JSON Schema for the LaunchConfig model (for editors and external tooling).
pub fn generate_schema() -> Schema {
    schema_for!(LaunchConfig)
}

/// Write the JSON Schema for the LaunchConfig model to any writer (pretty-printed).
pub fn write_schema_to_writer<W: Write>(mut writer: W) -> Result<()> {
    let schema = generate_schema();
    let json = serde_json::to_string_pretty(&schema).context("Failed to serialize schema")?;
    writer
        .write_all(json.as_bytes())
        .context("Failed to write schema to writer")?;
    Ok(())
}

fn finish(mut cfg: LaunchConfig, base: Option<&Path>) -> Result<LaunchConfig> {
    if cfg.work_directory.is_relative() {
        let base = match base {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => std::env::current_dir().context("Failed to resolve the current directory")?,
        };
        cfg.work_directory = base.join(&cfg.work_directory);
    }
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Reject settings that can never produce a working launch.
///
/// A missing `mainModule` is deliberately not checked here: it only matters for the
/// default launcher and is reported when the command line is built.
pub fn validate_config(cfg: &LaunchConfig) -> Result<()> {
    ensure!(
        !cfg.launcher_class.class_name().trim().is_empty(),
        "launcherClass must not be blank"
    );
    ensure!(
        !cfg.java_executable.trim().is_empty(),
        "javaExecutable must not be blank"
    );

    if let Some(cmd) = &cfg.on_redeploy_command {
        match cmd.first() {
            None => bail!("onRedeployCommand must name a program when set"),
            Some(program) if program.trim().is_empty() => {
                bail!("onRedeployCommand has a blank program: {:?}", cmd)
            }
            Some(_) => {}
        }
    }

    if cfg.redeploy_enabled {
        ensure!(
            cfg.scan_period_ms > 0,
            "scanPeriodMs must be greater than zero (got {})",
            cfg.scan_period_ms
        );
        ensure!(
            !cfg.watch_globs.is_empty(),
            "watchGlobs must not be empty while redeployEnabled is true"
        );
        WatchSet::new(&cfg.watch_globs, &cfg.work_directory)
            .context("Invalid watchGlobs")?;
    }

    Ok(())
}
