//! Configuration module.
//!
//! This module wires together the launch configuration model and the loading/validation
//! helpers. Import from here for a convenient, stable API.
//!
//! Example:
//! ```no_run
//! use vertx_run::config::{LaunchConfig, load_from_path};
//!
//! # fn demo() -> anyhow::Result<()> {
//! let cfg: LaunchConfig = load_from_path("vertx.json")?;
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod models;

// Re-export core data models
pub use models::{DEFAULT_LAUNCHER, LaunchConfig, Launcher};

// Re-export loader utilities
pub use loader::{
    generate_schema, load_from_path, load_from_path_async, load_from_reader, load_from_str,
    validate_config, write_schema_to_writer,
};
