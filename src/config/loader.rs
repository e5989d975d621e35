// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::cli::CliArgs;
use crate::config::model::{Config, RawConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw
/// `RawConfig`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load configuration and run validation, applying CLI overrides on top.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML if the file exists; a missing file means built-in defaults.
/// - Applies CLI flags over file values.
/// - Checks bind address syntax, timeout sanity, tool paths.
pub fn load_and_validate(args: &CliArgs) -> Result<Config> {
    let path = Path::new(&args.config);

    let mut raw = if path.exists() {
        load_from_path(path)?
    } else {
        debug!(config = %args.config, "config file not found; using defaults");
        RawConfig::default()
    };

    apply_cli_overrides(&mut raw, args);

    Config::try_from(raw)
}

fn apply_cli_overrides(raw: &mut RawConfig, args: &CliArgs) {
    if let Some(ref bind) = args.bind {
        raw.server.bind = bind.clone();
    }
    if let Some(ref dir) = args.workspace {
        raw.workspace.dir = dir.clone();
    }
    if let Some(ref compiler) = args.compiler {
        raw.tools.compiler = compiler.clone();
    }
    if let Some(ref toolchain) = args.toolchain {
        raw.tools.toolchain = toolchain.clone();
    }
    if let Some(secs) = args.compile_timeout {
        raw.limits.compile_timeout_secs = secs;
    }
}
