// src/config/validate.rs

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::model::{resolve_shell, Config, RawConfig};
use crate::errors::{CodebenchError, Result};

impl TryFrom<RawConfig> for Config {
    type Error = CodebenchError;

    fn try_from(raw: RawConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;

        let bind: SocketAddr = raw.server.bind.parse().map_err(|e| {
            CodebenchError::Config(format!(
                "invalid [server].bind address '{}': {e}",
                raw.server.bind
            ))
        })?;

        Ok(Config::new_unchecked(
            bind,
            PathBuf::from(raw.workspace.dir),
            PathBuf::from(raw.workspace.scratch_dir),
            PathBuf::from(raw.tools.compiler),
            PathBuf::from(raw.tools.toolchain),
            resolve_shell(&raw.tools.shell),
            Duration::from_secs(raw.limits.compile_timeout_secs),
        ))
    }
}

fn validate_raw_config(raw: &RawConfig) -> Result<()> {
    if raw.workspace.dir.trim().is_empty() {
        return Err(CodebenchError::Config(
            "[workspace].dir must not be empty".to_string(),
        ));
    }

    if raw.workspace.scratch_dir.trim().is_empty() {
        return Err(CodebenchError::Config(
            "[workspace].scratch_dir must not be empty".to_string(),
        ));
    }

    if raw.workspace.scratch_dir == raw.workspace.dir {
        return Err(CodebenchError::Config(
            "[workspace].scratch_dir must differ from [workspace].dir \
             (scratch churn would be broadcast as workspace changes)"
                .to_string(),
        ));
    }

    if raw.tools.compiler.trim().is_empty() {
        return Err(CodebenchError::Config(
            "[tools].compiler must not be empty".to_string(),
        ));
    }

    if raw.tools.toolchain.trim().is_empty() {
        return Err(CodebenchError::Config(
            "[tools].toolchain must not be empty".to_string(),
        ));
    }

    if raw.limits.compile_timeout_secs == 0 {
        return Err(CodebenchError::Config(
            "[limits].compile_timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}
