// src/config/model.rs

//! Configuration types for `codebench`.
//!
//! `RawConfig` is what `toml` deserializes directly; `Config` is the
//! validated form the rest of the application uses. Conversion happens via
//! `TryFrom` in [`crate::config::validate`].

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Raw, unvalidated configuration as read from `Codebench.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub workspace: WorkspaceSection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub limits: LimitsSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Address the HTTP/WebSocket server binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceSection {
    /// Directory holding user-editable files plus the generated source.
    #[serde(default = "default_workspace_dir")]
    pub dir: String,

    /// Root under which per-request scratch directories are created.
    ///
    /// Kept outside the workspace so scratch churn does not show up as
    /// workspace change notifications.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,
}

impl Default for WorkspaceSection {
    fn default() -> Self {
        Self {
            dir: default_workspace_dir(),
            scratch_dir: default_scratch_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsSection {
    /// External language compiler, invoked as `<compiler> <input> <outdir>`.
    #[serde(default = "default_compiler")]
    pub compiler: String,

    /// Secondary toolchain, invoked as `<toolchain> <source> -o <binary>`.
    #[serde(default = "default_toolchain")]
    pub toolchain: String,

    /// Interactive shell for the shared terminal session.
    ///
    /// Empty means: use `$SHELL`, falling back to a platform default.
    #[serde(default)]
    pub shell: String,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            compiler: default_compiler(),
            toolchain: default_toolchain(),
            shell: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsSection {
    /// Upper bound on one external compiler invocation, in seconds.
    #[serde(default = "default_compile_timeout_secs")]
    pub compile_timeout_secs: u64,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            compile_timeout_secs: default_compile_timeout_secs(),
        }
    }
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub workspace: PathBuf,
    pub scratch_root: PathBuf,
    pub compiler: PathBuf,
    pub toolchain: PathBuf,
    pub shell: String,
    pub compile_timeout: Duration,
}

impl Config {
    /// Construct without re-validating. Only `validate` should call this.
    pub(crate) fn new_unchecked(
        bind: SocketAddr,
        workspace: PathBuf,
        scratch_root: PathBuf,
        compiler: PathBuf,
        toolchain: PathBuf,
        shell: String,
        compile_timeout: Duration,
    ) -> Self {
        Self {
            bind,
            workspace,
            scratch_root,
            compiler,
            toolchain,
            shell,
            compile_timeout,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:9900".to_string()
}

fn default_workspace_dir() -> String {
    "workspace".to_string()
}

fn default_scratch_dir() -> String {
    ".codebench-scratch".to_string()
}

fn default_compiler() -> String {
    "./compiler/compiler".to_string()
}

fn default_toolchain() -> String {
    "cc".to_string()
}

fn default_compile_timeout_secs() -> u64 {
    30
}

/// Resolve the shell to use for the shared terminal session.
pub fn resolve_shell(configured: &str) -> String {
    if !configured.is_empty() {
        return configured.to_string();
    }
    if cfg!(windows) {
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    } else {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string())
    }
}
