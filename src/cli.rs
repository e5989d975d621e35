// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `codebench`.
///
/// Anything given here overrides the corresponding value from the config
/// file; anything omitted falls back to the file, then to built-in defaults.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "codebench",
    version,
    about = "Compilation and interactive execution backend for the playground.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Codebench.toml` in the current working directory. A missing
    /// file is not an error; built-in defaults apply.
    #[arg(long, value_name = "PATH", default_value = "Codebench.toml")]
    pub config: String,

    /// Address to bind the HTTP/WebSocket server to (e.g. 127.0.0.1:9900).
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Workspace directory holding user-editable files and generated source.
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<String>,

    /// Path to the external language compiler executable.
    #[arg(long, value_name = "PATH")]
    pub compiler: Option<String>,

    /// Path to the secondary toolchain used to build generated source.
    #[arg(long, value_name = "PATH")]
    pub toolchain: Option<String>,

    /// Upper bound, in seconds, on one external compiler invocation.
    #[arg(long, value_name = "SECS")]
    pub compile_timeout: Option<u64>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CODEBENCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
