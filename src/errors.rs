// src/errors.rs

//! Crate-wide error type and helpers.

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CodebenchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Observer {0} already has an active run")]
    Busy(Uuid),

    #[error("Terminal session is {0:?}")]
    TerminalUnavailable(crate::term::BrokerState),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, CodebenchError>;
