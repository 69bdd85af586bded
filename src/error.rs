// src/error.rs
// Top-level error for the command-line front end

use crate::config::ConfigError;
use crate::segments::TableError;
use crate::session::SessionError;
use thiserror::Error;

/// Anything that ends a CLI invocation with a non-zero exit code
#[derive(Debug, Error)]
pub enum DeskError {
    #[error("Logging init failed: {0}")]
    LoggingInit(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("{0}")]
    Usage(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Table(#[from] TableError),
}
