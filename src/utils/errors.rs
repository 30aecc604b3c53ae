//! Custom error types for the agent.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transfer error: {0}")]
    Transfer(#[from] reqwest::Error),

    #[error("Transfer error: HTTP {status} fetching {url}")]
    HttpStatus {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("Signature tool failed to run: {0}")]
    SignatureTool(String),

    #[error("Missing generation slot: {}", .0.display())]
    MissingSlot(PathBuf),
}

pub type Result<T> = std::result::Result<T, AgentError>;
