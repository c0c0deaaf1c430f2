//! Errors surfaced by the session registry

use thiserror::Error;

use crate::timer::ConfigError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session '{0}' not found")]
    NotFound(String),

    #[error("session '{0}' already exists")]
    AlreadyExists(String),

    #[error("invalid timer configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("session '{0}' is no longer running")]
    Closed(String),

    #[error("failed to lock session registry: {0}")]
    Lock(String),
}
