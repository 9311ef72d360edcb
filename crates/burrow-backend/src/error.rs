//! Normalized backend errors
//!
//! Every driver, whatever its native protocol, reports failures through
//! this one taxonomy so the caller can pattern-match instead of inspecting
//! transport-specific messages.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("backend authentication failed: {0}")]
    AuthFailed(String),

    #[error("backend protocol error: {0}")]
    Protocol(String),

    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),

    #[error("no backend registered for kind '{0}'")]
    UnsupportedKind(String),
}

pub type Result<T> = std::result::Result<T, BackendError>;
