//! Daemon invocation errors

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CloudflaredError {
    /// The binary is not resolvable. An environment defect: fatal, never
    /// retried.
    #[error("cloudflared is not installed or not on PATH")]
    NotInstalled,

    /// The daemon exited non-zero; its diagnostic is in `stderr`
    #[error("cloudflared command failed: {stderr}")]
    CommandFailed { stderr: String },

    #[error("cloudflared command timed out after {0:?}")]
    Timeout(Duration),

    /// The daemon produced output we cannot interpret
    #[error("unexpected cloudflared output: {0}")]
    Protocol(String),

    #[error("cloudflared I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CloudflaredError>;
