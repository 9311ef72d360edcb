//! Engine errors
//!
//! The engine wraps the component taxonomies rather than flattening them:
//! callers match on the component kind first, then the specific failure.

use burrow_backend::BackendError;
use burrow_cloudflared::{CloudflaredError, CompileError};
use burrow_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected before any external side effect
    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] DbError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Daemon(#[from] CloudflaredError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("config write failed: {0}")]
    ConfigWrite(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
