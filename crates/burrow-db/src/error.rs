//! Typed store errors
//!
//! Every store operation reports one of these kinds; callers pattern-match on
//! the kind rather than inspecting message text.

use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// A uniqueness invariant would be violated
    #[error("{entity} with this {constraint} already exists")]
    DuplicateKey {
        entity: &'static str,
        constraint: &'static str,
    },

    /// The referenced row does not exist
    #[error("{entity} not found: {key}")]
    NotFound {
        entity: &'static str,
        key: String,
    },

    /// A referential or immutability invariant would be violated
    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl DbError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        DbError::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
