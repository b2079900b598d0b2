//! Repository Module
//!
//! CRUD and conditional-write operations over the SQLite tables. Every
//! state transition is a single conditional statement (or one transaction)
//! checked via `rows_affected()`; nothing here does read-then-write.

// Membership
pub mod ledger;
pub mod member;

// Invites
pub mod invite;

// Exchange
pub mod exchange;

// Quests
pub mod quest;

use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err
            && db_err.is_unique_violation()
        {
            return RepoError::Duplicate(db_err.to_string());
        }
        RepoError::Database(err.to_string())
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;
