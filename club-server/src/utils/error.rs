//! Unified error handling
//!
//! [`AppError`] is the application-level error surface of the engine crate.
//! The HTTP routing layer lives outside this repo; [`AppError::status_code`]
//! carries the status it should map each variant to.
//!
//! Idempotent no-op outcomes (an already-claimed bonus, an already-reviewed
//! order) are NOT errors — they are encoded in the success types of the
//! engines that produce them.

use crate::db::repository::RepoError;

/// Application error enum
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== Business rejections (4xx) ==========
    #[error("Insufficient point balance")]
    InsufficientBalance,

    #[error("Item is unavailable")]
    ItemUnavailable,

    #[error("Invite capacity reached")]
    InviteCapReached,

    #[error("Invite code already used")]
    InviteAlreadyUsed,

    #[error("Invalid or expired invite code")]
    InvalidInvite,

    #[error("Too many requests")]
    RateLimited,

    #[error("Invalid event signature")]
    SignatureInvalid,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    // ========== System errors (5xx) ==========
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status the (external) routing layer maps this error to.
    ///
    /// 5xx variants signal the caller to retry the whole operation; the
    /// payment provider re-delivers its event on anything non-2xx.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::InsufficientBalance
            | AppError::ItemUnavailable
            | AppError::InviteCapReached
            | AppError::Validation(_) => 400,
            AppError::SignatureInvalid => 401,
            AppError::InvalidInvite | AppError::NotFound(_) => 404,
            AppError::InviteAlreadyUsed | AppError::Conflict(_) => 409,
            AppError::RateLimited => 429,
            AppError::Database(_) | AppError::Internal(_) => 500,
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        AppError::Database(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => AppError::NotFound(msg),
            RepoError::Duplicate(msg) => AppError::Conflict(msg),
            RepoError::Validation(msg) => AppError::Validation(msg),
            RepoError::Database(msg) => AppError::Database(msg),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Result type for application operations
pub type AppResult<T> = Result<T, AppError>;
