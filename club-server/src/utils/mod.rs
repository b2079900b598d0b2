//! Utility module - common helpers and types
//!
//! - [`AppError`] / [`AppResult`] - application error surface
//! - [`SlidingWindowLimiter`] - per-key sliding-window rate limiting
//! - logger bootstrap

pub mod error;
pub mod logger;
pub mod rate_limit;

pub use error::{AppError, AppResult};
pub use rate_limit::{RateLimitConfig, SlidingWindowLimiter};
