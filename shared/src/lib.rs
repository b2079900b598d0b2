//! Shared data models and utilities for the club workspace.
//!
//! The `db` feature gates the sqlx derives so non-server consumers can use
//! the models without pulling in a database driver.

pub mod models;
pub mod util;
