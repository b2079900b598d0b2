//! Quest Model

use serde::{Deserialize, Serialize};

/// A points quest. Quest credits are ledger grants deduped per
/// `(quest code, subject)` so auto-completion is replay-safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Quest {
    pub id: i64,
    pub code: String,
    pub title: String,
    pub points: i64,
    pub is_active: bool,
    pub created_at: i64,
}
