//! Point Ledger Model

use serde::{Deserialize, Serialize};

/// Ledger entry kinds.
///
/// The `(member_id, kind, note)` triple is unique in storage; grant kinds
/// rely on it for idempotency, exchange kinds embed the order id in the
/// note so they satisfy the same index.
pub mod entry_kind {
    pub const WELCOME_BONUS: &str = "Welcome Bonus";
    pub const INVITE_BONUS: &str = "Invite Bonus";
    pub const SUBSCRIPTION_BONUS: &str = "Subscription Bonus";
    pub const RENEWAL_BONUS: &str = "Renewal Bonus";
    pub const LOGIN_BONUS: &str = "Login Bonus";
    pub const LOGIN_STREAK_BONUS: &str = "Login Streak Bonus";
    pub const QUEST_BONUS: &str = "Quest Bonus";
    pub const POINT_EXCHANGE: &str = "Point Exchange";
    pub const POINT_EXCHANGE_REVERSAL: &str = "Point Exchange Reversal";
}

/// Append-only signed point record attributable to one member and one cause.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct LedgerEntry {
    pub id: i64,
    pub member_id: i64,
    /// Free-text category, see [`entry_kind`].
    pub kind: String,
    /// Signed point delta.
    pub points: i64,
    /// Doubles as the dedupe discriminator.
    pub note: String,
    pub created_at: i64,
}
