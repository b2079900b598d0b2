//! Invite Code Model

use serde::{Deserialize, Serialize};

/// Invite code entity.
///
/// Single-use codes flip `used` exactly once; reusable codes count
/// redemptions in `use_count` against a cap computed at redemption time
/// from the inviter's cumulative counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct InviteCode {
    pub id: i64,
    pub code: String,
    pub invited_by: i64,
    pub membership_type: String,
    pub reusable: bool,
    /// Single-use only; terminal once set.
    pub used: bool,
    /// Reusable only; monotonically increasing.
    pub use_count: i64,
    pub target_name: Option<String>,
    pub target_country: Option<String>,
    pub target_city: Option<String>,
    pub target_lat: Option<f64>,
    pub target_lng: Option<f64>,
    pub created_at: i64,
}

/// Create invite payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteCodeCreate {
    pub invited_by: i64,
    pub membership_type: String,
    pub reusable: bool,
    pub target_name: Option<String>,
    pub target_country: Option<String>,
    pub target_city: Option<String>,
    pub target_lat: Option<f64>,
    pub target_lng: Option<f64>,
}
