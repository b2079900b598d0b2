//! Member Model

use serde::{Deserialize, Serialize};

/// Subscription state driven by the payment provider reconciler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
pub enum SubscriptionStatus {
    Inactive,
    Active,
    PastDue,
    Canceled,
    Free,
    FreeTier,
}

/// Membership state, mutated by the reconciler or explicit admin action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
pub enum MembershipStatus {
    Inactive,
    Active,
    Suspended,
}

/// Member entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Member {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Issued exactly once, on first paid activation.
    pub membership_number: Option<String>,
    pub membership_type: String,
    pub subscription_status: SubscriptionStatus,
    pub membership_status: MembershipStatus,
    /// Weak reference to the inviting member.
    pub invited_by: Option<i64>,
    /// Payment-provider customer id, bound at checkout.
    pub billing_customer_id: Option<String>,
    /// Cosmetic card theme owned via exchange redemption.
    pub card_theme: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create member payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberCreate {
    pub name: String,
    pub email: String,
    pub membership_type: String,
    pub subscription_status: SubscriptionStatus,
    pub membership_status: MembershipStatus,
    pub invited_by: Option<i64>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}
