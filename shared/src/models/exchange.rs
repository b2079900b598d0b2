//! Point Exchange Models

use serde::{Deserialize, Serialize};

/// Exchange order lifecycle. Terminal once non-pending.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
pub enum OrderStatus {
    Pending,
    Approved,
    Rejected,
    Canceled,
}

/// Admin review decision for a pending order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
    Canceled,
}

/// Redeemable catalog item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct ExchangeItem {
    pub id: i64,
    pub name: String,
    pub points_cost: i64,
    /// -1 = unlimited, else >= 0.
    pub stock: i64,
    pub coupon_code: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create item payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeItemCreate {
    pub name: String,
    pub points_cost: i64,
    pub stock: i64,
    pub coupon_code: Option<String>,
}

/// Update item payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeItemUpdate {
    pub name: Option<String>,
    pub points_cost: Option<i64>,
    pub stock: Option<i64>,
    pub coupon_code: Option<String>,
    pub is_active: Option<bool>,
}

/// Exchange order entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct ExchangeOrder {
    pub id: i64,
    pub member_id: i64,
    pub item_id: i64,
    pub points_spent: i64,
    pub status: OrderStatus,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<i64>,
    /// Copied from the item at approval time.
    pub coupon_code: Option<String>,
    pub created_at: i64,
}
