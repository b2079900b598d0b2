//! Exchange Transaction Engine
//!
//! Point redemption and admin review. Every flow is one sqlx transaction
//! built from conditional statements: the storage layer rejects the losing
//! write, so concurrent redemptions of the last unit of stock, the last
//! points of a balance, or a double review can never both apply.

use crate::db::repository::{exchange, member};
use crate::utils::{AppError, AppResult, SlidingWindowLimiter};
use shared::models::ledger::entry_kind;
use shared::models::{ExchangeOrder, OrderStatus, ReviewDecision};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

/// Coupon namespace that carries a cosmetic card theme entitlement.
pub const THEME_COUPON_PREFIX: &str = "theme:";

/// Outcome of an admin review. A re-reviewed order reports
/// `AlreadyReviewed` and re-applies no side effects.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewOutcome {
    Reviewed(ExchangeOrder),
    AlreadyReviewed,
}

pub struct ExchangeEngine {
    pool: SqlitePool,
    limiter: Arc<SlidingWindowLimiter>,
}

impl ExchangeEngine {
    pub fn new(pool: SqlitePool, limiter: Arc<SlidingWindowLimiter>) -> Self {
        Self { pool, limiter }
    }

    /// Redeem an item for points. Debit, order creation and stock
    /// decrement commit together or not at all.
    pub async fn redeem(&self, member_id: i64, item_id: i64) -> AppResult<ExchangeOrder> {
        if !self.limiter.check(&format!("exchange:{member_id}")) {
            return Err(AppError::RateLimited);
        }

        let mut tx = self.pool.begin().await?;

        let item = exchange::find_item(&mut *tx, item_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Exchange item {item_id}")))?;
        if !item.is_active || item.stock == 0 {
            return Err(AppError::ItemUnavailable);
        }

        let order_id = shared::util::snowflake_id();
        let entry_id = shared::util::snowflake_id();
        let now = shared::util::now_millis();
        let note = format!("order:{order_id}");

        // Debit conditioned on the balance covering the cost, in the same
        // statement that recomputes it.
        let debit = sqlx::query(
            "INSERT INTO ledger_entry (id, member_id, kind, points, note, created_at) \
             SELECT ?1, ?2, ?3, ?4, ?5, ?6 \
             WHERE (SELECT COALESCE(SUM(points), 0) FROM ledger_entry WHERE member_id = ?2) >= ?7",
        )
        .bind(entry_id)
        .bind(member_id)
        .bind(entry_kind::POINT_EXCHANGE)
        .bind(-item.points_cost)
        .bind(&note)
        .bind(now)
        .bind(item.points_cost)
        .execute(&mut *tx)
        .await?;
        if debit.rows_affected() == 0 {
            return Err(AppError::InsufficientBalance);
        }

        sqlx::query(
            "INSERT INTO exchange_order (id, member_id, item_id, points_spent, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(order_id)
        .bind(member_id)
        .bind(item.id)
        .bind(item.points_cost)
        .bind(OrderStatus::Pending)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if item.stock > 0 {
            let decremented = sqlx::query(
                "UPDATE exchange_item SET stock = stock - 1, updated_at = ?1 WHERE id = ?2 AND stock > 0",
            )
            .bind(now)
            .bind(item.id)
            .execute(&mut *tx)
            .await?;
            if decremented.rows_affected() == 0 {
                return Err(AppError::ItemUnavailable);
            }
        }

        tx.commit().await?;

        info!(member_id, item_id, order_id, cost = item.points_cost, "Item redeemed");
        Ok(ExchangeOrder {
            id: order_id,
            member_id,
            item_id: item.id,
            points_spent: item.points_cost,
            status: OrderStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            coupon_code: None,
            created_at: now,
        })
    }

    /// Review a pending order. Approval materializes the coupon; rejection
    /// and cancellation refund the points and restore finite stock, but
    /// only when this call is the one that moved the order out of pending.
    pub async fn review(
        &self,
        order_id: i64,
        reviewer_id: i64,
        decision: ReviewDecision,
    ) -> AppResult<ReviewOutcome> {
        let mut tx = self.pool.begin().await?;

        let order = exchange::find_order(&mut *tx, order_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Exchange order {order_id}")))?;
        if order.status != OrderStatus::Pending {
            return Ok(ReviewOutcome::AlreadyReviewed);
        }

        let item = exchange::find_item(&mut *tx, order.item_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Exchange item {}", order.item_id)))?;
        let now = shared::util::now_millis();

        let (status, coupon) = match decision {
            ReviewDecision::Approved => (OrderStatus::Approved, item.coupon_code.clone()),
            ReviewDecision::Rejected => (OrderStatus::Rejected, None),
            ReviewDecision::Canceled => (OrderStatus::Canceled, None),
        };

        let flipped = sqlx::query(
            "UPDATE exchange_order SET status = ?1, reviewed_by = ?2, reviewed_at = ?3, coupon_code = ?4 WHERE id = ?5 AND status = ?6",
        )
        .bind(status)
        .bind(reviewer_id)
        .bind(now)
        .bind(&coupon)
        .bind(order.id)
        .bind(OrderStatus::Pending)
        .execute(&mut *tx)
        .await?;
        if flipped.rows_affected() == 0 {
            // A concurrent review won between our read and write.
            return Ok(ReviewOutcome::AlreadyReviewed);
        }

        match decision {
            ReviewDecision::Approved => {
                if let Some(theme) = coupon
                    .as_deref()
                    .and_then(|c| c.strip_prefix(THEME_COUPON_PREFIX))
                {
                    member::set_card_theme(&mut *tx, order.member_id, theme).await?;
                }
            }
            ReviewDecision::Rejected | ReviewDecision::Canceled => {
                // Refund; the unique triple doubles as a second guard
                // against double-crediting.
                let entry_id = shared::util::snowflake_id();
                sqlx::query(
                    "INSERT INTO ledger_entry (id, member_id, kind, points, note, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6) ON CONFLICT (member_id, kind, note) DO NOTHING",
                )
                .bind(entry_id)
                .bind(order.member_id)
                .bind(entry_kind::POINT_EXCHANGE_REVERSAL)
                .bind(order.points_spent)
                .bind(format!("order:{}", order.id))
                .bind(now)
                .execute(&mut *tx)
                .await?;

                if item.stock >= 0 {
                    sqlx::query(
                        "UPDATE exchange_item SET stock = stock + 1, updated_at = ?1 WHERE id = ?2 AND stock >= 0",
                    )
                    .bind(now)
                    .bind(item.id)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;

        info!(order_id, reviewer_id, ?decision, "Order reviewed");
        Ok(ReviewOutcome::Reviewed(ExchangeOrder {
            status,
            reviewed_by: Some(reviewer_id),
            reviewed_at: Some(now),
            coupon_code: coupon,
            ..order
        }))
    }
}
