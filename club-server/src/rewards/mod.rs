//! Rewards Module
//!
//! Rank derivation and login streak bonuses.

pub mod rank;
pub mod streak;

pub use rank::{Rank, next_rank, points_to_next, rank_for};
pub use streak::{ClaimOutcome, StreakEngine};

use crate::db::repository::{ledger, member};
use crate::utils::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Point totals and rank progress for one member, derived from the ledger
/// on every call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSummary {
    pub member_id: i64,
    pub balance: i64,
    pub status_points: i64,
    pub rank: Rank,
    pub next_rank: Option<Rank>,
    pub points_to_next: Option<i64>,
}

pub async fn member_summary(pool: &SqlitePool, member_id: i64) -> AppResult<MemberSummary> {
    let member = member::find_by_id(pool, member_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Member {member_id}")))?;

    let balance = ledger::balance_of(pool, member.id).await?;
    let status_points = ledger::status_points_of(pool, member.id).await?;
    let rank = rank_for(status_points);

    Ok(MemberSummary {
        member_id: member.id,
        balance,
        status_points,
        rank,
        next_rank: next_rank(rank),
        points_to_next: points_to_next(status_points),
    })
}
