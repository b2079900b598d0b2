//! Login Streak Engine
//!
//! Daily login bonuses with 7-day and 30-day streak rewards. The daily
//! grant is the idempotency anchor: its note is the claim date, so a day
//! can be claimed once no matter how often the endpoint is hit.

use crate::db::repository::ledger;
use crate::utils::{AppError, AppResult, SlidingWindowLimiter};
use chrono::NaiveDate;
use shared::models::ledger::entry_kind;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

pub const DAILY_LOGIN_POINTS: i64 = 10;
pub const WEEKLY_STREAK_POINTS: i64 = 50;
pub const MONTHLY_STREAK_POINTS: i64 = 150;

/// Outcome of a daily claim. `AlreadyClaimed` is a benign no-op, not an
/// error: resubmitting the claim form must be safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Granted {
        /// Consecutive-day streak including today.
        streak: u32,
        /// Total points granted by this call (daily + any streak bonuses).
        points: i64,
    },
    AlreadyClaimed,
}

pub struct StreakEngine {
    pool: SqlitePool,
    limiter: Arc<SlidingWindowLimiter>,
}

impl StreakEngine {
    pub fn new(pool: SqlitePool, limiter: Arc<SlidingWindowLimiter>) -> Self {
        Self { pool, limiter }
    }

    /// Claim the login bonus for `today`.
    pub async fn claim_daily(&self, member_id: i64, today: NaiveDate) -> AppResult<ClaimOutcome> {
        if !self.limiter.check(&format!("login:{member_id}")) {
            return Err(AppError::RateLimited);
        }

        let member = crate::db::repository::member::find_by_id(&self.pool, member_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Member {member_id}")))?;

        let note = today.to_string();
        let granted = ledger::grant_once(
            &self.pool,
            member.id,
            entry_kind::LOGIN_BONUS,
            DAILY_LOGIN_POINTS,
            &note,
        )
        .await?;
        if !granted {
            return Ok(ClaimOutcome::AlreadyClaimed);
        }

        let dates: Vec<NaiveDate> = ledger::login_dates(&self.pool, member.id)
            .await?
            .iter()
            .filter_map(|note| note.parse().ok())
            .collect();
        let streak = streak_length(&dates, today);
        let mut points = DAILY_LOGIN_POINTS;

        // Day 210 is a multiple of both; both bonuses fire in one call.
        if streak > 0 && streak % 7 == 0 {
            let granted = ledger::grant_once(
                &self.pool,
                member.id,
                entry_kind::LOGIN_STREAK_BONUS,
                WEEKLY_STREAK_POINTS,
                &format!("7-day:{today}"),
            )
            .await?;
            if granted {
                points += WEEKLY_STREAK_POINTS;
            }
        }
        if streak > 0 && streak % 30 == 0 {
            let granted = ledger::grant_once(
                &self.pool,
                member.id,
                entry_kind::LOGIN_STREAK_BONUS,
                MONTHLY_STREAK_POINTS,
                &format!("30-day:{today}"),
            )
            .await?;
            if granted {
                points += MONTHLY_STREAK_POINTS;
            }
        }

        info!(member_id = member.id, streak, points, "Login bonus claimed");
        Ok(ClaimOutcome::Granted { streak, points })
    }
}

/// Length of the consecutive-day run ending at `today`.
///
/// `dates` are the member's distinct claim dates in any order; days after
/// `today` are ignored.
pub fn streak_length(dates: &[NaiveDate], today: NaiveDate) -> u32 {
    let mut sorted: Vec<NaiveDate> = dates.iter().copied().filter(|d| *d <= today).collect();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    sorted.dedup();

    let mut expected = today;
    let mut streak = 0;
    for date in sorted {
        if date != expected {
            break;
        }
        streak += 1;
        match expected.pred_opt() {
            Some(prev) => expected = prev,
            None => break,
        }
    }
    streak
}
