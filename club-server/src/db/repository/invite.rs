//! Invite Code Repository
//!
//! The reusable cap is never stored: it is a step function over the
//! inviter's cumulative `use_count` across all their reusable codes,
//! re-evaluated inside the increment statement itself. SQLite serializes
//! writers, so concurrent redemptions near the cap (including the 9 -> 10
//! boundary where the cap itself jumps) are decided one at a time.

use super::{RepoError, RepoResult};
use shared::models::{InviteCode, InviteCodeCreate};
use sqlx::{Executor, Sqlite, SqlitePool};

/// Cumulative successful referrals at which the cap is raised.
pub const CAP_RAISE_THRESHOLD: i64 = 10;
/// Cap before the threshold is reached.
pub const BASE_CAP: i64 = 10;
/// Cap once the inviter has accumulated `CAP_RAISE_THRESHOLD` uses.
pub const RAISED_CAP: i64 = 30;

/// Cap valid for an inviter with the given cumulative reusable use count.
pub fn cap_for_total(total_use_count: i64) -> i64 {
    if total_use_count >= CAP_RAISE_THRESHOLD {
        RAISED_CAP
    } else {
        BASE_CAP
    }
}

const INVITE_SELECT: &str = "SELECT id, code, invited_by, membership_type, reusable, used, use_count, target_name, target_country, target_city, target_lat, target_lng, created_at FROM invite_code";

pub async fn find_by_code(pool: &SqlitePool, code: &str) -> RepoResult<Option<InviteCode>> {
    let sql = format!("{INVITE_SELECT} WHERE code = ?1");
    let row = sqlx::query_as::<_, InviteCode>(&sql)
        .bind(code)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<InviteCode>> {
    let sql = format!("{INVITE_SELECT} WHERE id = ?1");
    let row = sqlx::query_as::<_, InviteCode>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn list_by_inviter(pool: &SqlitePool, invited_by: i64) -> RepoResult<Vec<InviteCode>> {
    let sql = format!("{INVITE_SELECT} WHERE invited_by = ?1 ORDER BY created_at DESC");
    let rows = sqlx::query_as::<_, InviteCode>(&sql)
        .bind(invited_by)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn create(
    pool: &SqlitePool,
    data: InviteCodeCreate,
    code: &str,
) -> RepoResult<InviteCode> {
    let id = shared::util::snowflake_id();
    let now = shared::util::now_millis();
    sqlx::query(
        "INSERT INTO invite_code (id, code, invited_by, membership_type, reusable, used, use_count, target_name, target_country, target_city, target_lat, target_lng, created_at) VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?6, ?7, ?8, ?9, ?10, ?11)",
    )
    .bind(id)
    .bind(code)
    .bind(data.invited_by)
    .bind(&data.membership_type)
    .bind(data.reusable)
    .bind(&data.target_name)
    .bind(&data.target_country)
    .bind(&data.target_city)
    .bind(data.target_lat)
    .bind(data.target_lng)
    .bind(now)
    .execute(pool)
    .await?;
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create invite code".into()))
}

/// Cumulative `use_count` across all of an inviter's reusable codes.
pub async fn total_reusable_use_count<'e, E>(db: E, invited_by: i64) -> RepoResult<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sum: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(use_count), 0) FROM invite_code WHERE invited_by = ?1 AND reusable = 1",
    )
    .bind(invited_by)
    .fetch_one(db)
    .await?;
    Ok(sum)
}

/// Flip a single-use code to used, conditioned on it being unused. A
/// `false` return means a concurrent redemption won the race (or the code
/// was consumed earlier); the caller reports it as already used.
pub async fn mark_used<'e, E>(db: E, id: i64) -> RepoResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "UPDATE invite_code SET used = 1 WHERE id = ?1 AND reusable = 0 AND used = 0",
    )
    .bind(id)
    .execute(db)
    .await?;
    Ok(rows.rows_affected() > 0)
}

/// Increment a reusable code's counter, conditioned on the inviter's live
/// cap check holding at commit time. The aggregate and the cap are both
/// recomputed inside the statement, so two racing redemptions can never
/// both pass a stale check.
pub async fn increment_use_count<'e, E>(db: E, id: i64, invited_by: i64) -> RepoResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "UPDATE invite_code SET use_count = use_count + 1 \
         WHERE id = ?1 AND reusable = 1 \
           AND (SELECT COALESCE(SUM(use_count), 0) FROM invite_code WHERE invited_by = ?2 AND reusable = 1) \
               < (CASE WHEN (SELECT COALESCE(SUM(use_count), 0) FROM invite_code WHERE invited_by = ?2 AND reusable = 1) >= ?3 THEN ?4 ELSE ?5 END)",
    )
    .bind(id)
    .bind(invited_by)
    .bind(CAP_RAISE_THRESHOLD)
    .bind(RAISED_CAP)
    .bind(BASE_CAP)
    .execute(db)
    .await?;
    Ok(rows.rows_affected() > 0)
}
