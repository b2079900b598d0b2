//! Point Ledger Repository
//!
//! Append-only. Balances are recomputed by summation on every read; there
//! is no cached counter to invalidate. Corrections are new offsetting
//! entries, never updates.

use super::RepoResult;
use shared::models::LedgerEntry;
use shared::models::ledger::entry_kind;
use sqlx::{Executor, Sqlite, SqlitePool};

/// Insert a grant unless the `(member_id, kind, note)` triple already
/// exists. Returns whether the entry was inserted.
///
/// The check-and-insert is one statement; concurrent duplicate calls are
/// serialized by the storage layer and at most one wins. A `false` return
/// is success for at-least-once callers (webhook retries, resubmitted
/// forms), not an error.
pub async fn grant_once<'e, E>(
    db: E,
    member_id: i64,
    kind: &str,
    points: i64,
    note: &str,
) -> RepoResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let id = shared::util::snowflake_id();
    let now = shared::util::now_millis();
    let result = sqlx::query(
        "INSERT INTO ledger_entry (id, member_id, kind, points, note, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6) ON CONFLICT (member_id, kind, note) DO NOTHING",
    )
    .bind(id)
    .bind(member_id)
    .bind(kind)
    .bind(points)
    .bind(note)
    .bind(now)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Spendable balance: sum over all entries.
pub async fn balance_of<'e, E>(db: E, member_id: i64) -> RepoResult<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sum: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(points), 0) FROM ledger_entry WHERE member_id = ?1",
    )
    .bind(member_id)
    .fetch_one(db)
    .await?;
    Ok(sum)
}

/// Status points: sum excluding exchange debits and their reversals.
/// Drives rank derivation.
pub async fn status_points_of<'e, E>(db: E, member_id: i64) -> RepoResult<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sum: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(points), 0) FROM ledger_entry WHERE member_id = ?1 AND kind NOT IN (?2, ?3)",
    )
    .bind(member_id)
    .bind(entry_kind::POINT_EXCHANGE)
    .bind(entry_kind::POINT_EXCHANGE_REVERSAL)
    .fetch_one(db)
    .await?;
    Ok(sum)
}

/// Ledger history, newest first.
pub async fn find_by_member(
    pool: &SqlitePool,
    member_id: i64,
    limit: i64,
    offset: i64,
) -> RepoResult<Vec<LedgerEntry>> {
    let rows = sqlx::query_as::<_, LedgerEntry>(
        "SELECT id, member_id, kind, points, note, created_at FROM ledger_entry WHERE member_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
    )
    .bind(member_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Distinct login-bonus dates (ISO notes), newest first. Input to the
/// streak walk.
pub async fn login_dates(pool: &SqlitePool, member_id: i64) -> RepoResult<Vec<String>> {
    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT note FROM ledger_entry WHERE member_id = ?1 AND kind = ?2 ORDER BY note DESC",
    )
    .bind(member_id)
    .bind(entry_kind::LOGIN_BONUS)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
