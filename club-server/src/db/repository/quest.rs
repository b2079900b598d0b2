//! Quest Repository

use super::{RepoError, RepoResult};
use shared::models::Quest;
use sqlx::SqlitePool;

const QUEST_SELECT: &str = "SELECT id, code, title, points, is_active, created_at FROM quest";

pub async fn find_active_by_code(pool: &SqlitePool, code: &str) -> RepoResult<Option<Quest>> {
    let sql = format!("{QUEST_SELECT} WHERE code = ?1 AND is_active = 1");
    let row = sqlx::query_as::<_, Quest>(&sql)
        .bind(code)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn list_active(pool: &SqlitePool) -> RepoResult<Vec<Quest>> {
    let sql = format!("{QUEST_SELECT} WHERE is_active = 1 ORDER BY created_at ASC");
    let rows = sqlx::query_as::<_, Quest>(&sql).fetch_all(pool).await?;
    Ok(rows)
}

pub async fn create(pool: &SqlitePool, code: &str, title: &str, points: i64) -> RepoResult<Quest> {
    let id = shared::util::snowflake_id();
    let now = shared::util::now_millis();
    sqlx::query(
        "INSERT INTO quest (id, code, title, points, is_active, created_at) VALUES (?1, ?2, ?3, ?4, 1, ?5)",
    )
    .bind(id)
    .bind(code)
    .bind(title)
    .bind(points)
    .bind(now)
    .execute(pool)
    .await?;
    find_active_by_code(pool, code)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create quest".into()))
}

pub async fn set_active(pool: &SqlitePool, id: i64, is_active: bool) -> RepoResult<()> {
    let rows = sqlx::query("UPDATE quest SET is_active = ?1 WHERE id = ?2")
        .bind(is_active)
        .bind(id)
        .execute(pool)
        .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Quest {id} not found")));
    }
    Ok(())
}
