//! Exchange Catalog & Order Repository
//!
//! Item CRUD and order lookups. The redeem/review transactions live in the
//! exchange engine, which composes its conditional statements inside one
//! sqlx transaction.

use super::{RepoError, RepoResult};
use shared::models::{ExchangeItem, ExchangeItemCreate, ExchangeItemUpdate, ExchangeOrder, OrderStatus};
use sqlx::{Executor, Sqlite, SqlitePool};

const ITEM_SELECT: &str = "SELECT id, name, points_cost, stock, coupon_code, is_active, created_at, updated_at FROM exchange_item";

const ORDER_SELECT: &str = "SELECT id, member_id, item_id, points_spent, status, reviewed_by, reviewed_at, coupon_code, created_at FROM exchange_order";

pub async fn find_item<'e, E>(db: E, id: i64) -> RepoResult<Option<ExchangeItem>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{ITEM_SELECT} WHERE id = ?1");
    let row = sqlx::query_as::<_, ExchangeItem>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn list_active_items(pool: &SqlitePool) -> RepoResult<Vec<ExchangeItem>> {
    let sql = format!("{ITEM_SELECT} WHERE is_active = 1 ORDER BY points_cost ASC");
    let rows = sqlx::query_as::<_, ExchangeItem>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn create_item(pool: &SqlitePool, data: ExchangeItemCreate) -> RepoResult<ExchangeItem> {
    if data.stock < -1 {
        return Err(RepoError::Validation(format!(
            "Invalid stock {}: use -1 for unlimited or a non-negative count",
            data.stock
        )));
    }
    let id = shared::util::snowflake_id();
    let now = shared::util::now_millis();
    sqlx::query(
        "INSERT INTO exchange_item (id, name, points_cost, stock, coupon_code, is_active, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
    )
    .bind(id)
    .bind(&data.name)
    .bind(data.points_cost)
    .bind(data.stock)
    .bind(&data.coupon_code)
    .bind(now)
    .execute(pool)
    .await?;
    find_item(pool, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create exchange item".into()))
}

pub async fn update_item(
    pool: &SqlitePool,
    id: i64,
    data: ExchangeItemUpdate,
) -> RepoResult<ExchangeItem> {
    let now = shared::util::now_millis();
    let rows = sqlx::query(
        "UPDATE exchange_item SET name = COALESCE(?1, name), points_cost = COALESCE(?2, points_cost), stock = COALESCE(?3, stock), coupon_code = COALESCE(?4, coupon_code), is_active = COALESCE(?5, is_active), updated_at = ?6 WHERE id = ?7",
    )
    .bind(&data.name)
    .bind(data.points_cost)
    .bind(data.stock)
    .bind(&data.coupon_code)
    .bind(data.is_active)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Exchange item {id} not found")));
    }
    find_item(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Exchange item {id} not found")))
}

pub async fn find_order<'e, E>(db: E, id: i64) -> RepoResult<Option<ExchangeOrder>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{ORDER_SELECT} WHERE id = ?1");
    let row = sqlx::query_as::<_, ExchangeOrder>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn list_orders_by_member(
    pool: &SqlitePool,
    member_id: i64,
) -> RepoResult<Vec<ExchangeOrder>> {
    let sql = format!("{ORDER_SELECT} WHERE member_id = ?1 ORDER BY created_at DESC");
    let rows = sqlx::query_as::<_, ExchangeOrder>(&sql)
        .bind(member_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Pending orders awaiting admin review, oldest first.
pub async fn list_pending_orders(pool: &SqlitePool) -> RepoResult<Vec<ExchangeOrder>> {
    let sql = format!("{ORDER_SELECT} WHERE status = ?1 ORDER BY created_at ASC");
    let rows = sqlx::query_as::<_, ExchangeOrder>(&sql)
        .bind(OrderStatus::Pending)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn item_crud_roundtrip() {
        let pool = test_pool().await;
        let item = create_item(
            &pool,
            ExchangeItemCreate {
                name: "Coffee voucher".into(),
                points_cost: 50,
                stock: 3,
                coupon_code: Some("CAFE-50".into()),
            },
        )
        .await
        .unwrap();
        assert!(item.is_active);
        assert_eq!(item.stock, 3);

        let updated = update_item(
            &pool,
            item.id,
            ExchangeItemUpdate {
                name: None,
                points_cost: Some(60),
                stock: None,
                coupon_code: None,
                is_active: Some(false),
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.points_cost, 60);
        assert!(!updated.is_active);
        assert_eq!(updated.name, "Coffee voucher");

        assert!(list_active_items(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn negative_stock_is_rejected() {
        let pool = test_pool().await;
        let err = create_item(
            &pool,
            ExchangeItemCreate {
                name: "Broken".into(),
                points_cost: 10,
                stock: -2,
                coupon_code: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
    }
}
