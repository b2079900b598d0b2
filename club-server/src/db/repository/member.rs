//! Member Repository

use super::{RepoError, RepoResult};
use shared::models::{Member, MemberCreate, MembershipStatus, SubscriptionStatus};
use sqlx::{Executor, Sqlite, SqlitePool};

const MEMBER_SELECT: &str = "SELECT id, name, email, membership_number, membership_type, subscription_status, membership_status, invited_by, billing_customer_id, card_theme, country, city, lat, lng, created_at, updated_at FROM member";

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<Member>> {
    let sql = format!("{MEMBER_SELECT} WHERE id = ?1");
    let row = sqlx::query_as::<_, Member>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> RepoResult<Option<Member>> {
    let sql = format!("{MEMBER_SELECT} WHERE email = ?1");
    let row = sqlx::query_as::<_, Member>(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Look up a member by the payment-provider customer id bound at checkout.
pub async fn find_by_customer(
    pool: &SqlitePool,
    customer_id: &str,
) -> RepoResult<Option<Member>> {
    let sql = format!("{MEMBER_SELECT} WHERE billing_customer_id = ?1");
    let row = sqlx::query_as::<_, Member>(&sql)
        .bind(customer_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Insert a member row with a caller-chosen id. Used inside the invite
/// redemption transaction; duplicate emails surface as `Duplicate`.
pub async fn insert<'e, E>(db: E, id: i64, data: &MemberCreate, now: i64) -> RepoResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO member (id, name, email, membership_type, subscription_status, membership_status, invited_by, country, city, lat, lng, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
    )
    .bind(id)
    .bind(&data.name)
    .bind(&data.email)
    .bind(&data.membership_type)
    .bind(data.subscription_status)
    .bind(data.membership_status)
    .bind(data.invited_by)
    .bind(&data.country)
    .bind(&data.city)
    .bind(data.lat)
    .bind(data.lng)
    .bind(now)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn create(pool: &SqlitePool, data: MemberCreate) -> RepoResult<Member> {
    let id = shared::util::snowflake_id();
    let now = shared::util::now_millis();
    insert(pool, id, &data, now).await?;
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create member".into()))
}

/// Bind the provider customer id to a member. Idempotent for replays of the
/// same checkout; a different customer id on the same member is rejected.
pub async fn bind_billing_customer(
    pool: &SqlitePool,
    member_id: i64,
    customer_id: &str,
) -> RepoResult<()> {
    let rows = sqlx::query(
        "UPDATE member SET billing_customer_id = ?1, updated_at = ?2 WHERE id = ?3 AND (billing_customer_id IS NULL OR billing_customer_id = ?1)",
    )
    .bind(customer_id)
    .bind(shared::util::now_millis())
    .bind(member_id)
    .execute(pool)
    .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::Validation(format!(
            "Member {member_id} is bound to a different billing customer"
        )));
    }
    Ok(())
}

/// Assign the membership number, only if absent. Returns whether this call
/// performed the assignment.
pub async fn assign_membership_number<'e, E>(
    db: E,
    member_id: i64,
    number: &str,
) -> RepoResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "UPDATE member SET membership_number = ?1, updated_at = ?2 WHERE id = ?3 AND membership_number IS NULL",
    )
    .bind(number)
    .bind(shared::util::now_millis())
    .bind(member_id)
    .execute(db)
    .await?;
    Ok(rows.rows_affected() > 0)
}

/// Activate subscription and membership. Safe to repeat; a canceled member
/// re-activating through a new checkout is intended.
pub async fn activate_subscription<'e, E>(db: E, member_id: i64) -> RepoResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "UPDATE member SET subscription_status = ?1, membership_status = ?2, updated_at = ?3 WHERE id = ?4",
    )
    .bind(SubscriptionStatus::Active)
    .bind(MembershipStatus::Active)
    .bind(shared::util::now_millis())
    .bind(member_id)
    .execute(db)
    .await?;
    Ok(rows.rows_affected() > 0)
}

/// Revive a paying member on a successful invoice. No-op for canceled
/// members so a stale event cannot resurrect a terminated subscription.
pub async fn revive_on_payment<'e, E>(db: E, member_id: i64) -> RepoResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "UPDATE member SET subscription_status = ?1, membership_status = ?2, updated_at = ?3 WHERE id = ?4 AND subscription_status IN (?5, ?6, ?1)",
    )
    .bind(SubscriptionStatus::Active)
    .bind(MembershipStatus::Active)
    .bind(shared::util::now_millis())
    .bind(member_id)
    .bind(SubscriptionStatus::Inactive)
    .bind(SubscriptionStatus::PastDue)
    .execute(db)
    .await?;
    Ok(rows.rows_affected() > 0)
}

/// Failed renewal charge: active -> past_due. No-op otherwise.
pub async fn mark_past_due<'e, E>(db: E, member_id: i64) -> RepoResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "UPDATE member SET subscription_status = ?1, updated_at = ?2 WHERE id = ?3 AND subscription_status = ?4",
    )
    .bind(SubscriptionStatus::PastDue)
    .bind(shared::util::now_millis())
    .bind(member_id)
    .bind(SubscriptionStatus::Active)
    .execute(db)
    .await?;
    Ok(rows.rows_affected() > 0)
}

/// Upstream termination: active/past_due -> canceled. No-op otherwise.
pub async fn mark_canceled<'e, E>(db: E, member_id: i64) -> RepoResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "UPDATE member SET subscription_status = ?1, updated_at = ?2 WHERE id = ?3 AND subscription_status IN (?4, ?5)",
    )
    .bind(SubscriptionStatus::Canceled)
    .bind(shared::util::now_millis())
    .bind(member_id)
    .bind(SubscriptionStatus::Active)
    .bind(SubscriptionStatus::PastDue)
    .execute(db)
    .await?;
    Ok(rows.rows_affected() > 0)
}

/// Direct status write for provider `subscription.updated` events. The
/// condition makes replays of an already-applied event a no-op.
pub async fn set_subscription_status<'e, E>(
    db: E,
    member_id: i64,
    status: SubscriptionStatus,
) -> RepoResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "UPDATE member SET subscription_status = ?1, updated_at = ?2 WHERE id = ?3 AND subscription_status != ?1",
    )
    .bind(status)
    .bind(shared::util::now_millis())
    .bind(member_id)
    .execute(db)
    .await?;
    Ok(rows.rows_affected() > 0)
}

/// Admin suspend/reinstate.
pub async fn set_membership_status(
    pool: &SqlitePool,
    member_id: i64,
    status: MembershipStatus,
) -> RepoResult<()> {
    let rows = sqlx::query("UPDATE member SET membership_status = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(status)
        .bind(shared::util::now_millis())
        .bind(member_id)
        .execute(pool)
        .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Member {member_id} not found")));
    }
    Ok(())
}

/// Apply a cosmetic card theme owned via exchange redemption.
pub async fn set_card_theme<'e, E>(db: E, member_id: i64, theme: &str) -> RepoResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE member SET card_theme = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(theme)
        .bind(shared::util::now_millis())
        .bind(member_id)
        .execute(db)
        .await?;
    Ok(())
}

/// Cascading admin purge: ledger entries, exchange orders, issued invite
/// codes and the member row go in one transaction. Returns whether the
/// member existed.
pub async fn purge(pool: &SqlitePool, member_id: i64) -> RepoResult<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM ledger_entry WHERE member_id = ?1")
        .bind(member_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM exchange_order WHERE member_id = ?1")
        .bind(member_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM invite_code WHERE invited_by = ?1")
        .bind(member_id)
        .execute(&mut *tx)
        .await?;
    let rows = sqlx::query("DELETE FROM member WHERE id = ?1")
        .bind(member_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(rows.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn make_create(email: &str) -> MemberCreate {
        MemberCreate {
            name: "Test".into(),
            email: email.into(),
            membership_type: "standard".into(),
            subscription_status: SubscriptionStatus::Inactive,
            membership_status: MembershipStatus::Inactive,
            invited_by: None,
            country: None,
            city: None,
            lat: None,
            lng: None,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let pool = test_pool().await;
        create(&pool, make_create("dup@example.com")).await.unwrap();
        let err = create(&pool, make_create("dup@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Duplicate(_)));
    }

    #[tokio::test]
    async fn membership_number_is_assigned_exactly_once() {
        let pool = test_pool().await;
        let member = create(&pool, make_create("num@example.com")).await.unwrap();

        assert!(
            assign_membership_number(&pool, member.id, "CM-1001")
                .await
                .unwrap()
        );
        assert!(
            !assign_membership_number(&pool, member.id, "CM-2002")
                .await
                .unwrap()
        );

        let reloaded = find_by_id(&pool, member.id).await.unwrap().unwrap();
        assert_eq!(reloaded.membership_number.as_deref(), Some("CM-1001"));
    }

    #[tokio::test]
    async fn subscription_transitions_are_conditional() {
        let pool = test_pool().await;
        let member = create(&pool, make_create("sub@example.com")).await.unwrap();

        // past_due requires active
        assert!(!mark_past_due(&pool, member.id).await.unwrap());

        activate_subscription(&pool, member.id).await.unwrap();
        assert!(mark_past_due(&pool, member.id).await.unwrap());
        assert!(!mark_past_due(&pool, member.id).await.unwrap());

        assert!(mark_canceled(&pool, member.id).await.unwrap());
        assert!(!mark_canceled(&pool, member.id).await.unwrap());

        // A stale invoice event must not resurrect a canceled member.
        assert!(!revive_on_payment(&pool, member.id).await.unwrap());

        let reloaded = find_by_id(&pool, member.id).await.unwrap().unwrap();
        assert_eq!(reloaded.subscription_status, SubscriptionStatus::Canceled);
    }

    #[tokio::test]
    async fn binding_a_second_customer_fails() {
        let pool = test_pool().await;
        let member = create(&pool, make_create("cus@example.com")).await.unwrap();

        bind_billing_customer(&pool, member.id, "cus_123")
            .await
            .unwrap();
        // Replay of the same checkout is a no-op success.
        bind_billing_customer(&pool, member.id, "cus_123")
            .await
            .unwrap();
        let err = bind_billing_customer(&pool, member.id, "cus_999")
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
    }

    #[tokio::test]
    async fn purge_removes_member_and_dependents() {
        let pool = test_pool().await;
        let member = create(&pool, make_create("purge@example.com"))
            .await
            .unwrap();
        crate::db::repository::ledger::grant_once(
            &pool,
            member.id,
            shared::models::ledger::entry_kind::WELCOME_BONUS,
            100,
            "signup",
        )
        .await
        .unwrap();

        assert!(purge(&pool, member.id).await.unwrap());
        assert!(find_by_id(&pool, member.id).await.unwrap().is_none());
        assert_eq!(
            crate::db::repository::ledger::balance_of(&pool, member.id)
                .await
                .unwrap(),
            0
        );
        // Second purge is a no-op.
        assert!(!purge(&pool, member.id).await.unwrap());
    }
}
