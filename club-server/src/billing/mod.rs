//! Subscription Reconciler
//!
//! Translates provider events into local subscription state and bonus
//! grants. Delivery is at-least-once and unordered, so every transition is
//! a conditional write and every side effect an idempotent grant: replaying
//! any event changes nothing.

pub mod webhook;

pub use webhook::{PaymentEvent, parse_event, sign_payload, verify_signature};

use crate::db::repository::{ledger, member};
use crate::utils::{AppError, AppResult};
use shared::models::SubscriptionStatus;
use shared::models::ledger::entry_kind;
use sqlx::SqlitePool;
use tracing::{info, warn};

pub const SUBSCRIPTION_BONUS_POINTS: i64 = 100;
pub const RENEWAL_BONUS_POINTS: i64 = 50;

pub struct SubscriptionReconciler {
    pool: SqlitePool,
    webhook_secret: String,
    tolerance_secs: i64,
}

impl SubscriptionReconciler {
    pub fn new(pool: SqlitePool, webhook_secret: String, tolerance_secs: i64) -> Self {
        Self {
            pool,
            webhook_secret,
            tolerance_secs,
        }
    }

    /// Full webhook path: verify the signature, parse, apply. Returning
    /// `Ok` is the durable-commit acknowledgment; any error maps to a
    /// non-2xx response so the provider redelivers.
    pub async fn process(&self, payload: &str, signature_header: &str) -> AppResult<()> {
        verify_signature(
            payload,
            signature_header,
            &self.webhook_secret,
            shared::util::now_millis() / 1000,
            self.tolerance_secs,
        )?;
        let event = parse_event(payload)?;
        self.apply(event).await
    }

    /// Apply one event. Safe to call twice with the same event, and safe
    /// for events describing a state the member already reached.
    pub async fn apply(&self, event: PaymentEvent) -> AppResult<()> {
        match event {
            PaymentEvent::CheckoutCompleted {
                customer_id,
                member_id,
                subscription_id,
            } => {
                self.on_checkout_completed(&customer_id, member_id, subscription_id.as_deref())
                    .await
            }
            PaymentEvent::InvoicePaid {
                customer_id,
                billing_period,
            } => self.on_invoice_paid(&customer_id, &billing_period).await,
            PaymentEvent::InvoicePaymentFailed {
                customer_id,
                attempt_count,
            } => self.on_payment_failed(&customer_id, attempt_count).await,
            PaymentEvent::SubscriptionDeleted { customer_id } => {
                self.on_subscription_deleted(&customer_id).await
            }
            PaymentEvent::SubscriptionUpdated {
                customer_id,
                status,
                cancel_at_period_end,
            } => {
                self.on_subscription_updated(&customer_id, &status, cancel_at_period_end)
                    .await
            }
            PaymentEvent::Unknown { event_type } => {
                info!(%event_type, "Ignoring unhandled provider event");
                Ok(())
            }
        }
    }

    async fn on_checkout_completed(
        &self,
        customer_id: &str,
        member_id: i64,
        subscription_id: Option<&str>,
    ) -> AppResult<()> {
        let Some(found) = member::find_by_id(&self.pool, member_id).await? else {
            // Nothing to reconcile against; redelivery cannot help.
            warn!(member_id, customer_id, "Checkout for unknown member");
            return Ok(());
        };

        member::bind_billing_customer(&self.pool, found.id, customer_id).await?;
        member::activate_subscription(&self.pool, found.id).await?;

        // First activation issues the membership number; replays lose the
        // conditional write and change nothing.
        let number = format!("CM-{}", found.id);
        let issued = member::assign_membership_number(&self.pool, found.id, &number).await?;

        if let Some(inviter_id) = found.invited_by {
            ledger::grant_once(
                &self.pool,
                inviter_id,
                entry_kind::SUBSCRIPTION_BONUS,
                SUBSCRIPTION_BONUS_POINTS,
                &found.id.to_string(),
            )
            .await?;
        }

        info!(
            member_id = found.id,
            customer_id,
            subscription_id = subscription_id.unwrap_or("-"),
            issued,
            "Checkout completed"
        );
        Ok(())
    }

    async fn on_invoice_paid(&self, customer_id: &str, billing_period: &str) -> AppResult<()> {
        let Some(found) = member::find_by_customer(&self.pool, customer_id).await? else {
            warn!(customer_id, "Invoice for unknown customer");
            return Ok(());
        };

        member::revive_on_payment(&self.pool, found.id).await?;

        let granted = ledger::grant_once(
            &self.pool,
            found.id,
            entry_kind::RENEWAL_BONUS,
            RENEWAL_BONUS_POINTS,
            billing_period,
        )
        .await?;
        info!(
            member_id = found.id,
            billing_period, granted, "Invoice paid"
        );
        Ok(())
    }

    async fn on_payment_failed(&self, customer_id: &str, attempt_count: i64) -> AppResult<()> {
        let Some(found) = member::find_by_customer(&self.pool, customer_id).await? else {
            warn!(customer_id, "Failed invoice for unknown customer");
            return Ok(());
        };
        let transitioned = member::mark_past_due(&self.pool, found.id).await?;
        info!(
            member_id = found.id,
            attempt_count, transitioned, "Renewal charge failed"
        );
        Ok(())
    }

    async fn on_subscription_deleted(&self, customer_id: &str) -> AppResult<()> {
        let Some(found) = member::find_by_customer(&self.pool, customer_id).await? else {
            warn!(customer_id, "Deleted subscription for unknown customer");
            return Ok(());
        };
        let transitioned = member::mark_canceled(&self.pool, found.id).await?;
        info!(member_id = found.id, transitioned, "Subscription canceled");
        Ok(())
    }

    async fn on_subscription_updated(
        &self,
        customer_id: &str,
        status: &str,
        cancel_at_period_end: bool,
    ) -> AppResult<()> {
        let Some(found) = member::find_by_customer(&self.pool, customer_id).await? else {
            warn!(customer_id, "Update for unknown customer");
            return Ok(());
        };

        let mapped = match status {
            "active" | "trialing" => Some(SubscriptionStatus::Active),
            "past_due" | "unpaid" => Some(SubscriptionStatus::PastDue),
            "canceled" => Some(SubscriptionStatus::Canceled),
            other => {
                info!(member_id = found.id, status = other, "Unmapped provider status");
                None
            }
        };
        if let Some(status) = mapped {
            member::set_subscription_status(&self.pool, found.id, status).await?;
        }
        info!(
            member_id = found.id,
            status, cancel_at_period_end, "Subscription updated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use shared::models::{MemberCreate, MembershipStatus};

    async fn seed_member(
        pool: &SqlitePool,
        email: &str,
        invited_by: Option<i64>,
    ) -> shared::models::Member {
        member::create(
            pool,
            MemberCreate {
                name: "Subscriber".into(),
                email: email.into(),
                membership_type: "standard".into(),
                subscription_status: SubscriptionStatus::Inactive,
                membership_status: MembershipStatus::Inactive,
                invited_by,
                country: None,
                city: None,
                lat: None,
                lng: None,
            },
        )
        .await
        .unwrap()
    }

    fn reconciler(pool: &SqlitePool, secret: &str) -> SubscriptionReconciler {
        SubscriptionReconciler::new(pool.clone(), secret.into(), 300)
    }

    #[tokio::test]
    async fn checkout_activates_and_rewards_the_inviter_once() {
        let pool = test_pool().await;
        let inviter = seed_member(&pool, "inviter@example.com", None).await;
        let invitee = seed_member(&pool, "invitee@example.com", Some(inviter.id)).await;
        let reconciler = reconciler(&pool, "");

        let event = PaymentEvent::CheckoutCompleted {
            customer_id: "cus_1".into(),
            member_id: invitee.id,
            subscription_id: Some("sub_1".into()),
        };
        reconciler.apply(event.clone()).await.unwrap();
        // Duplicate delivery.
        reconciler.apply(event).await.unwrap();

        let reloaded = member::find_by_id(&pool, invitee.id).await.unwrap().unwrap();
        assert_eq!(reloaded.subscription_status, SubscriptionStatus::Active);
        assert_eq!(reloaded.membership_status, MembershipStatus::Active);
        assert_eq!(
            reloaded.membership_number,
            Some(format!("CM-{}", invitee.id))
        );
        assert_eq!(reloaded.billing_customer_id.as_deref(), Some("cus_1"));

        assert_eq!(
            ledger::balance_of(&pool, inviter.id).await.unwrap(),
            SUBSCRIPTION_BONUS_POINTS
        );
    }

    #[tokio::test]
    async fn duplicate_invoice_paid_grants_renewal_once_per_period() {
        let pool = test_pool().await;
        let member = seed_member(&pool, "renew@example.com", None).await;
        let reconciler = reconciler(&pool, "");
        reconciler
            .apply(PaymentEvent::CheckoutCompleted {
                customer_id: "cus_2".into(),
                member_id: member.id,
                subscription_id: None,
            })
            .await
            .unwrap();

        let event = PaymentEvent::InvoicePaid {
            customer_id: "cus_2".into(),
            billing_period: "2026-08".into(),
        };
        reconciler.apply(event.clone()).await.unwrap();
        reconciler.apply(event).await.unwrap();

        assert_eq!(
            ledger::balance_of(&pool, member.id).await.unwrap(),
            RENEWAL_BONUS_POINTS
        );

        // The next period grants again.
        reconciler
            .apply(PaymentEvent::InvoicePaid {
                customer_id: "cus_2".into(),
                billing_period: "2026-09".into(),
            })
            .await
            .unwrap();
        assert_eq!(
            ledger::balance_of(&pool, member.id).await.unwrap(),
            2 * RENEWAL_BONUS_POINTS
        );
    }

    #[tokio::test]
    async fn failed_then_paid_invoice_moves_past_due_and_back() {
        let pool = test_pool().await;
        let member = seed_member(&pool, "lapse@example.com", None).await;
        let reconciler = reconciler(&pool, "");
        reconciler
            .apply(PaymentEvent::CheckoutCompleted {
                customer_id: "cus_3".into(),
                member_id: member.id,
                subscription_id: None,
            })
            .await
            .unwrap();

        reconciler
            .apply(PaymentEvent::InvoicePaymentFailed {
                customer_id: "cus_3".into(),
                attempt_count: 1,
            })
            .await
            .unwrap();
        let lapsed = member::find_by_id(&pool, member.id).await.unwrap().unwrap();
        assert_eq!(lapsed.subscription_status, SubscriptionStatus::PastDue);

        reconciler
            .apply(PaymentEvent::InvoicePaid {
                customer_id: "cus_3".into(),
                billing_period: "2026-08".into(),
            })
            .await
            .unwrap();
        let revived = member::find_by_id(&pool, member.id).await.unwrap().unwrap();
        assert_eq!(revived.subscription_status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn deletion_cancels_and_stale_events_cannot_resurrect() {
        let pool = test_pool().await;
        let member = seed_member(&pool, "bye@example.com", None).await;
        let reconciler = reconciler(&pool, "");
        reconciler
            .apply(PaymentEvent::CheckoutCompleted {
                customer_id: "cus_4".into(),
                member_id: member.id,
                subscription_id: None,
            })
            .await
            .unwrap();

        reconciler
            .apply(PaymentEvent::SubscriptionDeleted {
                customer_id: "cus_4".into(),
            })
            .await
            .unwrap();
        // A late invoice event for the canceled subscription is a no-op on
        // state; the period grant still dedupes on its own key.
        reconciler
            .apply(PaymentEvent::InvoicePaid {
                customer_id: "cus_4".into(),
                billing_period: "2026-07".into(),
            })
            .await
            .unwrap();

        let reloaded = member::find_by_id(&pool, member.id).await.unwrap().unwrap();
        assert_eq!(reloaded.subscription_status, SubscriptionStatus::Canceled);
    }

    #[tokio::test]
    async fn subscription_updated_applies_mapped_statuses_conditionally() {
        let pool = test_pool().await;
        let member = seed_member(&pool, "drift@example.com", None).await;
        let reconciler = reconciler(&pool, "");
        reconciler
            .apply(PaymentEvent::CheckoutCompleted {
                customer_id: "cus_6".into(),
                member_id: member.id,
                subscription_id: None,
            })
            .await
            .unwrap();

        let event = PaymentEvent::SubscriptionUpdated {
            customer_id: "cus_6".into(),
            status: "past_due".into(),
            cancel_at_period_end: false,
        };
        reconciler.apply(event.clone()).await.unwrap();
        // Replaying the same state is a no-op, not an error.
        reconciler.apply(event).await.unwrap();
        let reloaded = member::find_by_id(&pool, member.id).await.unwrap().unwrap();
        assert_eq!(reloaded.subscription_status, SubscriptionStatus::PastDue);

        // An unmapped provider status changes nothing.
        reconciler
            .apply(PaymentEvent::SubscriptionUpdated {
                customer_id: "cus_6".into(),
                status: "incomplete_expired".into(),
                cancel_at_period_end: true,
            })
            .await
            .unwrap();
        let reloaded = member::find_by_id(&pool, member.id).await.unwrap().unwrap();
        assert_eq!(reloaded.subscription_status, SubscriptionStatus::PastDue);
    }

    #[tokio::test]
    async fn events_for_unknown_customers_are_acknowledged() {
        let pool = test_pool().await;
        let reconciler = reconciler(&pool, "");
        reconciler
            .apply(PaymentEvent::InvoicePaid {
                customer_id: "cus_ghost".into(),
                billing_period: "2026-08".into(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn process_rejects_bad_signatures_before_any_state_change() {
        let pool = test_pool().await;
        let member = seed_member(&pool, "sig@example.com", None).await;
        let reconciler = reconciler(&pool, "whsec_test");

        let payload = format!(
            r#"{{"type":"checkout.session.completed","data":{{"object":{{"customer":"cus_5","client_reference_id":"{}"}}}}}}"#,
            member.id
        );
        let err = reconciler.process(&payload, "t=1,v1=00").await.unwrap_err();
        assert!(matches!(err, AppError::SignatureInvalid));

        let unchanged = member::find_by_id(&pool, member.id).await.unwrap().unwrap();
        assert_eq!(unchanged.subscription_status, SubscriptionStatus::Inactive);

        // A correctly signed envelope goes through.
        let now = shared::util::now_millis() / 1000;
        let header = sign_payload(&payload, "whsec_test", now);
        reconciler.process(&payload, &header).await.unwrap();
        let activated = member::find_by_id(&pool, member.id).await.unwrap().unwrap();
        assert_eq!(activated.subscription_status, SubscriptionStatus::Active);
    }
}
