//! Invite Lifecycle Manager
//!
//! Validation, redemption and creation of invite codes. Redemption
//! consumes the code and provisions the member in one transaction; the
//! welcome/invite/quest grants run after commit and are each individually
//! idempotent, so a crash between commit and grant is healed by retrying
//! any of the follow-up flows.

use crate::db::repository::{invite, ledger, member, quest};
use crate::utils::{AppError, AppResult};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use shared::models::ledger::entry_kind;
use shared::models::{InviteCode, InviteCodeCreate, MemberCreate, MembershipStatus, SubscriptionStatus};
use sqlx::SqlitePool;
use tracing::{info, warn};
use validator::Validate;

pub const WELCOME_BONUS_POINTS: i64 = 100;
pub const INVITE_BONUS_POINTS: i64 = 100;

/// Membership type whose redemption immediately activates the member.
pub const FREE_TIER_TYPE: &str = "free_tier";

/// Quest auto-completed for the inviter when a free-tier invite lands.
pub const INVITE_FRIEND_QUEST: &str = "invite-friend";

const CODE_LEN: usize = 16;

/// Invite redemption input.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RedeemInvite {
    pub code: String,
    #[validate(email)]
    pub email: String,
}

/// Result of a successful redemption. The callback token is consumed by
/// the external session layer to finish sign-in.
#[derive(Debug, Clone, Serialize)]
pub struct RedeemedInvite {
    pub member_id: i64,
    pub callback_token: String,
}

/// Pre-filled profile seed carried by an invite.
#[derive(Debug, Clone, Serialize)]
pub struct InviteSeed {
    pub name: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// Validation view of a code, without consuming it.
#[derive(Debug, Clone, Serialize)]
pub struct InviteValidation {
    pub valid: bool,
    pub membership_type: Option<String>,
    pub invited_by: Option<i64>,
    pub seed: Option<InviteSeed>,
}

pub struct InviteService {
    pool: SqlitePool,
}

impl InviteService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Check a code without consuming it. The answer is advisory: the
    /// redemption itself re-checks atomically.
    pub async fn validate(&self, code: &str) -> AppResult<InviteValidation> {
        let Some(invite) = invite::find_by_code(&self.pool, code).await? else {
            return Ok(InviteValidation {
                valid: false,
                membership_type: None,
                invited_by: None,
                seed: None,
            });
        };

        let valid = if invite.reusable {
            let total = invite::total_reusable_use_count(&self.pool, invite.invited_by).await?;
            total < invite::cap_for_total(total)
        } else {
            !invite.used
        };

        Ok(InviteValidation {
            valid,
            membership_type: Some(invite.membership_type.clone()),
            invited_by: Some(invite.invited_by),
            seed: Some(seed_of(&invite)),
        })
    }

    /// Redeem a code and provision the member.
    ///
    /// Consuming the code and inserting the member commit together; a lost
    /// race on the code leaves no member behind, and a duplicate email
    /// releases the code slot again via rollback.
    pub async fn redeem(&self, request: RedeemInvite) -> AppResult<RedeemedInvite> {
        request.validate()?;

        let invite = invite::find_by_code(&self.pool, &request.code)
            .await?
            .ok_or(AppError::InvalidInvite)?;

        let member_id = shared::util::snowflake_id();
        let now = shared::util::now_millis();
        let free_tier = invite.membership_type == FREE_TIER_TYPE;

        let data = MemberCreate {
            name: invite
                .target_name
                .clone()
                .unwrap_or_else(|| local_part(&request.email).to_string()),
            email: request.email.clone(),
            membership_type: invite.membership_type.clone(),
            subscription_status: if free_tier {
                SubscriptionStatus::FreeTier
            } else {
                SubscriptionStatus::Inactive
            },
            membership_status: if free_tier {
                MembershipStatus::Active
            } else {
                MembershipStatus::Inactive
            },
            invited_by: Some(invite.invited_by),
            country: invite.target_country.clone(),
            city: invite.target_city.clone(),
            lat: invite.target_lat,
            lng: invite.target_lng,
        };

        let mut tx = self.pool.begin().await?;
        let consumed = if invite.reusable {
            invite::increment_use_count(&mut *tx, invite.id, invite.invited_by).await?
        } else {
            invite::mark_used(&mut *tx, invite.id).await?
        };
        if !consumed {
            return Err(if invite.reusable {
                AppError::InviteCapReached
            } else {
                AppError::InviteAlreadyUsed
            });
        }
        member::insert(&mut *tx, member_id, &data, now).await?;
        tx.commit().await?;

        info!(
            member_id,
            code = %invite.code,
            invited_by = invite.invited_by,
            "Invite redeemed"
        );

        // One welcome bonus per member; kind-only dedupe.
        ledger::grant_once(
            &self.pool,
            member_id,
            entry_kind::WELCOME_BONUS,
            WELCOME_BONUS_POINTS,
            "signup",
        )
        .await?;

        if free_tier {
            self.grant_inviter_rewards(invite.invited_by, member_id).await?;
        }

        Ok(RedeemedInvite {
            member_id,
            callback_token: uuid::Uuid::new_v4().to_string(),
        })
    }

    /// Inviter-side rewards for a landed free-tier invite, each deduped by
    /// the invitee id so the same invitee can never pay out twice.
    async fn grant_inviter_rewards(&self, inviter_id: i64, invitee_id: i64) -> AppResult<()> {
        let invitee_note = invitee_id.to_string();
        ledger::grant_once(
            &self.pool,
            inviter_id,
            entry_kind::INVITE_BONUS,
            INVITE_BONUS_POINTS,
            &invitee_note,
        )
        .await?;

        match quest::find_active_by_code(&self.pool, INVITE_FRIEND_QUEST).await? {
            Some(quest) => {
                ledger::grant_once(
                    &self.pool,
                    inviter_id,
                    entry_kind::QUEST_BONUS,
                    quest.points,
                    &format!("{}:{invitee_id}", quest.code),
                )
                .await?;
            }
            None => {
                warn!(inviter_id, "No active invite-friend quest; skipping credit");
            }
        }
        Ok(())
    }

    /// Admin: mint a new invite code.
    pub async fn create_invite(&self, data: InviteCodeCreate) -> AppResult<InviteCode> {
        let code = generate_code();
        let invite = invite::create(&self.pool, data, &code).await?;
        info!(invite_id = invite.id, invited_by = invite.invited_by, "Invite created");
        Ok(invite)
    }
}

fn seed_of(invite: &InviteCode) -> InviteSeed {
    InviteSeed {
        name: invite.target_name.clone(),
        country: invite.target_country.clone(),
        city: invite.target_city.clone(),
        lat: invite.target_lat,
        lng: invite.target_lng,
    }
}

fn local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

/// Random 16-character alphanumeric invite code.
fn generate_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CODE_LEN)
        .map(char::from)
        .collect()
}
