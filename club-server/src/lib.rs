//! Club Server - membership ledger and grant engine
//!
//! # Module structure
//!
//! ```text
//! club-server/src/
//! ├── core/      # configuration, shared state
//! ├── db/        # SQLite pool, migrations, repositories
//! ├── invites/   # invite code lifecycle and member provisioning
//! ├── exchange/  # point exchange transactions and admin review
//! ├── billing/   # payment webhook verification and reconciliation
//! ├── rewards/   # rank derivation, login streak bonuses
//! └── utils/     # errors, logging, rate limiting
//! ```
//!
//! The HTTP routing layer, session issuance, object storage and outbound
//! notifications are external collaborators; this crate exposes typed
//! operations and maps every error to the status code the router should
//! return. All concurrency control is delegated to the storage layer:
//! each state transition is a single conditional statement or one
//! serialized transaction, and every externally-driven side effect is an
//! idempotent ledger grant.

pub mod billing;
pub mod core;
pub mod db;
pub mod exchange;
pub mod invites;
pub mod rewards;
pub mod utils;

// Re-export public types
pub use billing::{PaymentEvent, SubscriptionReconciler};
pub use crate::core::{Config, ServerState};
pub use db::DbService;
pub use exchange::{ExchangeEngine, ReviewOutcome};
pub use invites::{InviteService, RedeemInvite, RedeemedInvite};
pub use rewards::{ClaimOutcome, Rank, StreakEngine};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};
