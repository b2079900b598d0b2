//! Data Models
//!
//! Plain serde structs shared between the server and its clients. Database
//! derives are gated behind the `db` feature.

pub mod exchange;
pub mod invite;
pub mod ledger;
pub mod member;
pub mod quest;

pub use exchange::{
    ExchangeItem, ExchangeItemCreate, ExchangeItemUpdate, ExchangeOrder, OrderStatus,
    ReviewDecision,
};
pub use invite::{InviteCode, InviteCodeCreate};
pub use ledger::LedgerEntry;
pub use member::{Member, MemberCreate, MembershipStatus, SubscriptionStatus};
pub use quest::Quest;
