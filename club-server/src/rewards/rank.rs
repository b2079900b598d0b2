//! Rank Calculator
//!
//! Pure derivations from status points. Ranks are never stored; they are
//! recomputed from the ledger on every read.

use serde::{Deserialize, Serialize};

/// Member rank, lowest to highest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rank {
    D,
    C,
    B,
    A,
}

/// Status-point thresholds, ascending.
pub const RANK_THRESHOLDS: [(Rank, i64); 4] =
    [(Rank::D, 0), (Rank::C, 100), (Rank::B, 300), (Rank::A, 800)];

/// Highest rank whose threshold is <= the given status points.
pub fn rank_for(status_points: i64) -> Rank {
    let mut rank = Rank::D;
    for (candidate, threshold) in RANK_THRESHOLDS {
        if status_points >= threshold {
            rank = candidate;
        }
    }
    rank
}

/// The rank above the given one, if any.
pub fn next_rank(rank: Rank) -> Option<Rank> {
    match rank {
        Rank::D => Some(Rank::C),
        Rank::C => Some(Rank::B),
        Rank::B => Some(Rank::A),
        Rank::A => None,
    }
}

/// Points still missing to reach the next rank. None at the top rank.
pub fn points_to_next(status_points: i64) -> Option<i64> {
    let next = next_rank(rank_for(status_points))?;
    RANK_THRESHOLDS
        .into_iter()
        .find(|(rank, _)| *rank == next)
        .map(|(_, threshold)| threshold - status_points.max(0))
}
