//! Summary aggregation.

use super::ordering::order_by_creation;
use super::streak::longest_streak;
use crate::error::Result;
use crate::types::{Snack, UserId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Anything that can hand over every snack an owner has logged.
pub trait RecordSource {
    /// All live snacks for `owner`, in any order. An unknown owner yields an
    /// empty list.
    fn fetch_records(&self, owner: UserId) -> Result<Vec<Snack>>;
}

/// Per-owner counts and best streak, computed on demand.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarySnapshot {
    /// Every snack logged.
    pub total: u64,
    /// Snacks on diet.
    pub compliant: u64,
    /// Snacks off diet.
    pub non_compliant: u64,
    /// Longest unbroken run of on-diet snacks in creation order.
    pub best_streak: u64,
}

/// Build a snapshot from one owner's snacks.
///
/// Input order does not matter; snacks are put in creation order first.
pub fn summarize(snacks: Vec<Snack>) -> SummarySnapshot {
    let total = snacks.len() as u64;
    let compliant = snacks.iter().filter(|snack| snack.on_diet).count() as u64;

    let ordered = order_by_creation(snacks);
    let best_streak = longest_streak(&ordered) as u64;

    SummarySnapshot {
        total,
        compliant,
        non_compliant: total - compliant,
        best_streak,
    }
}

/// Fetch an owner's snacks once and summarize them.
pub fn get_summary<S>(source: &S, owner: UserId) -> Result<SummarySnapshot>
where
    S: RecordSource + ?Sized,
{
    let snacks = source.fetch_records(owner)?;
    let snapshot = summarize(snacks);

    debug!(
        owner = %owner,
        total = snapshot.total,
        compliant = snapshot.compliant,
        best_streak = snapshot.best_streak,
        "Computed summary"
    );

    Ok(snapshot)
}
