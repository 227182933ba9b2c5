//! Streak detection by island grouping.
//!
//! Walk the ordered sequence and number the matching items `1..=k` in the
//! order they appear. For a matching item at absolute position `p` with rank
//! `r`, the key `p - r` stays constant while matches are adjacent and jumps
//! by one for every non-matching item in between. Items sharing a key form
//! an island; the longest island is the streak.
//!
//! Positions are taken from the slice handed in, so contiguity only ever
//! depends on that sequence and never on identifier values.

use crate::types::Snack;
use std::collections::HashMap;

/// A maximal run of matching items.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Island {
    /// Position of the first member in the full sequence.
    pub start: usize,
    /// Number of members.
    pub len: usize,
}

impl Island {
    /// Position one past the last member.
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Group matching items into islands, in order of first appearance.
pub fn islands_by<T>(items: &[T], is_member: impl Fn(&T) -> bool) -> Vec<Island> {
    let mut islands: Vec<Island> = Vec::new();
    let mut by_key: HashMap<i64, usize> = HashMap::new();

    let members = items
        .iter()
        .enumerate()
        .filter(|(_, item)| is_member(*item))
        .map(|(position, _)| position);

    for (rank, position) in (1usize..).zip(members) {
        let key = position as i64 - rank as i64;

        match by_key.get(&key) {
            Some(&slot) => islands[slot].len += 1,
            None => {
                by_key.insert(key, islands.len());
                islands.push(Island {
                    start: position,
                    len: 1,
                });
            }
        }
    }

    islands
}

/// Length of the longest island, `0` when nothing matches.
pub fn longest_run_by<T>(items: &[T], is_member: impl Fn(&T) -> bool) -> usize {
    islands_by(items, is_member)
        .iter()
        .map(|island| island.len)
        .max()
        .unwrap_or(0)
}

/// Longest run of on-diet snacks in an already ordered sequence.
pub fn longest_streak(ordered: &[Snack]) -> usize {
    longest_run_by(ordered, |snack| snack.on_diet)
}
