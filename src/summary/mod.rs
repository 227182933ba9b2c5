//! Streak and aggregate summaries.
//!
//! Given every snack an owner has logged, a summary reports how many there
//! are, how many were on diet, and the longest unbroken run of on-diet
//! snacks in creation order. Summaries are recomputed on every request and
//! never stored.
//!
//! The pieces are pure functions over an in-memory sequence:
//! - [`ordering`] puts snacks in creation order
//! - [`streak`] finds runs by island grouping
//! - [`aggregate`] fetches once from a [`RecordSource`] and assembles the
//!   [`SummarySnapshot`]

pub mod aggregate;
pub mod ordering;
pub mod streak;

pub use aggregate::{get_summary, summarize, RecordSource, SummarySnapshot};
pub use ordering::{is_creation_ordered, order_by_creation, ordering_key};
pub use streak::{islands_by, longest_run_by, longest_streak, Island};
