//! Snack log implementation.
//!
//! Snacks are stored in an append-only log; an in-memory index maps each
//! snack id to the offset of its latest state and each owner to their snacks.

mod index;
mod log;

pub use index::{IndexEntry, SnackIndex};
pub use log::{EntryIterator, EntryKind, LogEntry, SnackLog};
