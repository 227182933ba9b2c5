//! # Diet Log
//!
//! A snack diary: users log what they eat, flag each snack as on or off
//! their diet, and ask for a summary of how they are doing.
//!
//! ## Core Concepts
//!
//! - **Snacks**: Owner-scoped records kept in an append-only log
//! - **Users**: Registered owners identified by an opaque session token
//! - **Summaries**: Totals, on/off diet counts and the best on-diet streak,
//!   recomputed from the owner's snacks on every request
//!
//! ## Example
//!
//! ```ignore
//! use dietlog::{SnackInput, SnackStore, StoreConfig};
//!
//! let store = SnackStore::open_or_create(StoreConfig {
//!     path: "./my-diary".into(),
//!     ..Default::default()
//! })?;
//!
//! let user = store.register_user("alice")?;
//! store.create_snack(user.id, SnackInput::new("Apple", "Green").on_diet(true))?;
//! store.create_snack(user.id, SnackInput::new("Donut", "Glazed"))?;
//!
//! let summary = store.summary(user.id)?;
//! assert_eq!(summary.best_streak, 1);
//! ```

pub mod error;
pub mod records;
pub mod service;
pub mod store;
pub mod summary;
pub mod types;
pub mod users;

// Re-exports
pub use error::{Result, StoreError};
pub use records::{EntryKind, LogEntry, SnackIndex, SnackLog};
pub use service::DietTracker;
pub use store::{SnackStore, StoreConfig};
pub use summary::{
    get_summary, islands_by, longest_run_by, longest_streak, order_by_creation, ordering_key,
    summarize, Island, RecordSource, SummarySnapshot,
};
pub use types::*;
pub use users::UserRegistry;
