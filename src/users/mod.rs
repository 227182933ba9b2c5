//! Users and session tokens.

mod registry;

pub use registry::UserRegistry;
