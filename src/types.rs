//! Core types for the snack store.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Maximum byte length of a snack name or description.
pub const MAX_TEXT_LEN: usize = 255;

/// Unique identifier for a snack.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnackId(pub u64);

impl fmt::Debug for SnackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnackId({})", self.0)
    }
}

impl fmt::Display for SnackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a user (the owner of snacks).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        Timestamp(duration.as_micros() as i64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Opaque session token handed to a user at registration.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(pub String);

static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(0);

impl SessionToken {
    /// Generate a fresh token for a user.
    ///
    /// The token is a SHA-256 over the user id, the wall clock and a
    /// process-local counter, so two calls never collide within a process.
    pub fn generate(user: UserId) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let counter = TOKEN_COUNTER.fetch_add(1, Ordering::Relaxed);

        let mut hasher = Sha256::new();
        hasher.update(user.0.to_le_bytes());
        hasher.update(nanos.to_le_bytes());
        hasher.update(counter.to_le_bytes());
        hasher.update(std::process::id().to_le_bytes());
        SessionToken(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = self.0.get(..8).unwrap_or(self.0.as_str());
        write!(f, "SessionToken({}...)", shown)
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A logged snack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snack {
    /// Unique identifier (assigned by store).
    pub id: SnackId,

    /// User who logged the snack.
    pub owner: UserId,

    pub name: String,

    pub description: String,

    /// When the snack was first logged. Updates keep the original value.
    pub created_at: Timestamp,

    /// Whether the snack is within the diet.
    pub on_diet: bool,
}

/// Input for creating or updating a snack.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SnackInput {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub on_diet: bool,
    /// Backdated creation time. Only honoured on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

impl SnackInput {
    /// New input, off diet unless marked otherwise.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            on_diet: false,
            created_at: None,
        }
    }

    /// Set the diet flag.
    pub fn on_diet(mut self, on_diet: bool) -> Self {
        self.on_diet = on_diet;
        self
    }

    /// Backdate the creation timestamp.
    pub fn with_created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Check the input before it reaches the log.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(StoreError::InvalidInput("name must not be empty".into()));
        }
        if self.name.len() > MAX_TEXT_LEN {
            return Err(StoreError::InvalidInput(format!(
                "name exceeds {} bytes",
                MAX_TEXT_LEN
            )));
        }
        if self.description.len() > MAX_TEXT_LEN {
            return Err(StoreError::InvalidInput(format!(
                "description exceeds {} bytes",
                MAX_TEXT_LEN
            )));
        }
        Ok(())
    }
}

/// A registered user.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub session: SessionToken,
    pub created: Timestamp,
}

/// Store statistics.
#[derive(Clone, Debug, Default)]
pub struct StoreStats {
    pub snack_count: u64,
    pub owner_count: u64,
    pub user_count: u64,
    pub log_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_tokens_are_unique() {
        let a = SessionToken::generate(UserId(1));
        let b = SessionToken::generate(UserId(1));
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_snack_input_defaults_off_diet() {
        let input: SnackInput =
            serde_json::from_str(r#"{"name": "Cookie", "description": "chocolate"}"#).unwrap();
        assert!(!input.on_diet);
        assert!(input.created_at.is_none());
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let input = SnackInput::new("   ", "nothing");
        assert!(matches!(input.validate(), Err(StoreError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_rejects_long_description() {
        let input = SnackInput::new("Salad", "x".repeat(MAX_TEXT_LEN + 1));
        assert!(matches!(input.validate(), Err(StoreError::InvalidInput(_))));

        let input = SnackInput::new("Salad", "x".repeat(MAX_TEXT_LEN));
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_timestamp_ordering() {
        assert!(Timestamp(1) < Timestamp(2));
        assert!(SnackId(9) < SnackId(10));
    }
}
