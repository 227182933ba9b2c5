//! Error types for the snack store.

use crate::types::{SnackId, UserId};
use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snack not found: {0}")]
    SnackNotFound(SnackId),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Session ID does not exist")]
    SessionNotFound,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Store is locked by another process")]
    Locked,

    #[error("Store not initialized")]
    NotInitialized,

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },
}

impl StoreError {
    /// Status code a request layer should answer with for this error.
    ///
    /// Unknown sessions are refused with 403, matching how the snack routes
    /// have always treated a cookie that resolves to no user.
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::SessionNotFound => 403,
            StoreError::InvalidInput(_) => 400,
            StoreError::SnackNotFound(_) | StoreError::UserNotFound(_) => 404,
            StoreError::Locked => 423,
            _ => 500,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for StoreError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for StoreError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        StoreError::Deserialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(StoreError::SessionNotFound.status_code(), 403);
        assert_eq!(StoreError::InvalidInput("x".into()).status_code(), 400);
        assert_eq!(StoreError::SnackNotFound(SnackId(3)).status_code(), 404);
        assert_eq!(StoreError::Locked.status_code(), 423);
        assert_eq!(StoreError::NotInitialized.status_code(), 500);
    }

    #[test]
    fn test_display() {
        let err = StoreError::SnackNotFound(SnackId(42));
        assert_eq!(err.to_string(), "Snack not found: 42");
    }
}
