//! Session-scoped access to the store.
//!
//! `DietTracker` is the layer a request handler talks to: every call carries
//! the caller's session token, which is resolved to an owner before anything
//! touches the store. Unknown tokens fail with [`StoreError::SessionNotFound`];
//! [`StoreError::status_code`] turns any failure into a response status.

use crate::error::{Result, StoreError};
use crate::store::SnackStore;
use crate::summary::SummarySnapshot;
use crate::types::{Snack, SnackId, SnackInput, User, UserId};
use std::sync::Arc;
use tracing::warn;

/// Session-aware front for a [`SnackStore`].
#[derive(Clone)]
pub struct DietTracker {
    store: Arc<SnackStore>,
}

impl DietTracker {
    pub fn new(store: Arc<SnackStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &SnackStore {
        &self.store
    }

    /// Register a user and hand back their session.
    pub fn register(&self, username: &str) -> Result<User> {
        self.store.register_user(username)
    }

    /// Resolve a session token to its owner.
    pub fn owner(&self, session: &str) -> Result<UserId> {
        self.store.resolve_session(session).ok_or_else(|| {
            warn!("Rejected unknown session");
            StoreError::SessionNotFound
        })
    }

    pub fn list_snacks(&self, session: &str) -> Result<Vec<Snack>> {
        let owner = self.owner(session)?;
        self.store.list_snacks(owner)
    }

    pub fn get_snack(&self, session: &str, id: SnackId) -> Result<Snack> {
        let owner = self.owner(session)?;
        self.store
            .get_snack(owner, id)?
            .ok_or(StoreError::SnackNotFound(id))
    }

    pub fn create_snack(&self, session: &str, input: SnackInput) -> Result<Snack> {
        let owner = self.owner(session)?;
        self.store.create_snack(owner, input)
    }

    pub fn update_snack(&self, session: &str, id: SnackId, input: SnackInput) -> Result<Snack> {
        let owner = self.owner(session)?;
        self.store.update_snack(owner, id, input)
    }

    pub fn delete_snack(&self, session: &str, id: SnackId) -> Result<()> {
        let owner = self.owner(session)?;
        self.store.delete_snack(owner, id)
    }

    /// Diet summary for the session's owner.
    pub fn summary(&self, session: &str) -> Result<SummarySnapshot> {
        let owner = self.owner(session)?;
        self.store.summary(owner)
    }
}
