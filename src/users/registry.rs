//! User registry implementation.

use crate::error::{Result, StoreError};
use crate::types::{SessionToken, Timestamp, User, UserId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Magic bytes for user registry file.
const USER_INDEX_MAGIC: &[u8; 4] = b"USR\0";

/// Current user registry format version.
const USER_INDEX_VERSION: u8 = 1;

/// User index stored on disk.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct UserIndex {
    /// All users by ID.
    users: HashMap<UserId, User>,

    /// Session token to user ID.
    session_to_id: HashMap<String, UserId>,

    /// Next user ID to assign.
    next_id: u64,
}

/// Registered users and the sessions that identify them.
pub struct UserRegistry {
    /// Path to registry file.
    path: PathBuf,

    /// In-memory index.
    index: RwLock<UserIndex>,
}

impl UserRegistry {
    /// Create an empty registry.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            index: RwLock::new(UserIndex {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Load registry from file, or start empty if it doesn't exist yet.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let registry = Self::new(path);

        if registry.path.exists() {
            registry.load_from_file()?;
        }

        Ok(registry)
    }

    /// Register a user and issue their session token.
    ///
    /// The registry file is rewritten before the call returns. If that fails
    /// the user is dropped again and the token never resolves.
    pub fn create_user(&self, username: &str) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(StoreError::InvalidInput("username must not be empty".into()));
        }

        let mut index = self.index.write();

        let id = UserId(index.next_id);
        index.next_id += 1;

        let user = User {
            id,
            username: username.to_string(),
            session: SessionToken::generate(id),
            created: Timestamp::now(),
        };

        index
            .session_to_id
            .insert(user.session.as_str().to_string(), id);
        index.users.insert(id, user.clone());

        if let Err(e) = self.write_file(&index) {
            index.users.remove(&id);
            index.session_to_id.remove(user.session.as_str());
            index.next_id -= 1;
            return Err(e);
        }

        debug!(user = %id, username, "Registered user");

        Ok(user)
    }

    /// Resolve a session token to its user.
    pub fn resolve_session(&self, token: &str) -> Option<UserId> {
        self.index.read().session_to_id.get(token).copied()
    }

    /// Get a user by ID.
    pub fn get_user(&self, id: UserId) -> Option<User> {
        self.index.read().users.get(&id).cloned()
    }

    /// Number of registered users.
    pub fn user_count(&self) -> usize {
        self.index.read().users.len()
    }

    /// Save registry to file.
    pub fn save(&self) -> Result<()> {
        self.write_file(&self.index.read())
    }

    fn write_file(&self, index: &UserIndex) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;

        file.write_all(USER_INDEX_MAGIC)?;
        file.write_all(&[USER_INDEX_VERSION])?;

        // Serialize index with MessagePack
        let encoded = rmp_serde::to_vec(index)?;

        file.write_all(&(encoded.len() as u64).to_le_bytes())?;
        file.write_all(&encoded)?;

        file.sync_all()?;
        Ok(())
    }

    fn load_from_file(&self) -> Result<()> {
        let mut file = File::open(&self.path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != USER_INDEX_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid user registry magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != USER_INDEX_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported user registry version: {}",
                version[0]
            )));
        }

        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes) as usize;

        let mut encoded = vec![0u8; len];
        file.read_exact(&mut encoded)?;

        let index: UserIndex = rmp_serde::from_slice(&encoded)?;
        *self.index.write() = index;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_and_resolve() {
        let dir = TempDir::new().unwrap();
        let registry = UserRegistry::new(dir.path().join("users.bin"));

        let alice = registry.create_user("alice").unwrap();
        let bob = registry.create_user("bob").unwrap();

        assert_eq!(alice.id, UserId(1));
        assert_eq!(bob.id, UserId(2));
        assert_eq!(registry.resolve_session(alice.session.as_str()), Some(alice.id));
        assert_eq!(registry.resolve_session(bob.session.as_str()), Some(bob.id));
        assert_eq!(registry.resolve_session("not-a-session"), None);
    }

    #[test]
    fn test_blank_username_rejected() {
        let dir = TempDir::new().unwrap();
        let registry = UserRegistry::new(dir.path().join("users.bin"));

        let result = registry.create_user("  ");
        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
        assert_eq!(registry.user_count(), 0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.bin");

        let alice = {
            let registry = UserRegistry::new(&path);
            let alice = registry.create_user("alice").unwrap();
            registry.save().unwrap();
            alice
        };

        let registry = UserRegistry::load(&path).unwrap();
        assert_eq!(registry.user_count(), 1);
        assert_eq!(registry.resolve_session(alice.session.as_str()), Some(alice.id));
        assert_eq!(registry.get_user(alice.id).unwrap().username, "alice");

        // IDs keep counting after reload
        let bob = registry.create_user("bob").unwrap();
        assert_eq!(bob.id, UserId(2));
    }

    #[test]
    fn test_load_rejects_bad_magic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.bin");
        std::fs::write(&path, b"NOPE\x01").unwrap();

        let result = UserRegistry::load(&path);
        assert!(matches!(result, Err(StoreError::InvalidFormat(_))));
    }

    #[test]
    fn test_failed_save_drops_new_user() {
        let dir = TempDir::new().unwrap();
        let registry = UserRegistry::new(dir.path().join("missing").join("users.bin"));

        let result = registry.create_user("alice");
        assert!(matches!(result, Err(StoreError::Io(_))));
        assert_eq!(registry.user_count(), 0);
        assert!(registry.get_user(UserId(1)).is_none());

        std::fs::create_dir(dir.path().join("missing")).unwrap();
        let alice = registry.create_user("alice").unwrap();
        assert_eq!(alice.id, UserId(1));
        assert_eq!(registry.resolve_session(alice.session.as_str()), Some(alice.id));
    }
}
