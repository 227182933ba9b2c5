//! Main store tying the log, index and user registry together.

use crate::error::{Result, StoreError};
use crate::records::{EntryKind, LogEntry, SnackIndex, SnackLog};
use crate::summary::{get_summary, order_by_creation, RecordSource, SummarySnapshot};
use crate::types::{Snack, SnackId, SnackInput, StoreStats, Timestamp, User, UserId};
use crate::users::UserRegistry;
use fs2::FileExt;
use lru::LruCache;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Base path for the store.
    pub path: PathBuf,

    /// Decoded snack cache size (number of snacks).
    pub record_cache_size: usize,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,

    /// Fsync the snack log every N writes.
    pub sync_interval: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./dietlog"),
            record_cache_size: 1000,
            create_if_missing: true,
            sync_interval: SnackLog::DEFAULT_SYNC_INTERVAL,
        }
    }
}

/// Magic bytes for store manifest.
const STORE_MAGIC: &[u8; 4] = b"DLG\0";

/// Current store format version.
const STORE_VERSION: u8 = 1;

/// The snack store.
///
/// Provides a unified interface for:
/// - Logging, updating and deleting snacks per owner
/// - Listing an owner's snacks in creation order
/// - Registering users and resolving their sessions
/// - Computing diet summaries
pub struct SnackStore {
    /// Store configuration.
    config: StoreConfig,

    /// Lock file for exclusive access.
    _lock_file: File,

    /// Snack log.
    log: SnackLog,

    /// Snack index.
    index: SnackIndex,

    /// User registry.
    users: UserRegistry,

    /// Recently read snacks, keyed by the log offset they were decoded from.
    cache: Mutex<LruCache<(SnackId, u64), Snack>>,

    /// Lock for write operations to ensure atomicity.
    write_lock: Mutex<()>,
}

impl SnackStore {
    /// Open an existing store or create a new one.
    pub fn open_or_create(config: StoreConfig) -> Result<Self> {
        if config.path.join("MANIFEST").exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    /// Create a new store.
    pub fn create(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.path)?;

        let lock_file = Self::acquire_lock(&config.path)?;
        Self::write_manifest(&config.path)?;

        let log = SnackLog::open_with_sync_interval(
            config.path.join("snacks.log"),
            config.sync_interval,
        )?;
        let users = UserRegistry::load(config.path.join("users.bin"))?;
        users.save()?;

        info!(path = %config.path.display(), "Created snack store");

        Self::assemble(config, lock_file, log, users)
    }

    /// Open an existing store.
    pub fn open(config: StoreConfig) -> Result<Self> {
        Self::verify_manifest(&config.path)?;

        let lock_file = Self::acquire_lock(&config.path)?;

        let log = SnackLog::open_with_sync_interval(
            config.path.join("snacks.log"),
            config.sync_interval,
        )?;
        let users = UserRegistry::load(config.path.join("users.bin"))?;

        let store = Self::assemble(config, lock_file, log, users)?;

        info!(
            path = %store.config.path.display(),
            snacks = store.index.count(),
            users = store.users.user_count(),
            "Opened snack store"
        );

        Ok(store)
    }

    fn assemble(
        config: StoreConfig,
        lock_file: File,
        log: SnackLog,
        users: UserRegistry,
    ) -> Result<Self> {
        let index = SnackIndex::new();
        Self::rebuild_index(&log, &index)?;

        let cache_size = NonZeroUsize::new(config.record_cache_size.max(1))
            .unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            config,
            _lock_file: lock_file,
            log,
            index,
            users,
            cache: Mutex::new(LruCache::new(cache_size)),
            write_lock: Mutex::new(()),
        })
    }

    /// Replay the log into the index (not persisted).
    fn rebuild_index(log: &SnackLog, index: &SnackIndex) -> Result<()> {
        let mut entries = 0usize;
        for result in log.iter_from(0)? {
            let (offset, entry) = result?;
            index.apply(&entry, offset);
            entries += 1;
        }
        debug!(entries, live = index.count(), "Rebuilt snack index");
        Ok(())
    }

    // --- User Operations ---

    /// Register a user. The returned session token identifies them from
    /// now on.
    pub fn register_user(&self, username: &str) -> Result<User> {
        let _lock = self.write_lock.lock();
        self.users.create_user(username)
    }

    /// Resolve a session token to its owner.
    pub fn resolve_session(&self, token: &str) -> Option<UserId> {
        self.users.resolve_session(token)
    }

    /// Get a user by ID.
    pub fn get_user(&self, id: UserId) -> Option<User> {
        self.users.get_user(id)
    }

    // --- Snack Operations ---

    /// Log a new snack for `owner`.
    pub fn create_snack(&self, owner: UserId, input: SnackInput) -> Result<Snack> {
        input.validate()?;
        if self.users.get_user(owner).is_none() {
            return Err(StoreError::UserNotFound(owner));
        }

        let _lock = self.write_lock.lock();

        let snack = Snack {
            id: self.log.allocate_id(),
            owner,
            name: input.name,
            description: input.description,
            created_at: input.created_at.unwrap_or_else(Timestamp::now),
            on_diet: input.on_diet,
        };

        self.write(LogEntry::put(snack.clone()))?;
        debug!(owner = %owner, snack = %snack.id, on_diet = snack.on_diet, "Logged snack");

        Ok(snack)
    }

    /// Replace a snack's name, description and diet flag.
    ///
    /// The owner and creation time are kept; `input.created_at` is ignored.
    pub fn update_snack(&self, owner: UserId, id: SnackId, input: SnackInput) -> Result<Snack> {
        input.validate()?;

        let _lock = self.write_lock.lock();

        let current = self.owned_snack(owner, id)?;
        let snack = Snack {
            name: input.name,
            description: input.description,
            on_diet: input.on_diet,
            ..current
        };

        self.write(LogEntry::put(snack.clone()))?;
        debug!(owner = %owner, snack = %id, on_diet = snack.on_diet, "Updated snack");

        Ok(snack)
    }

    /// Delete a snack.
    pub fn delete_snack(&self, owner: UserId, id: SnackId) -> Result<()> {
        let _lock = self.write_lock.lock();

        let current = self.owned_snack(owner, id)?;
        self.write(LogEntry::delete(current))?;
        debug!(owner = %owner, snack = %id, "Deleted snack");

        Ok(())
    }

    /// Get one of `owner`'s snacks.
    pub fn get_snack(&self, owner: UserId, id: SnackId) -> Result<Option<Snack>> {
        match self.index.get_owned(owner, id) {
            Some(entry) => Ok(Some(self.read_snack(id, entry.offset)?)),
            None => Ok(None),
        }
    }

    /// All of `owner`'s snacks in creation order.
    pub fn list_snacks(&self, owner: UserId) -> Result<Vec<Snack>> {
        Ok(order_by_creation(self.fetch_records(owner)?))
    }

    /// Diet summary for `owner`. Owners without snacks get a zeroed summary.
    pub fn summary(&self, owner: UserId) -> Result<SummarySnapshot> {
        get_summary(self, owner)
    }

    // --- Store Operations ---

    /// Get store statistics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            snack_count: self.index.count() as u64,
            owner_count: self.index.owner_count() as u64,
            user_count: self.users.user_count() as u64,
            log_size_bytes: self.log.size(),
        }
    }

    /// Sync all data to disk.
    pub fn sync(&self) -> Result<()> {
        self.log.sync()?;
        self.users.save()?;
        Ok(())
    }

    /// Get the store path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    // --- Private Helpers ---

    /// Append to the log and bring index and cache in line.
    /// Caller holds the write lock.
    fn write(&self, entry: LogEntry) -> Result<()> {
        let id = entry.snack.id;
        let previous = self.index.get(id).map(|e| e.offset);

        let offset = self.log.append(&entry)?;
        self.index.apply(&entry, offset);

        let mut cache = self.cache.lock();
        if let Some(previous) = previous {
            cache.pop(&(id, previous));
        }
        if entry.kind == EntryKind::Put {
            cache.put((id, offset), entry.snack);
        }

        Ok(())
    }

    fn owned_snack(&self, owner: UserId, id: SnackId) -> Result<Snack> {
        let entry = self
            .index
            .get_owned(owner, id)
            .ok_or(StoreError::SnackNotFound(id))?;
        self.read_snack(id, entry.offset)
    }

    fn read_snack(&self, id: SnackId, offset: u64) -> Result<Snack> {
        // A reader racing an update may decode a superseded entry here. Keying
        // by offset keeps that copy from shadowing the newer one.
        if let Some(snack) = self.cache.lock().get(&(id, offset)).cloned() {
            return Ok(snack);
        }

        let entry = self.log.read_at(offset)?;
        if entry.kind != EntryKind::Put || entry.snack.id != id {
            return Err(StoreError::InvalidFormat(format!(
                "Index points snack {} at a foreign entry (offset {})",
                id, offset
            )));
        }

        self.cache.lock().put((id, offset), entry.snack.clone());
        Ok(entry.snack)
    }

    fn write_manifest(path: &Path) -> Result<()> {
        use std::io::Write;

        let manifest_path = path.join("MANIFEST");
        let mut file = File::create(manifest_path)?;

        file.write_all(STORE_MAGIC)?;
        file.write_all(&[STORE_VERSION])?;
        file.sync_all()?;

        Ok(())
    }

    fn verify_manifest(path: &Path) -> Result<()> {
        use std::io::Read;

        let manifest_path = path.join("MANIFEST");
        if !manifest_path.exists() {
            return Err(StoreError::NotInitialized);
        }
        let mut file = File::open(manifest_path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != STORE_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid store magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != STORE_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported store version: {}",
                version[0]
            )));
        }

        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_path = path.join("LOCK");
        let lock_file = File::create(lock_path)?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;

        Ok(lock_file)
    }
}

impl RecordSource for SnackStore {
    fn fetch_records(&self, owner: UserId) -> Result<Vec<Snack>> {
        self.index
            .ids_for_owner(owner)
            .into_iter()
            .filter_map(|id| self.index.get(id).map(|entry| (id, entry.offset)))
            .map(|(id, offset)| self.read_snack(id, offset))
            .collect()
    }
}

impl Drop for SnackStore {
    fn drop(&mut self) {
        // Best-effort sync on drop
        let _ = self.sync();
    }
}
