//! Append-only snack log.

use crate::error::{Result, StoreError};
use crate::types::{Snack, SnackId, Timestamp, UserId};
use parking_lot::{Mutex, RwLock};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Magic bytes for log entries.
const LOG_MAGIC: &[u8; 4] = b"SNK\0";

/// Current log format version.
const LOG_VERSION: u8 = 1;

/// Entry header size (fixed part).
const ENTRY_HEADER_SIZE: usize = 4 + 1 + 1 + 1 + 8 + 8 + 8; // magic + version + kind + flags + id + owner + created_at

/// Flag bit set when the snack is on diet.
const FLAG_ON_DIET: u8 = 0b0000_0001;

/// What an entry does to the snack it carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    /// Latest state of the snack (create or update).
    Put,
    /// The snack was removed.
    Delete,
}

impl EntryKind {
    fn to_byte(self) -> u8 {
        match self {
            EntryKind::Put => 0,
            EntryKind::Delete => 1,
        }
    }

    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(EntryKind::Put),
            1 => Ok(EntryKind::Delete),
            other => Err(StoreError::InvalidFormat(format!(
                "Unknown entry kind: {}",
                other
            ))),
        }
    }
}

/// One entry in the log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub kind: EntryKind,
    pub snack: Snack,
}

impl LogEntry {
    pub fn put(snack: Snack) -> Self {
        Self {
            kind: EntryKind::Put,
            snack,
        }
    }

    pub fn delete(snack: Snack) -> Self {
        Self {
            kind: EntryKind::Delete,
            snack,
        }
    }
}

/// Append-only snack log.
///
/// Every create, update and delete is written as a new entry; the latest
/// entry for an id is its current state.
pub struct SnackLog {
    /// Path to the log file.
    path: PathBuf,

    /// Log file handle.
    file: Mutex<File>,

    /// Next snack ID to assign.
    next_id: RwLock<u64>,

    /// Current file size (for appending).
    file_size: RwLock<u64>,

    /// Number of writes since last sync.
    writes_since_sync: Mutex<u64>,

    /// Sync every N writes.
    sync_interval: u64,
}

impl SnackLog {
    /// Default sync interval.
    pub const DEFAULT_SYNC_INTERVAL: u64 = 100;

    /// Open or create a log with default sync interval.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_sync_interval(path, Self::DEFAULT_SYNC_INTERVAL)
    }

    /// Open or create a log with custom sync interval.
    /// - sync_interval = 0 or 1: sync every write
    /// - sync_interval = 100: sync every 100 writes
    ///
    /// A torn entry at the tail (from a crash mid-write) is cut off.
    pub fn open_with_sync_interval(path: impl AsRef<Path>, sync_interval: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let file_size = file.metadata()?.len();

        let (max_id, valid_end) = if file_size > 0 {
            Self::scan(&path, file_size)?
        } else {
            (0, 0)
        };

        if valid_end < file_size {
            warn!(
                path = %path.display(),
                valid_end,
                file_size,
                "Truncating torn entry at end of snack log"
            );
            file.set_len(valid_end)?;
            file.sync_all()?;
        }

        debug!(path = %path.display(), size = valid_end, next_id = max_id + 1, "Opened snack log");

        Ok(Self {
            path,
            file: Mutex::new(file),
            next_id: RwLock::new(max_id + 1),
            file_size: RwLock::new(valid_end),
            writes_since_sync: Mutex::new(0),
            sync_interval: sync_interval.max(1),
        })
    }

    /// Reserve the next snack ID.
    pub fn allocate_id(&self) -> SnackId {
        let mut next = self.next_id.write();
        let id = SnackId(*next);
        *next += 1;
        id
    }

    /// Append an entry to the log.
    ///
    /// Returns the offset where it was written.
    pub fn append(&self, entry: &LogEntry) -> Result<u64> {
        let encoded = encode_entry(entry)?;
        let mut file = self.file.lock();

        let offset = *self.file_size.read();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&encoded)?;

        *self.file_size.write() = offset + encoded.len() as u64;

        let mut writes = self.writes_since_sync.lock();
        *writes += 1;
        if *writes >= self.sync_interval {
            file.sync_all()?;
            *writes = 0;
        }

        Ok(offset)
    }

    /// Force sync all pending writes to disk.
    pub fn sync(&self) -> Result<()> {
        let file = self.file.lock();
        file.sync_all()?;
        *self.writes_since_sync.lock() = 0;
        Ok(())
    }

    /// Read the entry at a given offset.
    pub fn read_at(&self, offset: u64) -> Result<LogEntry> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        let (entry, _) = read_entry(&mut *file)?;
        Ok(entry)
    }

    /// Iterate entries from a given offset up to the current end of the log.
    ///
    /// Uses its own file handle, so appends during iteration are not seen.
    pub fn iter_from(&self, offset: u64) -> Result<EntryIterator> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(EntryIterator {
            reader: BufReader::new(file),
            offset,
            end: *self.file_size.read(),
        })
    }

    /// Get current file size.
    pub fn size(&self) -> u64 {
        *self.file_size.read()
    }

    /// Walk the log, returning the highest id and the end of the last
    /// complete entry.
    fn scan(path: &Path, file_size: u64) -> Result<(u64, u64)> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut max_id = 0u64;
        let mut offset = 0u64;

        while offset < file_size {
            match read_entry(&mut reader) {
                Ok((entry, len)) => {
                    max_id = max_id.max(entry.snack.id.0);
                    offset += len;
                }
                Err(StoreError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
        }

        Ok((max_id, offset))
    }
}

/// Iterator over entries in the log.
pub struct EntryIterator {
    reader: BufReader<File>,
    offset: u64,
    end: u64,
}

impl Iterator for EntryIterator {
    type Item = Result<(u64, LogEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.end {
            return None;
        }

        let current_offset = self.offset;
        match read_entry(&mut self.reader) {
            Ok((entry, len)) => {
                self.offset += len;
                Some(Ok((current_offset, entry)))
            }
            Err(e) => {
                self.offset = self.end; // Stop iteration on error
                Some(Err(e))
            }
        }
    }
}

fn encode_entry(entry: &LogEntry) -> Result<Vec<u8>> {
    let snack = &entry.snack;
    let name = snack.name.as_bytes();
    let description = snack.description.as_bytes();

    let name_len = u16::try_from(name.len())
        .map_err(|_| StoreError::Serialization("Snack name too long".into()))?;
    let description_len = u16::try_from(description.len())
        .map_err(|_| StoreError::Serialization("Snack description too long".into()))?;

    let mut buf =
        Vec::with_capacity(ENTRY_HEADER_SIZE + 4 + name.len() + description.len() + 4);

    buf.extend_from_slice(LOG_MAGIC);
    buf.push(LOG_VERSION);
    buf.push(entry.kind.to_byte());
    buf.push(if snack.on_diet { FLAG_ON_DIET } else { 0 });
    buf.extend_from_slice(&snack.id.0.to_le_bytes());
    buf.extend_from_slice(&snack.owner.0.to_le_bytes());
    buf.extend_from_slice(&snack.created_at.0.to_le_bytes());

    buf.extend_from_slice(&name_len.to_le_bytes());
    buf.extend_from_slice(name);
    buf.extend_from_slice(&description_len.to_le_bytes());
    buf.extend_from_slice(description);

    // Checksum covers everything after magic and version
    let checksum = crc32fast::hash(&buf[5..]);
    buf.extend_from_slice(&checksum.to_le_bytes());

    Ok(buf)
}

/// Read one entry, returning it with its encoded length.
fn read_entry(reader: &mut impl Read) -> Result<(LogEntry, u64)> {
    let mut header = [0u8; ENTRY_HEADER_SIZE];
    reader.read_exact(&mut header)?;

    if &header[0..4] != LOG_MAGIC {
        return Err(StoreError::InvalidFormat("Invalid entry magic".into()));
    }
    if header[4] != LOG_VERSION {
        return Err(StoreError::InvalidFormat(format!(
            "Unsupported log version: {}",
            header[4]
        )));
    }

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&header[5..]);

    let kind = EntryKind::from_byte(header[5])?;
    let flags = header[6];
    let id = SnackId(read_u64(&header[7..15]));
    let owner = UserId(read_u64(&header[15..23]));
    let created_at = Timestamp(read_u64(&header[23..31]) as i64);

    let name = read_text(reader, &mut hasher)?;
    let description = read_text(reader, &mut hasher)?;

    let mut checksum_bytes = [0u8; 4];
    reader.read_exact(&mut checksum_bytes)?;
    let stored_checksum = u32::from_le_bytes(checksum_bytes);
    let computed_checksum = hasher.finalize();

    if stored_checksum != computed_checksum {
        return Err(StoreError::ChecksumMismatch {
            expected: stored_checksum,
            got: computed_checksum,
        });
    }

    let len = (ENTRY_HEADER_SIZE + 2 + name.len() + 2 + description.len() + 4) as u64;
    let name = into_string(name)?;
    let description = into_string(description)?;

    Ok((
        LogEntry {
            kind,
            snack: Snack {
                id,
                owner,
                name,
                description,
                created_at,
                on_diet: flags & FLAG_ON_DIET != 0,
            },
        },
        len,
    ))
}

fn read_text(reader: &mut impl Read, hasher: &mut crc32fast::Hasher) -> Result<Vec<u8>> {
    let mut len_bytes = [0u8; 2];
    reader.read_exact(&mut len_bytes)?;
    hasher.update(&len_bytes);

    let mut bytes = vec![0u8; u16::from_le_bytes(len_bytes) as usize];
    reader.read_exact(&mut bytes)?;
    hasher.update(&bytes);

    Ok(bytes)
}

fn into_string(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| StoreError::Deserialization(e.to_string()))
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut arr = [0u8; 8];
    arr.copy_from_slice(bytes);
    u64::from_le_bytes(arr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn snack(id: u64, on_diet: bool) -> Snack {
        Snack {
            id: SnackId(id),
            owner: UserId(1),
            name: format!("snack {}", id),
            description: "tasty".into(),
            created_at: Timestamp(1_000 + id as i64),
            on_diet,
        }
    }

    #[test]
    fn test_append_and_read() {
        let dir = TempDir::new().unwrap();
        let log = SnackLog::open(dir.path().join("snacks.log")).unwrap();

        let id = log.allocate_id();
        assert_eq!(id, SnackId(1));

        let entry = LogEntry::put(snack(id.0, true));
        let offset = log.append(&entry).unwrap();
        assert_eq!(offset, 0);

        let read = log.read_at(offset).unwrap();
        assert_eq!(read, entry);
    }

    #[test]
    fn test_iterate_entries() {
        let dir = TempDir::new().unwrap();
        let log = SnackLog::open(dir.path().join("snacks.log")).unwrap();

        for i in 1..=10 {
            let id = log.allocate_id();
            log.append(&LogEntry::put(snack(id.0, i % 2 == 0))).unwrap();
        }
        log.append(&LogEntry::delete(snack(3, false))).unwrap();

        let entries: Vec<_> = log.iter_from(0).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(entries.len(), 11);
        assert_eq!(entries[1].1.snack.id, SnackId(2));
        assert!(entries[1].1.snack.on_diet);
        assert_eq!(entries[10].1.kind, EntryKind::Delete);

        // Offsets returned by the iterator are readable directly
        let (offset, entry) = &entries[4];
        assert_eq!(&log.read_at(*offset).unwrap(), entry);
    }

    #[test]
    fn test_persistence_continues_ids() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snacks.log");

        {
            let log = SnackLog::open(&path).unwrap();
            for _ in 1..=5 {
                let id = log.allocate_id();
                log.append(&LogEntry::put(snack(id.0, true))).unwrap();
            }
        }

        {
            let log = SnackLog::open(&path).unwrap();
            assert_eq!(log.iter_from(0).unwrap().count(), 5);
            assert_eq!(log.allocate_id(), SnackId(6));
        }
    }

    #[test]
    fn test_torn_tail_is_truncated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snacks.log");

        let good_size = {
            let log = SnackLog::open(&path).unwrap();
            let id = log.allocate_id();
            log.append(&LogEntry::put(snack(id.0, true))).unwrap();
            log.sync().unwrap();
            log.size()
        };

        // Half-written second entry
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&LOG_MAGIC[..]).unwrap();
            file.write_all(&[LOG_VERSION, 0, 1]).unwrap();
        }

        let log = SnackLog::open(&path).unwrap();
        assert_eq!(log.size(), good_size);
        assert_eq!(log.iter_from(0).unwrap().count(), 1);
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snacks.log");

        {
            let log = SnackLog::open(&path).unwrap();
            log.append(&LogEntry::put(snack(1, true))).unwrap();
            log.sync().unwrap();
        }

        // Flip a byte inside the name
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[ENTRY_HEADER_SIZE + 2] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        let result = SnackLog::open(&path);
        assert!(matches!(result, Err(StoreError::ChecksumMismatch { .. })));
    }
}
