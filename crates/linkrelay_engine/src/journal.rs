//! File-backed record store.
//!
//! Every mutation is appended to a journal as one JSON line before it is
//! applied in memory. Opening the store replays the journal, so the mirrored
//! state survives restarts.
//!
//! # Format
//!
//! ```text
//! {"op":"upsert","record":{"id":1,"short_code":"abc",...}}
//! {"op":"delete","id":1}
//! ```
//!
//! A final line without a trailing newline is a torn write; it is discarded
//! on open and the file truncated back to the last complete entry. An append
//! that fails while the store is running is truncated away immediately.

use crate::error::{StoreError, StoreResult};
use crate::store::RecordStore;
use linkrelay_cdc::LinkRecord;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum JournalEntry {
    Upsert { record: LinkRecord },
    Delete { id: i64 },
}

/// A record store persisted to an append-only journal file.
#[derive(Debug)]
pub struct JournalRecordStore {
    path: PathBuf,
    records: RwLock<BTreeMap<i64, LinkRecord>>,
    file: Mutex<File>,
    sync_writes: bool,
}

impl JournalRecordStore {
    /// Opens or creates a journal at `path`, replaying existing entries.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be opened and
    /// [`StoreError::Corrupt`] if a complete line cannot be parsed.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;

        let (records, valid_len) = replay(&file)?;
        let file_len = file.metadata()?.len();
        if valid_len < file_len {
            warn!(
                path = %path.display(),
                discarded_bytes = file_len - valid_len,
                "discarding torn journal tail"
            );
            file.set_len(valid_len)?;
        }

        debug!(path = %path.display(), records = records.len(), "journal replayed");

        Ok(Self {
            path: path.to_path_buf(),
            records: RwLock::new(records),
            file: Mutex::new(file),
            sync_writes: false,
        })
    }

    /// Forces an `fsync` after every append.
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    /// Returns the journal path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns all records ordered by id.
    pub fn records(&self) -> Vec<LinkRecord> {
        self.records.read().values().cloned().collect()
    }

    /// Returns the number of live records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Rewrites the journal to one upsert per live record.
    ///
    /// The new journal is written beside the old one and renamed over it.
    pub fn compact(&self) -> StoreResult<()> {
        let records = self.records.read();
        let mut file = self.file.lock();

        let tmp_path = self.path.with_extension("compact");
        {
            let mut tmp = File::create(&tmp_path)?;
            for record in records.values() {
                let entry = JournalEntry::Upsert {
                    record: record.clone(),
                };
                tmp.write_all(&encode(&entry)?)?;
            }
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        *file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        debug!(path = %self.path.display(), records = records.len(), "journal compacted");
        Ok(())
    }

    fn append(&self, file: &mut File, entry: &JournalEntry) -> StoreResult<()> {
        let line = encode(entry)?;
        let sync_writes = self.sync_writes;
        append_or_rollback(file, &self.path, |file| {
            file.write_all(&line)?;
            file.flush()?;
            if sync_writes {
                file.sync_data()?;
            }
            Ok(())
        })
    }
}

/// Runs `write` against the journal and truncates the file back to its
/// previous length if it fails, so a partial line never prefixes the next
/// entry.
fn append_or_rollback(
    file: &mut File,
    path: &Path,
    write: impl FnOnce(&mut File) -> io::Result<()>,
) -> StoreResult<()> {
    let len = file.metadata()?.len();
    if let Err(e) = write(file) {
        match file.set_len(len) {
            Ok(()) => debug!(path = %path.display(), len, "failed journal append rolled back"),
            Err(truncate) => warn!(
                path = %path.display(),
                error = %truncate,
                "cannot roll back failed journal append"
            ),
        }
        return Err(e.into());
    }
    Ok(())
}

impl RecordStore for JournalRecordStore {
    fn upsert(&self, record: LinkRecord) -> StoreResult<LinkRecord> {
        let mut records = self.records.write();
        let entry = JournalEntry::Upsert {
            record: record.clone(),
        };
        self.append(&mut self.file.lock(), &entry)?;

        records.insert(record.id, record.clone());
        Ok(record)
    }

    fn get(&self, id: i64) -> StoreResult<Option<LinkRecord>> {
        Ok(self.records.read().get(&id).cloned())
    }

    fn delete(&self, id: i64) -> StoreResult<()> {
        let mut records = self.records.write();
        if !records.contains_key(&id) {
            return Err(StoreError::NotFound { id });
        }

        self.append(&mut self.file.lock(), &JournalEntry::Delete { id })?;
        records.remove(&id);
        Ok(())
    }

    fn find_by_short_code(&self, short_code: &str) -> StoreResult<Option<LinkRecord>> {
        Ok(self
            .records
            .read()
            .values()
            .find(|r| r.short_code == short_code)
            .cloned())
    }
}

fn encode(entry: &JournalEntry) -> StoreResult<Vec<u8>> {
    let mut line = serde_json::to_vec(entry).map_err(|e| StoreError::backend(e.to_string()))?;
    line.push(b'\n');
    Ok(line)
}

/// Replays the journal, returning the live records and the length of the
/// prefix made of complete entries.
fn replay(file: &File) -> StoreResult<(BTreeMap<i64, LinkRecord>, u64)> {
    let mut records = BTreeMap::new();
    let mut reader = BufReader::new(file);
    let mut line = String::new();
    let mut valid_len = 0u64;
    let mut line_no = 0usize;

    loop {
        line.clear();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            break;
        }
        line_no += 1;

        if !line.ends_with('\n') {
            // torn tail; truncated by the caller
            break;
        }

        let trimmed = line.trim();
        if !trimmed.is_empty() {
            let entry: JournalEntry =
                serde_json::from_str(trimmed).map_err(|e| StoreError::Corrupt {
                    line: line_no,
                    message: e.to_string(),
                })?;
            match entry {
                JournalEntry::Upsert { record } => {
                    records.insert(record.id, record);
                }
                JournalEntry::Delete { id } => {
                    records.remove(&id);
                }
            }
        }
        valid_len += read as u64;
    }

    Ok((records, valid_len))
}
