//! Record store port.

use crate::error::{StoreError, StoreResult};
use linkrelay_cdc::LinkRecord;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Target store for reconciled link records.
///
/// Calls are independent; no transactional or batching guarantees are
/// expected. Implementations must treat `upsert` as insert-or-replace keyed
/// by `id`, and report a delete of an absent record as
/// [`StoreError::NotFound`].
pub trait RecordStore: Send + Sync {
    /// Inserts the record, or replaces the record with the same `id`.
    fn upsert(&self, record: LinkRecord) -> StoreResult<LinkRecord>;

    /// Fetches a record by identifier.
    fn get(&self, id: i64) -> StoreResult<Option<LinkRecord>>;

    /// Removes a record by identifier.
    fn delete(&self, id: i64) -> StoreResult<()>;

    /// Fetches a record by short code.
    ///
    /// Short codes are not unique keys here; when several records carry the
    /// same code the one with the lowest id is returned.
    fn find_by_short_code(&self, short_code: &str) -> StoreResult<Option<LinkRecord>>;
}

/// An in-memory record store.
///
/// Counts every call so tests can assert that no store access happened.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<BTreeMap<i64, LinkRecord>>,
    calls: AtomicU64,
    failure: Mutex<Option<String>>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with a backend error, or clears it.
    pub fn set_failure(&self, message: Option<&str>) {
        *self.failure.lock() = message.map(str::to_string);
    }

    /// Returns the number of store calls made so far.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns all records ordered by id.
    pub fn records(&self) -> Vec<LinkRecord> {
        self.records.read().values().cloned().collect()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn enter(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure.lock().as_ref() {
            Some(message) => Err(StoreError::backend(message.clone())),
            None => Ok(()),
        }
    }
}

impl RecordStore for MemoryRecordStore {
    fn upsert(&self, record: LinkRecord) -> StoreResult<LinkRecord> {
        self.enter()?;
        self.records.write().insert(record.id, record.clone());
        Ok(record)
    }

    fn get(&self, id: i64) -> StoreResult<Option<LinkRecord>> {
        self.enter()?;
        Ok(self.records.read().get(&id).cloned())
    }

    fn delete(&self, id: i64) -> StoreResult<()> {
        self.enter()?;
        match self.records.write().remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound { id }),
        }
    }

    fn find_by_short_code(&self, short_code: &str) -> StoreResult<Option<LinkRecord>> {
        self.enter()?;
        Ok(self
            .records
            .read()
            .values()
            .find(|r| r.short_code == short_code)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(id: i64, code: &str, url: &str) -> LinkRecord {
        LinkRecord {
            id,
            short_code: code.into(),
            long_url: url.into(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            expires_at: None,
        }
    }

    #[test]
    fn upsert_replaces_whole_record() {
        let store = MemoryRecordStore::new();
        store.upsert(record(1, "abc", "http://x")).unwrap();
        store.upsert(record(1, "abd", "http://y")).unwrap();

        assert_eq!(store.len(), 1);
        let stored = store.get(1).unwrap().unwrap();
        assert_eq!(stored.short_code, "abd");
        assert_eq!(stored.long_url, "http://y");
        assert!(store.find_by_short_code("abc").unwrap().is_none());
    }

    #[test]
    fn delete_absent_is_not_found() {
        let store = MemoryRecordStore::new();
        store.upsert(record(5, "five", "http://5")).unwrap();
        store.delete(5).unwrap();
        assert!(store.delete(5).unwrap_err().is_not_found());
        assert!(store.is_empty());
    }

    #[test]
    fn shared_short_code_is_keyed_by_id() {
        let store = MemoryRecordStore::new();
        store.upsert(record(2, "same", "http://b")).unwrap();
        store.upsert(record(1, "same", "http://a")).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.find_by_short_code("same").unwrap().unwrap().id, 1);

        store.upsert(record(1, "other", "http://a")).unwrap();
        assert_eq!(store.find_by_short_code("same").unwrap().unwrap().id, 2);
    }

    #[test]
    fn injected_failure_and_call_count() {
        let store = MemoryRecordStore::new();
        store.set_failure(Some("connection refused"));
        assert!(matches!(
            store.upsert(record(1, "a", "b")),
            Err(StoreError::Backend(_))
        ));
        store.set_failure(None);
        store.upsert(record(1, "a", "b")).unwrap();
        assert_eq!(store.call_count(), 2);
        assert_eq!(store.records().len(), 1);
    }
}
