//! Reconciliation of change events against the record store.

use crate::error::StoreError;
use crate::store::RecordStore;
use linkrelay_cdc::{decode, ChangeEvent, DecodeError, Operation};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Why an event was dropped without mutating the store.
#[derive(Debug)]
pub enum DropReason {
    /// The operation code is not one the relay acts on.
    UnknownOperation(String),
    /// The message was a log tombstone.
    Tombstone,
    /// The envelope itself could not be decoded.
    Malformed(DecodeError),
    /// The authoritative row image could not be converted.
    InvalidImage(DecodeError),
    /// The store rejected the call.
    StoreFailure(StoreError),
}

/// Result of reconciling one event.
///
/// Purely informational: every event is final once applied, whatever the
/// outcome.
#[derive(Debug)]
pub enum ApplyOutcome {
    /// The record was inserted or replaced.
    Upserted(i64),
    /// The record was removed.
    Deleted(i64),
    /// A delete found nothing to remove.
    AlreadyAbsent(i64),
    /// The event was logged and dropped.
    Dropped(DropReason),
}

impl ApplyOutcome {
    /// Returns true if the store was changed.
    pub fn is_mutation(&self) -> bool {
        matches!(self, ApplyOutcome::Upserted(_) | ApplyOutcome::Deleted(_))
    }

    /// Returns true if the event was dropped.
    pub fn is_dropped(&self) -> bool {
        matches!(self, ApplyOutcome::Dropped(_))
    }
}

/// Translates change events into store calls.
///
/// Upserts are full replaces and deletes of absent records succeed, so
/// applying the same event again leaves the store unchanged. Errors never
/// propagate: each failure is logged and reported as a dropped event.
pub struct Reconciler<S: RecordStore> {
    store: Arc<S>,
}

impl<S: RecordStore> Reconciler<S> {
    /// Creates a reconciler over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns the target store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Decodes a raw message body and applies it.
    ///
    /// An empty body is a log tombstone and is skipped.
    pub fn apply_raw(&self, raw: &[u8]) -> ApplyOutcome {
        match decode(raw) {
            Ok(event) => self.apply(&event),
            Err(DecodeError::Empty) => {
                debug!("tombstone skipped");
                ApplyOutcome::Dropped(DropReason::Tombstone)
            }
            Err(e) => {
                error!(error = %e, "failed to decode change envelope");
                ApplyOutcome::Dropped(DropReason::Malformed(e))
            }
        }
    }

    /// Applies one event to the store.
    pub fn apply(&self, event: &ChangeEvent) -> ApplyOutcome {
        match &event.operation {
            Operation::Create | Operation::Update | Operation::Read => self.upsert(event),
            Operation::Delete => self.delete(event),
            Operation::Unknown(code) => {
                info!(op = %code, table = ?event.table(), "no action taken for operation");
                ApplyOutcome::Dropped(DropReason::UnknownOperation(code.clone()))
            }
        }
    }

    fn upsert(&self, event: &ChangeEvent) -> ApplyOutcome {
        let record = match event.link_record() {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    op = event.operation.code(),
                    error = %e,
                    "invalid after image; event dropped"
                );
                return ApplyOutcome::Dropped(DropReason::InvalidImage(e));
            }
        };

        let id = record.id;
        let short_code = record.short_code.clone();
        match self.store.upsert(record) {
            Ok(_) => {
                info!(
                    op = event.operation.code(),
                    id,
                    short_code = %short_code,
                    "record upserted"
                );
                ApplyOutcome::Upserted(id)
            }
            Err(e) => {
                error!(id, short_code = %short_code, error = %e, "failed to upsert record");
                ApplyOutcome::Dropped(DropReason::StoreFailure(e))
            }
        }
    }

    fn delete(&self, event: &ChangeEvent) -> ApplyOutcome {
        let id = match event.deleted_id() {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "delete received without a numeric before.id; event dropped");
                return ApplyOutcome::Dropped(DropReason::InvalidImage(e));
            }
        };

        match self.store.delete(id) {
            Ok(()) => {
                info!(id, "record deleted");
                ApplyOutcome::Deleted(id)
            }
            Err(e) if e.is_not_found() => {
                debug!(id, "record not found; already deleted");
                ApplyOutcome::AlreadyAbsent(id)
            }
            Err(e) => {
                error!(id, error = %e, "failed to delete record");
                ApplyOutcome::Dropped(DropReason::StoreFailure(e))
            }
        }
    }
}
