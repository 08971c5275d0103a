//! Deadline-bounded store calls.

use crate::error::{StoreError, StoreResult};
use crate::store::RecordStore;
use linkrelay_cdc::LinkRecord;
use parking_lot::Mutex;
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Calls that may wait behind a stalled one before new calls are refused.
const QUEUE_DEPTH: usize = 1024;

type Job<S> = Box<dyn FnOnce(&S) + Send>;

/// Wraps a store so that no call blocks the relay longer than `timeout`.
///
/// All calls run in submission order on one worker thread. When the deadline
/// passes the caller gets [`StoreError::Timeout`], but the call stays queued
/// and still runs before any later call, so a timed-out upsert can never
/// land after the delete that followed it. Once 1024 calls are
/// waiting behind a stall, new calls fail immediately without being queued.
pub struct TimeoutStore<S> {
    inner: Arc<S>,
    timeout: Duration,
    jobs: Mutex<SyncSender<Job<S>>>,
}

impl<S: RecordStore + 'static> TimeoutStore<S> {
    /// Wraps `inner` with the given per-call deadline and starts its worker.
    ///
    /// The worker exits once the store is dropped and its queue has drained.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the worker thread cannot be spawned.
    pub fn new(inner: Arc<S>, timeout: Duration) -> StoreResult<Self> {
        let (jobs, queue) = mpsc::sync_channel::<Job<S>>(QUEUE_DEPTH);
        let worker_store = Arc::clone(&inner);

        thread::Builder::new()
            .name("linkrelay-store".into())
            .spawn(move || {
                for job in queue {
                    job(worker_store.as_ref());
                }
                debug!("store worker stopped");
            })?;

        Ok(Self {
            inner,
            timeout,
            jobs: Mutex::new(jobs),
        })
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    /// Returns the per-call deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn call<T, F>(&self, operation: &'static str, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> StoreResult<T> + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        let job: Job<S> = Box::new(move |store| {
            // receiver is gone if the caller already timed out
            let _ = tx.send(f(store));
        });

        self.jobs.lock().try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => {
                warn!(operation, depth = QUEUE_DEPTH, "store queue full; call refused");
                StoreError::backend(format!(
                    "store call `{operation}` refused: {QUEUE_DEPTH} calls already queued"
                ))
            }
            TrySendError::Disconnected(_) => StoreError::backend("store worker has exited"),
        })?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "store call timed out; it stays queued"
                );
                Err(StoreError::Timeout {
                    operation,
                    timeout: self.timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(StoreError::backend(format!(
                "store worker for `{operation}` exited without a result"
            ))),
        }
    }
}

impl<S: RecordStore + 'static> RecordStore for TimeoutStore<S> {
    fn upsert(&self, record: LinkRecord) -> StoreResult<LinkRecord> {
        self.call("upsert", move |store| store.upsert(record))
    }

    fn get(&self, id: i64) -> StoreResult<Option<LinkRecord>> {
        self.call("get", move |store| store.get(id))
    }

    fn delete(&self, id: i64) -> StoreResult<()> {
        self.call("delete", move |store| store.delete(id))
    }

    fn find_by_short_code(&self, short_code: &str) -> StoreResult<Option<LinkRecord>> {
        let short_code = short_code.to_string();
        self.call("find_by_short_code", move |store| {
            store.find_by_short_code(&short_code)
        })
    }
}
