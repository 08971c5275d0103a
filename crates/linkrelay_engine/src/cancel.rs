//! Cooperative cancellation.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cloneable stop signal shared between the relay and its owner.
///
/// The relay checks the token between message pulls and sleeps on it during
/// reconnect backoff, so a cancel interrupts the delay immediately.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    /// Creates a token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation and wakes any sleeper.
    pub fn cancel(&self) {
        let (flag, cond) = &*self.inner;
        *flag.lock() = true;
        cond.notify_all();
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Sleeps for `duration` unless cancelled first.
    ///
    /// A duration too large to express as a deadline sleeps until cancelled.
    /// Returns true if the token was cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let (flag, cond) = &*self.inner;
        let deadline = Instant::now().checked_add(duration);
        let mut cancelled = flag.lock();
        while !*cancelled {
            match deadline {
                Some(deadline) => {
                    if cond.wait_until(&mut cancelled, deadline).timed_out() {
                        break;
                    }
                }
                None => cond.wait(&mut cancelled),
            }
        }
        *cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn sleep_runs_to_deadline() {
        let token = CancelToken::new();
        let start = Instant::now();
        assert!(!token.sleep(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn cancel_interrupts_sleep() {
        let token = CancelToken::new();
        let remote = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        let start = Instant::now();
        assert!(token.sleep(Duration::from_secs(30)));
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(token.is_cancelled());
        handle.join().unwrap();
    }

    #[test]
    fn unbounded_sleep_waits_for_cancel() {
        let token = CancelToken::new();
        let remote = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        assert!(token.sleep(Duration::from_millis(u64::MAX)));
        assert!(token.sleep(Duration::MAX));
        handle.join().unwrap();
    }

    #[test]
    fn cancelled_token_skips_sleep() {
        let token = CancelToken::new();
        token.cancel();
        assert!(token.sleep(Duration::from_secs(30)));
    }
}
