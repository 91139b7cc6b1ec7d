//! Single-assignment future used to carry an event's reply back to its sender.
//!
//! A `Future<T>` is a cheap handle (`Clone` shares the same slot). The bus
//! keeps one handle in its pending table and gives the other to the sender.
//! The first `resolve` wins; later calls are ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Returned by [`Future::get_timeout`] when the deadline passed before the
/// future was resolved.
///
/// Kept as its own type so "timed out" can never be mistaken for a resolved
/// value, even when `T` is `Option<_>` or `()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("future was not resolved within {0:?}")]
pub struct TimedOut(pub Duration);

struct Slot<T> {
    value: Mutex<Option<T>>,
    resolved: Condvar,
    done: AtomicBool,
}

/// A promised result that will eventually hold a value of type `T`.
///
/// ## Example
///
/// ```
/// use microbus::Future;
/// use std::time::Duration;
///
/// let future = Future::new();
/// assert!(!future.is_done());
///
/// assert!(future.resolve("first"));
/// assert!(!future.resolve("second"));
///
/// assert_eq!(future.get(), "first");
/// assert_eq!(future.get_timeout(Duration::from_millis(1)), Ok("first"));
/// ```
pub struct Future<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for Future<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Future")
            .field("done", &self.is_done())
            .finish()
    }
}

impl<T> Future<T> {
    /// Create an empty, unresolved future.
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Slot {
                value: Mutex::new(None),
                resolved: Condvar::new(),
                done: AtomicBool::new(false),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.slot
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `value` and wake every waiter, unless already resolved.
    ///
    /// Returns `true` if this call stored the value. Concurrent callers race
    /// on the slot mutex; exactly one of them returns `true`.
    pub fn resolve(&self, value: T) -> bool {
        let mut slot = self.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        self.slot.done.store(true, Ordering::Release);
        self.slot.resolved.notify_all();
        true
    }

    /// Non-blocking snapshot. Once `true`, always `true`.
    pub fn is_done(&self) -> bool {
        self.slot.done.load(Ordering::Acquire)
    }
}

impl<T: Clone> Future<T> {
    /// Block until resolved, then return a copy of the value.
    ///
    /// Blocks forever if nobody ever resolves the future.
    pub fn get(&self) -> T {
        let mut slot = self.lock();
        loop {
            if let Some(value) = slot.as_ref() {
                return value.clone();
            }
            slot = self
                .slot
                .resolved
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until resolved or until `timeout` elapses.
    pub fn get_timeout(&self, timeout: Duration) -> Result<T, TimedOut> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        loop {
            if let Some(value) = slot.as_ref() {
                return Ok(value.clone());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(TimedOut(timeout));
            }
            let (guard, _) = self
                .slot
                .resolved
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            slot = guard;
        }
    }

    /// Return the value if already resolved, without blocking.
    pub fn try_get(&self) -> Option<T> {
        self.lock().clone()
    }
}
