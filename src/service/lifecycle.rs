//! Worker lifecycle stages and a probe to observe them from other threads.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::trace;

/// Stages a worker moves through, in order. A worker never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lifecycle {
    Created,
    Registered,
    Running,
    Terminating,
    Unregistered,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::Created => "created",
            Lifecycle::Registered => "registered",
            Lifecycle::Running => "running",
            Lifecycle::Terminating => "terminating",
            Lifecycle::Unregistered => "unregistered",
        };
        f.write_str(name)
    }
}

struct Stage {
    current: Mutex<Lifecycle>,
    changed: Condvar,
}

/// Shared view of a worker's current [`Lifecycle`] stage.
///
/// Obtained from [`Worker::lifecycle`](super::Worker::lifecycle) before the
/// worker is started; clones observe the same worker.
#[derive(Clone)]
pub struct LifecycleProbe {
    stage: Arc<Stage>,
}

impl Default for LifecycleProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LifecycleProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LifecycleProbe")
            .field(&self.current())
            .finish()
    }
}

impl LifecycleProbe {
    pub(crate) fn new() -> Self {
        Self {
            stage: Arc::new(Stage {
                current: Mutex::new(Lifecycle::Created),
                changed: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.stage
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current(&self) -> Lifecycle {
        *self.lock()
    }

    /// Move forward to `next`. Requests to move backwards are ignored.
    pub(crate) fn advance(&self, next: Lifecycle) {
        let mut current = self.lock();
        if next > *current {
            let from = *current;
            trace!(%from, to = %next, "lifecycle");
            *current = next;
            self.stage.changed.notify_all();
        }
    }

    /// Block until the worker has reached `stage` (or any later one).
    pub fn wait_for(&self, stage: Lifecycle) -> Lifecycle {
        let mut current = self.lock();
        while *current < stage {
            current = self
                .stage
                .changed
                .wait(current)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *current
    }

    /// Like [`wait_for`](Self::wait_for) with a deadline. Returns `None` on timeout.
    pub fn wait_for_timeout(&self, stage: Lifecycle, timeout: Duration) -> Option<Lifecycle> {
        let deadline = Instant::now() + timeout;
        let mut current = self.lock();
        while *current < stage {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = self
                .stage
                .changed
                .wait_timeout(current, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            current = guard;
        }
        Some(*current)
    }
}
