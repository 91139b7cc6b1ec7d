//! Background thread for a worker.
//!
//! `WorkerThread` moves a [`Worker`] onto its own named OS thread and hands
//! back its final state and statistics when joined.

use std::any::Any;
use std::thread::{self, JoinHandle};

use tracing::error;

use super::error::WorkerError;
use super::lifecycle::LifecycleProbe;
use super::worker::{Worker, WorkerOutcome};
use crate::bus::WorkerId;
use crate::error::BusError;

/// A worker running on a background thread.
///
/// The thread ends when the worker terminates itself; there is no external
/// stop signal. Send the worker a message it terminates on instead.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use microbus::{Broadcast, MessageBus, Worker, WorkerThread};
///
/// struct Shutdown;
/// impl Broadcast for Shutdown {}
///
/// let bus = Arc::new(MessageBus::new());
/// let worker = Worker::new("idle", bus.clone(), ())
///     .on_broadcast::<Shutdown, _>(|_, ctx, _| {
///         ctx.terminate();
///         Ok(())
///     });
///
/// let handle = WorkerThread::spawn(worker).unwrap();
/// handle.lifecycle().wait_for(microbus::Lifecycle::Running);
/// bus.send_broadcast(Shutdown);
///
/// let outcome = handle.join().unwrap();
/// assert_eq!(outcome.stats.broadcasts_handled, 1);
/// ```
pub struct WorkerThread<S> {
    name: WorkerId,
    lifecycle: LifecycleProbe,
    handle: JoinHandle<Result<WorkerOutcome<S>, BusError>>,
}

impl<S: Send + 'static> WorkerThread<S> {
    /// Spawn `worker` on a thread named after it.
    pub fn spawn(worker: Worker<S>) -> Result<Self, WorkerError> {
        let name = worker.name().clone();
        let lifecycle = worker.lifecycle();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker.run())?;

        Ok(Self {
            name,
            lifecycle,
            handle,
        })
    }

    pub fn name(&self) -> &WorkerId {
        &self.name
    }

    pub fn lifecycle(&self) -> &LifecycleProbe {
        &self.lifecycle
    }

    /// Whether the thread has finished running.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker to terminate and collect its outcome.
    pub fn join(self) -> Result<WorkerOutcome<S>, WorkerError> {
        match self.handle.join() {
            Ok(outcome) => Ok(outcome?),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(worker = %self.name, %message, "worker panicked");
                Err(WorkerError::Panicked {
                    worker: self.name,
                    message,
                })
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
