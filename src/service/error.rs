//! Error types for worker handlers and worker threads.

use std::error::Error;

use crate::bus::WorkerId;
use crate::error::BusError;

/// Error returned by an event or broadcast handler.
///
/// The run loop logs it, counts it in [`WorkerStats::failed`](super::WorkerStats)
/// and keeps dispatching. A worker that cannot continue is expected to
/// announce it on the bus and terminate itself instead.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Business logic refused the message.
    #[error("rejected: {0}")]
    Rejected(String),
    /// The message was routed to a handler for a different type.
    #[error("message {0} does not match its handler")]
    MessageMismatch(&'static str),
    /// Bus error.
    #[error("bus error: {0}")]
    Bus(#[from] BusError),
    /// The final report could not be delivered.
    #[cfg(feature = "fusion")]
    #[error("report error: {0}")]
    Report(#[from] crate::fusion::ReportError),
    /// Other error.
    #[error("handler error: {0}")]
    Other(Box<dyn Error + Send + Sync>),
}

impl HandlerError {
    pub fn other(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        HandlerError::Other(err.into())
    }
}

/// Error returned when a worker thread is spawned or joined.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The run loop stopped because the bus no longer knows the worker.
    #[error(transparent)]
    Bus(#[from] BusError),
    /// The worker thread panicked.
    #[error("worker {worker} panicked: {message}")]
    Panicked { worker: WorkerId, message: String },
    /// The OS refused to start the thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
