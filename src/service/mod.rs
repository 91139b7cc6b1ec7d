//! Worker runtime: handler registration, the run loop and worker threads.
//!
//! A [`Worker`] owns some state and a set of typed handlers. Running it
//! registers the worker with the bus, subscribes it to every message type it
//! handles, runs its start hooks, and then processes its mailbox one message
//! at a time until a handler calls [`Context::terminate`].
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use microbus::{Event, Lifecycle, MessageBus, Worker, WorkerThread};
//!
//! struct Double(i64);
//! impl Event for Double {
//!     type Reply = i64;
//! }
//!
//! let bus = Arc::new(MessageBus::new());
//! let doubler = Worker::new("doubler", bus.clone(), ())
//!     .on_event::<Double, _>(|_, ctx, job| {
//!         ctx.complete(&job, job.0 * 2);
//!         ctx.terminate();
//!         Ok(())
//!     });
//!
//! let handle = WorkerThread::spawn(doubler).unwrap();
//! handle.lifecycle().wait_for(Lifecycle::Running);
//!
//! assert_eq!(bus.send_event(Double(21)).unwrap().get(), 42);
//! handle.join().unwrap();
//! ```

mod context;
mod error;
mod lifecycle;
mod thread;
mod worker;

pub use context::Context;
pub use error::{HandlerError, WorkerError};
pub use lifecycle::{Lifecycle, LifecycleProbe};
pub use thread::WorkerThread;
pub use worker::{Worker, WorkerOutcome, WorkerStats};
