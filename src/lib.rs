//! An in-process message bus for independently threaded workers.
//!
//! Workers exchange two kinds of messages through a shared [`MessageBus`]:
//! events, delivered round robin to one subscriber and answered through a
//! [`Future`], and broadcasts, delivered to every subscriber. The
//! [`service`] module runs workers on their own threads; the `fusion`
//! module builds a sensor-fusion pipeline on top of it.

pub mod bus;
mod error;
mod future;
pub mod service;
mod stats;

#[cfg(feature = "fusion")]
pub mod fusion;

pub use bus::{Broadcast, Delivery, Event, EventId, Message, MessageBus, MessageKind, WorkerId};
pub use error::BusError;
pub use future::{Future, TimedOut};
pub use service::{
    Context, HandlerError, Lifecycle, LifecycleProbe, Worker, WorkerError, WorkerOutcome,
    WorkerStats, WorkerThread,
};
pub use stats::{Statistics, StatisticsSnapshot};
