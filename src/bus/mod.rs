//! Message bus - registration, subscription and delivery.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 MessageBus (one per system)                 │
//! │  register / unregister                                      │
//! │  subscribe_event / subscribe_broadcast                      │
//! │  send_event / send_broadcast / complete                     │
//! │  await_message                                              │
//! └─────────────────────────────────────────────────────────────┘
//!          │                    │                     │
//!          ▼                    ▼                     ▼
//! ┌─────────────────┐  ┌──────────────────┐  ┌─────────────────────┐
//! │    Registry     │  │    Mailboxes     │  │   Pending replies   │
//! │ event → rotation│  │ worker → FIFO    │  │ event id → Future   │
//! │ bcast → set     │  │ (Condvar wait)   │  │                     │
//! └─────────────────┘  └──────────────────┘  └─────────────────────┘
//! ```
//!
//! Events go to exactly one subscriber, chosen round robin; broadcasts go to
//! every subscriber. Both land in the same per-worker mailbox, so a worker
//! sees messages in the order they were enqueued for it.

mod mailbox;
mod message;
mod message_bus;
mod registry;
mod worker_id;

pub use message::{Broadcast, Delivery, Event, EventId, Message, MessageKind};
pub use message_bus::MessageBus;
pub use worker_id::WorkerId;
