//! Message bus integration tests.
//!
//! - Round-robin distribution of events across subscribers
//! - Broadcast fan-out and per-mailbox ordering
//! - Unregister cleanup
//! - Concurrent senders, subscribers and completions

mod support;
mod concurrency;
mod delivery;
mod round_robin;
