//! Context passed to worker handlers.
//!
//! Scopes bus operations to the worker's identity and carries the
//! terminate request back to the run loop.

use std::sync::Arc;

use crate::bus::{Broadcast, Delivery, Event, MessageBus, WorkerId};
use crate::future::Future;

/// The context passed to every handler and start hook.
///
/// Everything a handler may do to the outside world goes through here:
/// send events and broadcasts, complete events it was given, or ask its own
/// run loop to stop.
pub struct Context<'a> {
    worker: &'a WorkerId,
    bus: &'a Arc<MessageBus>,
    terminate: bool,
}

impl<'a> Context<'a> {
    /// Create a context for `worker` on `bus`.
    ///
    /// The run loop builds one per dispatched message; handlers can also be
    /// driven directly with a context built here.
    pub fn new(worker: &'a WorkerId, bus: &'a Arc<MessageBus>) -> Self {
        Self {
            worker,
            bus,
            terminate: false,
        }
    }

    /// The worker's name.
    pub fn name(&self) -> &WorkerId {
        self.worker
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        self.bus
    }

    /// See [`MessageBus::send_event`].
    pub fn send_event<E: Event>(&self, event: E) -> Option<Future<E::Reply>> {
        self.bus.send_event(event)
    }

    /// See [`MessageBus::send_broadcast`].
    pub fn send_broadcast<B: Broadcast>(&self, broadcast: B) -> usize {
        self.bus.send_broadcast(broadcast)
    }

    /// See [`MessageBus::complete`].
    pub fn complete<E: Event>(&self, delivery: &Delivery<E>, result: E::Reply) -> bool {
        self.bus.complete(delivery, result)
    }

    /// Stop the run loop once the current handler returns.
    ///
    /// Messages still in the mailbox are abandoned.
    pub fn terminate(&mut self) {
        self.terminate = true;
    }

    pub fn is_terminating(&self) -> bool {
        self.terminate
    }
}
