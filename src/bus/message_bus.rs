//! The broker shared by every worker.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace, warn};

use super::mailbox::Mailbox;
use super::registry::Registry;
use super::{Broadcast, Delivery, Event, EventId, Message, WorkerId};
use crate::error::BusError;
use crate::future::Future;

/// In-memory message broker.
///
/// Holds one mailbox per registered worker, the subscriber registry, and the
/// table of futures for events that have not been completed yet. All state is
/// kept in sharded maps, so operations on different workers, message types
/// or events proceed in parallel.
///
/// The bus is an ordinary value: construct one, wrap it in an `Arc`, and hand
/// it to every worker. Independent buses never share state.
///
/// ## Example
///
/// ```
/// use microbus::{Event, MessageBus, WorkerId};
///
/// struct Greet(&'static str);
/// impl Event for Greet {
///     type Reply = String;
/// }
///
/// let bus = MessageBus::new();
/// let greeter = WorkerId::new("greeter");
/// bus.register(&greeter);
/// bus.subscribe_event::<Greet>(&greeter);
///
/// let future = bus.send_event(Greet("pat")).expect("greeter is subscribed");
///
/// let delivery = bus
///     .await_message(&greeter)
///     .unwrap()
///     .into_event::<Greet>()
///     .unwrap();
/// bus.complete(&delivery, format!("hello {}", delivery.0));
///
/// assert_eq!(future.get(), "hello pat");
/// ```
pub struct MessageBus {
    mailboxes: DashMap<WorkerId, Arc<Mailbox>>,
    registry: Registry,
    /// Event id → `Future<E::Reply>` (type-erased).
    pending: DashMap<EventId, Box<dyn Any + Send + Sync>>,
    next_event_id: AtomicU64,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("registered", &self.mailboxes.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            mailboxes: DashMap::new(),
            registry: Registry::new(),
            pending: DashMap::new(),
            next_event_id: AtomicU64::new(1),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Allocate an empty mailbox for `worker`. Idempotent.
    ///
    /// Returns `true` if a new mailbox was created.
    pub fn register(&self, worker: &WorkerId) -> bool {
        let mut created = false;
        self.mailboxes.entry(worker.clone()).or_insert_with(|| {
            created = true;
            Arc::new(Mailbox::new())
        });
        if created {
            debug!(worker = %worker, "registered");
        }
        created
    }

    /// Remove the worker's mailbox and every subscription it holds.
    ///
    /// A thread blocked in [`await_message`](Self::await_message) for this
    /// worker wakes up with [`BusError::NotRegistered`]. Messages still queued
    /// are discarded; events among them stay unresolved and are dropped from
    /// the pending table.
    pub fn unregister(&self, worker: &WorkerId) {
        self.registry.remove_worker(worker);

        let Some((_, mailbox)) = self.mailboxes.remove(worker) else {
            trace!(worker = %worker, "unregister of unknown worker");
            return;
        };

        let abandoned = mailbox.close();
        for id in abandoned.iter().filter_map(Message::event_id) {
            self.pending.remove(&id);
        }
        debug!(worker = %worker, abandoned = abandoned.len(), "unregistered");
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Add `worker` to the round-robin rotation for events of type `E`.
    ///
    /// A worker already in the rotation keeps its position.
    pub fn subscribe_event<E: Event>(&self, worker: &WorkerId) {
        if self.registry.subscribe_event(TypeId::of::<E>(), worker) {
            trace!(worker = %worker, event = std::any::type_name::<E>(), "subscribed to event");
        }
    }

    /// Add `worker` to the recipients of broadcasts of type `B`.
    pub fn subscribe_broadcast<B: Broadcast>(&self, worker: &WorkerId) {
        if self.registry.subscribe_broadcast(TypeId::of::<B>(), worker) {
            trace!(worker = %worker, broadcast = std::any::type_name::<B>(), "subscribed to broadcast");
        }
    }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Deliver `event` to the next subscriber of its type, round robin.
    ///
    /// Returns `None` when nobody is subscribed: nothing is enqueued and no
    /// reply will ever come. Otherwise returns the future the receiving
    /// worker resolves through [`complete`](Self::complete).
    pub fn send_event<E: Event>(&self, event: E) -> Option<Future<E::Reply>> {
        let type_id = TypeId::of::<E>();
        let Some((mut worker, rotation_len)) = self.registry.rotate(type_id) else {
            debug!(event = std::any::type_name::<E>(), "no subscribers for event");
            return None;
        };

        let id = EventId(self.next_event_id.fetch_add(1, Ordering::Relaxed));
        let event = Arc::new(event);
        let future = Future::new();

        // A subscriber can be unregistered between rotation and enqueue; fall
        // through to the next one, at most once around the rotation.
        for attempt in 0..rotation_len {
            if attempt > 0 {
                match self.registry.rotate(type_id) {
                    Some((next, _)) => worker = next,
                    None => break,
                }
            }
            let Some(mailbox) = self.mailbox(&worker) else {
                continue;
            };

            // The reply slot must exist before the receiver can see the event.
            self.pending.insert(id, Box::new(future.clone()));
            match mailbox.push(Message::event(id, Arc::clone(&event))) {
                Ok(()) => {
                    trace!(worker = %worker, event = std::any::type_name::<E>(), %id, "event enqueued");
                    return Some(future);
                }
                Err(_) => {
                    self.pending.remove(&id);
                }
            }
        }

        debug!(event = std::any::type_name::<E>(), "no live subscribers for event");
        None
    }

    /// Deliver `broadcast` to every current subscriber of its type.
    ///
    /// Returns the number of mailboxes it was enqueued on.
    pub fn send_broadcast<B: Broadcast>(&self, broadcast: B) -> usize {
        let targets = self.registry.broadcast_targets(TypeId::of::<B>());
        if targets.is_empty() {
            trace!(broadcast = std::any::type_name::<B>(), "no subscribers for broadcast");
            return 0;
        }

        let broadcast = Arc::new(broadcast);
        let mut delivered = 0;
        for worker in &targets {
            let Some(mailbox) = self.mailbox(worker) else {
                continue;
            };
            if mailbox.push(Message::broadcast(Arc::clone(&broadcast))).is_ok() {
                delivered += 1;
            }
        }
        trace!(broadcast = std::any::type_name::<B>(), delivered, "broadcast enqueued");
        delivered
    }

    // ========================================================================
    // Replies
    // ========================================================================

    /// Resolve the future of a delivered event with `result`.
    ///
    /// Completing an event twice, or one that never went through this bus,
    /// does nothing and returns `false`.
    pub fn complete<E: Event>(&self, delivery: &Delivery<E>, result: E::Reply) -> bool {
        let Some((id, slot)) = self.pending.remove(&delivery.id()) else {
            trace!(id = %delivery.id(), "completion without pending entry");
            return false;
        };
        match slot.downcast::<Future<E::Reply>>() {
            Ok(future) => future.resolve(result),
            Err(_) => {
                warn!(%id, event = std::any::type_name::<E>(), "reply type mismatch");
                false
            }
        }
    }

    // ========================================================================
    // Receiving
    // ========================================================================

    /// Block until `worker` has a message and return the oldest one.
    ///
    /// Fails with [`BusError::NotRegistered`] if the worker has no mailbox,
    /// or loses it while waiting.
    pub fn await_message(&self, worker: &WorkerId) -> Result<Message, BusError> {
        let mailbox = self
            .mailbox(worker)
            .ok_or_else(|| BusError::NotRegistered(worker.clone()))?;
        mailbox
            .pop()
            .ok_or_else(|| BusError::NotRegistered(worker.clone()))
    }

    fn mailbox(&self, worker: &WorkerId) -> Option<Arc<Mailbox>> {
        self.mailboxes.get(worker).map(|m| Arc::clone(m.value()))
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn is_registered(&self, worker: &WorkerId) -> bool {
        self.mailboxes.contains_key(worker)
    }

    pub fn registered_count(&self) -> usize {
        self.mailboxes.len()
    }

    /// Number of messages waiting in `worker`'s mailbox, if registered.
    pub fn mailbox_len(&self, worker: &WorkerId) -> Option<usize> {
        self.mailbox(worker).map(|m| m.len())
    }

    /// Number of events sent but not yet completed.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn event_subscriber_count<E: Event>(&self) -> usize {
        self.registry.event_subscriber_count(TypeId::of::<E>())
    }

    pub fn broadcast_subscriber_count<B: Broadcast>(&self) -> usize {
        self.registry.broadcast_subscriber_count(TypeId::of::<B>())
    }

    pub fn is_subscribed_event<E: Event>(&self, worker: &WorkerId) -> bool {
        self.registry.has_event_subscriber(TypeId::of::<E>(), worker)
    }

    pub fn is_subscribed_broadcast<B: Broadcast>(&self, worker: &WorkerId) -> bool {
        self.registry
            .has_broadcast_subscriber(TypeId::of::<B>(), worker)
    }

    /// Subscribers of `E` in rotation order; the first one receives the next
    /// event.
    pub fn event_rotation<E: Event>(&self) -> Vec<WorkerId> {
        self.registry.event_rotation(TypeId::of::<E>())
    }

    /// Whether `worker` still appears in any subscriber list.
    pub fn has_subscriptions(&self, worker: &WorkerId) -> bool {
        self.registry.mentions(worker)
    }
}
