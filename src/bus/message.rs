//! Message types carried by the bus.
//!
//! Payloads are plain Rust types. A type becomes routable by implementing
//! [`Event`] (point-to-point, one reply expected) or [`Broadcast`] (fan-out,
//! no reply). Routing is keyed by the payload's concrete type.

use std::any::{Any, TypeId};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// A point-to-point message answered through a [`Future`](crate::Future).
///
/// ## Example
///
/// ```
/// use microbus::Event;
///
/// struct Lookup {
///     key: String,
/// }
///
/// impl Event for Lookup {
///     type Reply = Option<String>;
/// }
/// ```
pub trait Event: Any + Send + Sync {
    /// The type the receiving worker resolves the sender's future with.
    type Reply: Clone + Send + Sync + 'static;
}

/// A fan-out notification delivered to every subscriber of its type.
pub trait Broadcast: Any + Send + Sync {}

/// Identifier assigned by the bus to every event it accepts.
///
/// The pending-reply table is keyed by this id, so two structurally equal
/// events sent twice are still answered independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub(crate) u64);

impl EventId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evt-{}", self.0)
    }
}

/// Which of the two disjoint message variants a [`Message`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Event,
    Broadcast,
}

/// A type-erased message as stored in a mailbox.
///
/// Produced by the bus and handed out by
/// [`MessageBus::await_message`](crate::MessageBus::await_message). Use
/// [`Message::into_event`] / [`Message::into_broadcast`] to recover the typed
/// payload.
pub struct Message {
    kind: MessageKind,
    event_id: Option<EventId>,
    type_id: TypeId,
    type_name: &'static str,
    payload: Arc<dyn Any + Send + Sync>,
}

impl Message {
    pub(crate) fn event<E: Event>(id: EventId, event: Arc<E>) -> Self {
        Self {
            kind: MessageKind::Event,
            event_id: Some(id),
            type_id: TypeId::of::<E>(),
            type_name: std::any::type_name::<E>(),
            payload: event,
        }
    }

    pub(crate) fn broadcast<B: Broadcast>(broadcast: Arc<B>) -> Self {
        Self {
            kind: MessageKind::Broadcast,
            event_id: None,
            type_id: TypeId::of::<B>(),
            type_name: std::any::type_name::<B>(),
            payload: broadcast,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// The bus-assigned id, for events only.
    pub fn event_id(&self) -> Option<EventId> {
        self.event_id
    }

    /// `TypeId` of the concrete payload type; the dispatch key.
    pub fn payload_type(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Check whether the payload is of type `M`.
    pub fn is<M: Any>(&self) -> bool {
        self.type_id == TypeId::of::<M>()
    }

    /// Borrow the payload as `M`, if it is one.
    pub fn downcast_ref<M: Any>(&self) -> Option<&M> {
        self.payload.downcast_ref::<M>()
    }

    /// Recover a typed event delivery. Returns `self` unchanged on mismatch.
    pub fn into_event<E: Event>(self) -> Result<Delivery<E>, Message> {
        let id = match (self.kind, self.event_id) {
            (MessageKind::Event, Some(id)) if self.is::<E>() => id,
            _ => return Err(self),
        };
        let Message {
            kind,
            event_id,
            type_id,
            type_name,
            payload,
        } = self;
        match payload.downcast::<E>() {
            Ok(event) => Ok(Delivery { id, event }),
            Err(payload) => Err(Message {
                kind,
                event_id,
                type_id,
                type_name,
                payload,
            }),
        }
    }

    /// Recover a typed broadcast. Returns `self` unchanged on mismatch.
    pub fn into_broadcast<B: Broadcast>(self) -> Result<Arc<B>, Message> {
        if self.kind != MessageKind::Broadcast || !self.is::<B>() {
            return Err(self);
        }
        let Message {
            kind,
            event_id,
            type_id,
            type_name,
            payload,
        } = self;
        payload.downcast::<B>().map_err(|payload| Message {
            kind,
            event_id,
            type_id,
            type_name,
            payload,
        })
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("kind", &self.kind)
            .field("event_id", &self.event_id)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// An event as received by its handler.
///
/// Carries the bus-assigned [`EventId`] so the handler (or whoever it hands
/// the delivery to) can later call
/// [`MessageBus::complete`](crate::MessageBus::complete). Dereferences to the
/// event payload.
pub struct Delivery<E> {
    id: EventId,
    event: Arc<E>,
}

impl<E> Delivery<E> {
    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn event(&self) -> &E {
        &self.event
    }
}

impl<E> Clone for Delivery<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            event: Arc::clone(&self.event),
        }
    }
}

impl<E> Deref for Delivery<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.event
    }
}

impl<E: fmt::Debug> fmt::Debug for Delivery<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("id", &self.id)
            .field("event", &self.event)
            .finish()
    }
}
