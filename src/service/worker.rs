//! Worker: handler registration and the per-worker run loop.
//!
//! A `Worker<S>` owns a piece of state `S` and a map from message type to
//! handler closure. Handlers receive `&mut S`, a [`Context`] and the typed
//! message, and return `Result<(), HandlerError>`.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use microbus::{Broadcast, Event, MessageBus, Worker, WorkerThread};
//!
//! struct Add(u32);
//! impl Event for Add {
//!     type Reply = u32;
//! }
//!
//! struct Stop;
//! impl Broadcast for Stop {}
//!
//! let bus = Arc::new(MessageBus::new());
//! let adder = Worker::new("adder", bus.clone(), 0u32)
//!     .on_event::<Add, _>(|total, ctx, add| {
//!         *total += add.0;
//!         ctx.complete(&add, *total);
//!         Ok(())
//!     })
//!     .on_broadcast::<Stop, _>(|_, ctx, _| {
//!         ctx.terminate();
//!         Ok(())
//!     });
//!
//! let probe = adder.lifecycle();
//! let handle = WorkerThread::spawn(adder).unwrap();
//! probe.wait_for(microbus::Lifecycle::Running);
//!
//! assert_eq!(bus.send_event(Add(2)).unwrap().get(), 2);
//! assert_eq!(bus.send_event(Add(3)).unwrap().get(), 5);
//! bus.send_broadcast(Stop);
//!
//! let outcome = handle.join().unwrap();
//! assert_eq!(outcome.state, 5);
//! assert_eq!(outcome.stats.events_handled, 2);
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::context::Context;
use super::error::HandlerError;
use super::lifecycle::{Lifecycle, LifecycleProbe};
use crate::bus::{Broadcast, Delivery, Event, MessageBus, MessageKind, WorkerId};
use crate::error::BusError;

type Handler<S> =
    Box<dyn FnMut(&mut S, &mut Context<'_>, crate::bus::Message) -> Result<(), HandlerError> + Send>;
type Subscribe = Box<dyn Fn(&MessageBus, &WorkerId) + Send>;
type StartHook<S> = Box<dyn FnOnce(&mut S, &mut Context<'_>) -> Result<(), HandlerError> + Send>;

/// Counters kept by a worker's run loop.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    /// Events whose handler returned `Ok`.
    pub events_handled: usize,
    /// Broadcasts whose handler returned `Ok`.
    pub broadcasts_handled: usize,
    /// Handler (or start hook) invocations that returned an error.
    pub failed: usize,
    /// Messages for which no handler was installed.
    pub unhandled: usize,
}

/// What a worker hands back when its run loop ends.
#[derive(Debug)]
pub struct WorkerOutcome<S> {
    pub state: S,
    pub stats: WorkerStats,
}

/// A unit of execution that talks to the rest of the system only through
/// the bus.
///
/// Built with chained `on_event` / `on_broadcast` / `on_start` calls, then
/// either run on the current thread ([`Worker::run`]) or spawned with
/// [`WorkerThread::spawn`](super::WorkerThread::spawn).
///
/// Installing a second handler for the same message type replaces the first.
pub struct Worker<S> {
    id: WorkerId,
    bus: Arc<MessageBus>,
    state: S,
    subscriptions: Vec<Subscribe>,
    handlers: HashMap<TypeId, Handler<S>>,
    start_hooks: Vec<StartHook<S>>,
    lifecycle: LifecycleProbe,
}

impl<S: Send + 'static> Worker<S> {
    /// Create a worker named `name` on `bus` owning `state`.
    pub fn new(name: impl Into<WorkerId>, bus: Arc<MessageBus>, state: S) -> Self {
        Self {
            id: name.into(),
            bus,
            state,
            subscriptions: Vec::new(),
            handlers: HashMap::new(),
            start_hooks: Vec::new(),
            lifecycle: LifecycleProbe::new(),
        }
    }

    /// Handle events of type `E`.
    ///
    /// The worker joins the round-robin rotation for `E` when it starts.
    pub fn on_event<E, F>(mut self, mut handler: F) -> Self
    where
        E: Event,
        F: FnMut(&mut S, &mut Context<'_>, Delivery<E>) -> Result<(), HandlerError>
            + Send
            + 'static,
    {
        let subscribe: Subscribe = Box::new(|bus, id| bus.subscribe_event::<E>(id));
        let dispatch: Handler<S> = Box::new(move |state, ctx, message| {
            let delivery = message
                .into_event::<E>()
                .map_err(|m| HandlerError::MessageMismatch(m.type_name()))?;
            handler(state, ctx, delivery)
        });
        self.subscriptions.push(subscribe);
        self.handlers.insert(TypeId::of::<E>(), dispatch);
        self
    }

    /// Handle broadcasts of type `B`.
    pub fn on_broadcast<B, F>(mut self, mut handler: F) -> Self
    where
        B: Broadcast,
        F: FnMut(&mut S, &mut Context<'_>, Arc<B>) -> Result<(), HandlerError>
            + Send
            + 'static,
    {
        let subscribe: Subscribe = Box::new(|bus, id| bus.subscribe_broadcast::<B>(id));
        let dispatch: Handler<S> = Box::new(move |state, ctx, message| {
            let broadcast = message
                .into_broadcast::<B>()
                .map_err(|m| HandlerError::MessageMismatch(m.type_name()))?;
            handler(state, ctx, broadcast)
        });
        self.subscriptions.push(subscribe);
        self.handlers.insert(TypeId::of::<B>(), dispatch);
        self
    }

    /// Run `hook` once, after subscriptions are in place and before the
    /// first message is awaited. Typically used to send an initial message.
    pub fn on_start<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&mut S, &mut Context<'_>) -> Result<(), HandlerError> + Send + 'static,
    {
        self.start_hooks.push(Box::new(hook));
        self
    }

    pub fn name(&self) -> &WorkerId {
        &self.id
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// A probe that follows this worker through its lifecycle.
    pub fn lifecycle(&self) -> LifecycleProbe {
        self.lifecycle.clone()
    }

    /// Run the worker on the current thread until it terminates.
    ///
    /// Registers, subscribes, runs start hooks, then dispatches one message
    /// at a time until a handler calls [`Context::terminate`]. The worker is
    /// unregistered on every exit path, including unwinding.
    ///
    /// Fails with [`BusError::NotRegistered`] if the worker is unregistered
    /// by someone else while it is waiting for mail.
    pub fn run(self) -> Result<WorkerOutcome<S>, BusError> {
        let Worker {
            id,
            bus,
            mut state,
            subscriptions,
            mut handlers,
            start_hooks,
            lifecycle,
        } = self;
        let _exit = ExitGuard {
            bus: &bus,
            id: &id,
            lifecycle: &lifecycle,
        };

        bus.register(&id);
        lifecycle.advance(Lifecycle::Registered);
        for subscribe in &subscriptions {
            subscribe(&bus, &id);
        }

        let mut stats = WorkerStats::default();
        let mut terminating = false;
        for hook in start_hooks {
            let mut ctx = Context::new(&id, &bus);
            if let Err(error) = hook(&mut state, &mut ctx) {
                warn!(worker = %id, %error, "start hook failed");
                stats.failed += 1;
            }
            terminating |= ctx.is_terminating();
        }

        lifecycle.advance(Lifecycle::Running);
        info!(worker = %id, handlers = handlers.len(), "worker running");

        while !terminating {
            let message = bus.await_message(&id)?;
            let kind = message.kind();
            let type_name = message.type_name();

            let Some(handler) = handlers.get_mut(&message.payload_type()) else {
                warn!(worker = %id, message = type_name, "no handler for message");
                stats.unhandled += 1;
                continue;
            };

            let mut ctx = Context::new(&id, &bus);
            match handler(&mut state, &mut ctx, message) {
                Ok(()) => match kind {
                    MessageKind::Event => stats.events_handled += 1,
                    MessageKind::Broadcast => stats.broadcasts_handled += 1,
                },
                Err(error) => {
                    warn!(worker = %id, message = type_name, %error, "handler failed");
                    stats.failed += 1;
                }
            }
            terminating = ctx.is_terminating();
        }

        lifecycle.advance(Lifecycle::Terminating);
        debug!(worker = %id, ?stats, "worker terminating");
        Ok(WorkerOutcome { state, stats })
    }
}

/// Unregisters the worker when the run loop exits, however it exits.
struct ExitGuard<'a> {
    bus: &'a MessageBus,
    id: &'a WorkerId,
    lifecycle: &'a LifecycleProbe,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.bus.unregister(self.id);
        self.lifecycle.advance(Lifecycle::Unregistered);
    }
}
