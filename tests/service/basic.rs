//! Single-threaded worker tests: dispatch, errors, termination.

use std::sync::Arc;

use microbus::{Context, HandlerError, Lifecycle, MessageBus, Worker, WorkerId};

use crate::support::{init_tracing, Add, Note, Shutdown};

fn shutdown<S>(_: &mut S, ctx: &mut Context<'_>, _: Arc<Shutdown>) -> Result<(), HandlerError> {
    ctx.terminate();
    Ok(())
}

// ============================================================================
// Test 1: Handlers see messages in mailbox order
// ============================================================================

#[test]
fn dispatches_by_type_in_arrival_order() {
    init_tracing();
    let bus = Arc::new(MessageBus::new());

    let worker = Worker::new("journal", bus.clone(), Vec::<String>::new())
        .on_broadcast::<Note, _>(|log, _, note| {
            log.push(format!("note:{}", note.0));
            Ok(())
        })
        .on_event::<Add, _>(|log, ctx, add| {
            log.push(format!("add:{}", add.0));
            ctx.complete(&add, add.0);
            Ok(())
        })
        .on_broadcast::<Shutdown, _>(shutdown)
        .on_start(|_, ctx| {
            ctx.send_broadcast(Note("a"));
            let reply = ctx.send_event(Add(5));
            assert!(reply.is_some());
            ctx.send_broadcast(Note("b"));
            ctx.send_broadcast(Shutdown);
            Ok(())
        });

    let outcome = worker.run().unwrap();

    assert_eq!(outcome.state, vec!["note:a", "add:5", "note:b"]);
    assert_eq!(outcome.stats.events_handled, 1);
    assert_eq!(outcome.stats.broadcasts_handled, 3);
    assert_eq!(outcome.stats.failed, 0);
}

// ============================================================================
// Test 2: A failing handler does not stop the worker
// ============================================================================

#[test]
fn handler_errors_are_counted_not_fatal() {
    let bus = Arc::new(MessageBus::new());

    let worker = Worker::new("picky", bus.clone(), 0i64)
        .on_event::<Add, _>(|total, ctx, add| {
            if add.0 < 0 {
                return Err(HandlerError::Rejected(format!("negative amount {}", add.0)));
            }
            *total += add.0;
            ctx.complete(&add, *total);
            Ok(())
        })
        .on_broadcast::<Shutdown, _>(shutdown)
        .on_start(|_, ctx| {
            ctx.send_event(Add(2));
            ctx.send_event(Add(-1));
            ctx.send_event(Add(3));
            ctx.send_broadcast(Shutdown);
            Ok(())
        });

    let outcome = worker.run().unwrap();

    assert_eq!(outcome.state, 5);
    assert_eq!(outcome.stats.events_handled, 2);
    assert_eq!(outcome.stats.failed, 1);
}

// ============================================================================
// Test 3: terminate() abandons whatever is still queued
// ============================================================================

#[test]
fn terminate_abandons_remaining_mail_and_pending_replies() {
    let bus = Arc::new(MessageBus::new());
    let (tx, rx) = std::sync::mpsc::channel();

    let worker = Worker::new("quitter", bus.clone(), 0usize)
        .on_event::<Add, _>(|seen, ctx, add| {
            *seen += 1;
            ctx.complete(&add, add.0);
            Ok(())
        })
        .on_broadcast::<Shutdown, _>(shutdown)
        .on_start(move |_, ctx| {
            ctx.send_broadcast(Shutdown);
            let late = ctx.send_event(Add(1)).expect("subscribed to Add");
            tx.send(late).unwrap();
            Ok(())
        });

    let outcome = worker.run().unwrap();
    let late = rx.recv().unwrap();

    assert_eq!(outcome.state, 0);
    assert!(!late.is_done());
    assert_eq!(bus.pending_count(), 0);
    assert!(!bus.is_registered(&WorkerId::new("quitter")));
}

// ============================================================================
// Test 4: Messages without a handler are counted and skipped
// ============================================================================

#[test]
fn message_for_another_type_is_reported_as_unhandled() {
    let bus = Arc::new(MessageBus::new());
    let id = WorkerId::new("eavesdropper");

    let worker = Worker::new(id.clone(), bus.clone(), ())
        .on_broadcast::<Shutdown, _>(shutdown)
        .on_start(|_, ctx| {
            // subscribed by hand, so no handler exists for Note
            ctx.bus().subscribe_broadcast::<Note>(ctx.name());
            ctx.send_broadcast(Note("stray"));
            ctx.send_broadcast(Shutdown);
            Ok(())
        });

    let outcome = worker.run().unwrap();

    assert_eq!(outcome.stats.unhandled, 1);
    assert_eq!(outcome.stats.broadcasts_handled, 1);
}

// ============================================================================
// Test 5: Lifecycle runs forward to Unregistered
// ============================================================================

#[test]
fn lifecycle_ends_unregistered_and_unsubscribed() {
    let bus = Arc::new(MessageBus::new());
    let worker = Worker::new("brief", bus.clone(), ())
        .on_event::<Add, _>(|_, _, _| Ok(()))
        .on_broadcast::<Shutdown, _>(shutdown)
        .on_start(|_, ctx| {
            assert!(ctx.bus().is_subscribed_event::<Add>(ctx.name()));
            ctx.send_broadcast(Shutdown);
            Ok(())
        });
    let probe = worker.lifecycle();
    assert_eq!(probe.current(), Lifecycle::Created);

    worker.run().unwrap();

    assert_eq!(probe.current(), Lifecycle::Unregistered);
    assert_eq!(bus.event_subscriber_count::<Add>(), 0);
    assert_eq!(bus.registered_count(), 0);
}
