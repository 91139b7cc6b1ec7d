//! Broadcast fan-out, mailbox ordering and the no-subscriber contract.

use microbus::{MessageBus, MessageKind, TimedOut};

use crate::support::{next_job, worker, Job, Ping, SHORT};

#[test]
fn broadcast_reaches_every_subscriber_once() {
    let bus = MessageBus::new();
    let a = worker(&bus, "A");
    let b = worker(&bus, "B");
    let bystander = worker(&bus, "C");
    bus.subscribe_broadcast::<Ping>(&a);
    bus.subscribe_broadcast::<Ping>(&b);
    bus.subscribe_broadcast::<Ping>(&a);

    assert_eq!(bus.broadcast_subscriber_count::<Ping>(), 2);
    assert_eq!(bus.send_broadcast(Ping(7)), 2);

    for id in [&a, &b] {
        let ping = bus.await_message(id).unwrap().into_broadcast::<Ping>().unwrap();
        assert_eq!(ping.0, 7);
        assert_eq!(bus.mailbox_len(id), Some(0));
    }
    assert_eq!(bus.mailbox_len(&bystander), Some(0));
}

#[test]
fn mailbox_preserves_arrival_order_across_kinds() {
    let bus = MessageBus::new();
    let w = worker(&bus, "w");
    bus.subscribe_event::<Job>(&w);
    bus.subscribe_broadcast::<Ping>(&w);

    bus.send_broadcast(Ping(1));
    bus.send_event(Job(2)).unwrap();
    bus.send_broadcast(Ping(3));
    bus.send_event(Job(4)).unwrap();

    let mut seen = Vec::new();
    for _ in 0..4 {
        let message = bus.await_message(&w).unwrap();
        match message.kind() {
            MessageKind::Broadcast => seen.push(("ping", message.downcast_ref::<Ping>().unwrap().0)),
            MessageKind::Event => seen.push(("job", message.downcast_ref::<Job>().unwrap().0)),
        }
    }
    assert_eq!(seen, vec![("ping", 1), ("job", 2), ("ping", 3), ("job", 4)]);
}

#[test]
fn no_subscribers_means_no_future_and_no_mail() {
    let bus = MessageBus::new();
    let w = worker(&bus, "w");
    // subscribed to something else
    bus.subscribe_broadcast::<Ping>(&w);

    assert!(bus.send_event(Job(1)).is_none());
    assert_eq!(bus.mailbox_len(&w), Some(0));
    assert_eq!(bus.pending_count(), 0);
}

#[test]
fn completing_twice_keeps_the_first_reply() {
    let bus = MessageBus::new();
    let w = worker(&bus, "w");
    bus.subscribe_event::<Job>(&w);

    let future = bus.send_event(Job(1)).unwrap();
    let job = next_job(&bus, &w);

    assert!(bus.complete(&job, "first".into()));
    assert!(!bus.complete(&job, "second".into()));
    assert_eq!(future.try_get().as_deref(), Some("first"));
}

#[test]
fn unresolved_future_times_out_distinctly() {
    let bus = MessageBus::new();
    let w = worker(&bus, "w");
    bus.subscribe_event::<Job>(&w);

    let future = bus.send_event(Job(1)).unwrap();

    assert_eq!(future.get_timeout(SHORT), Err(TimedOut(SHORT)));
    assert!(!future.is_done());
}
