//! Events go to exactly one subscriber, rotating fairly.

use microbus::MessageBus;

use crate::support::{init_tracing, next_job, worker, Job, SHORT, WAIT};

// ============================================================================
// Test 1: A and B share an event type; E1, E2, E3 go A, B, A
// ============================================================================

#[test]
fn events_alternate_and_completion_resolves_only_its_future() {
    init_tracing();
    let bus = MessageBus::new();
    let a = worker(&bus, "A");
    let b = worker(&bus, "B");
    bus.subscribe_event::<Job>(&a);
    bus.subscribe_event::<Job>(&b);

    let f1 = bus.send_event(Job(1)).unwrap();
    let f2 = bus.send_event(Job(2)).unwrap();
    let f3 = bus.send_event(Job(3)).unwrap();

    assert_eq!(bus.mailbox_len(&a), Some(2));
    assert_eq!(bus.mailbox_len(&b), Some(1));

    let e1 = next_job(&bus, &a);
    let e3 = next_job(&bus, &a);
    let e2 = next_job(&bus, &b);
    assert_eq!((e1.0, e2.0, e3.0), (1, 2, 3));

    assert!(bus.complete(&e2, "x".to_string()));

    assert_eq!(f2.get_timeout(WAIT), Ok("x".to_string()));
    assert!(!f1.is_done());
    assert!(!f3.is_done());
    assert!(f1.get_timeout(SHORT).is_err());
    assert_eq!(bus.pending_count(), 2);
}

// ============================================================================
// Test 2: K sends over K subscribers reach K distinct subscribers
// ============================================================================

#[test]
fn k_sends_reach_k_distinct_subscribers() {
    let bus = MessageBus::new();
    let names = ["w0", "w1", "w2", "w3", "w4"];
    let ids: Vec<_> = names.iter().map(|n| worker(&bus, n)).collect();
    for id in &ids {
        bus.subscribe_event::<Job>(id);
    }

    // start mid-rotation
    bus.send_event(Job(0)).unwrap();
    bus.send_event(Job(0)).unwrap();

    for n in 0..names.len() as u32 {
        bus.send_event(Job(n)).unwrap();
    }

    // two from the warm-up plus exactly one each
    let lens: Vec<_> = ids.iter().map(|id| bus.mailbox_len(id).unwrap()).collect();
    assert_eq!(lens, vec![2, 2, 1, 1, 1]);
}

// ============================================================================
// Test 3: Subscribing again does not move a worker in the rotation
// ============================================================================

#[test]
fn resubscribe_keeps_rotation_position() {
    let bus = MessageBus::new();
    let a = worker(&bus, "A");
    let b = worker(&bus, "B");
    bus.subscribe_event::<Job>(&a);
    bus.subscribe_event::<Job>(&b);
    bus.subscribe_event::<Job>(&a);

    assert_eq!(bus.event_subscriber_count::<Job>(), 2);
    assert_eq!(bus.event_rotation::<Job>(), vec![a.clone(), b.clone()]);

    bus.send_event(Job(1)).unwrap();
    assert_eq!(bus.event_rotation::<Job>(), vec![b, a]);
}

// ============================================================================
// Test 4: A single subscriber receives every event
// ============================================================================

#[test]
fn single_subscriber_receives_everything() {
    let bus = MessageBus::new();
    let solo = worker(&bus, "solo");
    bus.subscribe_event::<Job>(&solo);

    let futures: Vec<_> = (0..4).map(|n| bus.send_event(Job(n)).unwrap()).collect();
    for _ in 0..4 {
        let job = next_job(&bus, &solo);
        bus.complete(&job, format!("done {}", job.0));
    }

    let replies: Vec<_> = futures.iter().map(|f| f.get_timeout(WAIT).unwrap()).collect();
    assert_eq!(replies, vec!["done 0", "done 1", "done 2", "done 3"]);
}
