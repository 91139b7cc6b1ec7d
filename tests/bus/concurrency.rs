//! Many threads hammering one bus.

use std::sync::Arc;
use std::thread;

use microbus::{MessageBus, WorkerId};

use crate::support::{init_tracing, next_job, worker, Job, Ping, WAIT};

const SENDERS: u32 = 8;
const PER_SENDER: u32 = 100;

#[test]
fn concurrent_sends_are_spread_evenly() {
    init_tracing();
    let bus = Arc::new(MessageBus::new());
    let ids: Vec<WorkerId> = (0..4).map(|n| worker(&bus, &format!("w{n}"))).collect();
    for id in &ids {
        bus.subscribe_event::<Job>(id);
    }

    let senders: Vec<_> = (0..SENDERS)
        .map(|s| {
            let bus = Arc::clone(&bus);
            thread::spawn(move || {
                for n in 0..PER_SENDER {
                    assert!(bus.send_event(Job(s * PER_SENDER + n)).is_some());
                }
            })
        })
        .collect();
    for s in senders {
        s.join().unwrap();
    }

    let total = (SENDERS * PER_SENDER) as usize;
    for id in &ids {
        assert_eq!(bus.mailbox_len(id), Some(total / ids.len()));
    }
    assert_eq!(bus.pending_count(), total);
}

#[test]
fn concurrent_subscribe_registers_each_worker_once() {
    let bus = Arc::new(MessageBus::new());
    let threads: Vec<_> = (0..16)
        .map(|n| {
            let bus = Arc::clone(&bus);
            thread::spawn(move || {
                let id = worker(&bus, &format!("w{}", n % 8));
                bus.subscribe_event::<Job>(&id);
                bus.subscribe_broadcast::<Ping>(&id);
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(bus.registered_count(), 8);
    assert_eq!(bus.event_subscriber_count::<Job>(), 8);
    assert_eq!(bus.broadcast_subscriber_count::<Ping>(), 8);
}

#[test]
fn replies_from_worker_threads_reach_every_sender() {
    let bus = Arc::new(MessageBus::new());
    let ids: Vec<WorkerId> = (0..3).map(|n| worker(&bus, &format!("echo{n}"))).collect();
    for id in &ids {
        bus.subscribe_event::<Job>(id);
    }

    let jobs = 30;
    let futures: Vec<_> = (0..jobs).map(|n| bus.send_event(Job(n)).unwrap()).collect();

    let workers: Vec<_> = ids
        .into_iter()
        .map(|id| {
            let bus = Arc::clone(&bus);
            thread::spawn(move || {
                for _ in 0..jobs / 3 {
                    let job = next_job(&bus, &id);
                    bus.complete(&job, format!("{}:{}", id, job.0));
                }
            })
        })
        .collect();

    for (n, future) in futures.iter().enumerate() {
        let reply = future.get_timeout(WAIT).unwrap();
        assert!(reply.ends_with(&format!(":{n}")), "{reply}");
    }
    for w in workers {
        w.join().unwrap();
    }
    assert_eq!(bus.pending_count(), 0);
}
