//! Shared message types and helpers for bus tests.
#![allow(dead_code)]

use std::time::Duration;

use microbus::{Broadcast, Delivery, Event, MessageBus, WorkerId};
use tracing_subscriber::EnvFilter;

/// Bounded wait for anything that is expected to happen.
pub const WAIT: Duration = Duration::from_secs(5);

/// Bounded wait for anything that is expected NOT to happen.
pub const SHORT: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct Job(pub u32);

impl Event for Job {
    type Reply = String;
}

#[derive(Debug)]
pub struct Ping(pub u32);

impl Broadcast for Ping {}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Register `name` on `bus` and return its id.
pub fn worker(bus: &MessageBus, name: &str) -> WorkerId {
    let id = WorkerId::new(name);
    bus.register(&id);
    id
}

/// Take the next message for `worker`, which must be a `Job`.
pub fn next_job(bus: &MessageBus, worker: &WorkerId) -> Delivery<Job> {
    bus.await_message(worker)
        .expect("worker is registered")
        .into_event::<Job>()
        .expect("next message is a Job")
}
