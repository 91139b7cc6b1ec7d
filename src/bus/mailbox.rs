//! Per-worker mailbox: one unbounded FIFO with a blocking receive.
//!
//! Events and broadcasts share the queue so arrival order is preserved
//! across message kinds. Receivers block on a `Condvar` and are woken by
//! every push, and by `close` when the worker is unregistered.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use super::Message;

struct Inbox {
    messages: VecDeque<Message>,
    closed: bool,
}

pub(crate) struct Mailbox {
    inbox: Mutex<Inbox>,
    ready: Condvar,
}

impl Mailbox {
    pub(crate) fn new() -> Self {
        Self {
            inbox: Mutex::new(Inbox {
                messages: VecDeque::new(),
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inbox> {
        self.inbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a message. Hands it back if the mailbox was already closed.
    pub(crate) fn push(&self, message: Message) -> Result<(), Message> {
        let mut inbox = self.lock();
        if inbox.closed {
            return Err(message);
        }
        inbox.messages.push_back(message);
        self.ready.notify_one();
        Ok(())
    }

    /// Block until a message is available and return the oldest one.
    ///
    /// Returns `None` once the mailbox is closed.
    pub(crate) fn pop(&self) -> Option<Message> {
        let mut inbox = self.lock();
        loop {
            if inbox.closed {
                return None;
            }
            if let Some(message) = inbox.messages.pop_front() {
                return Some(message);
            }
            inbox = self
                .ready
                .wait(inbox)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Close the mailbox and wake every receiver.
    ///
    /// Returns the messages that were never delivered.
    pub(crate) fn close(&self) -> Vec<Message> {
        let mut inbox = self.lock();
        inbox.closed = true;
        let abandoned = std::mem::take(&mut inbox.messages);
        self.ready.notify_all();
        abandoned.into()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().messages.len()
    }
}
