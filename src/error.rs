use crate::bus::WorkerId;

/// Errors surfaced by [`MessageBus`](crate::MessageBus) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// The worker has no mailbox: it was never registered, or it was
    /// unregistered (possibly while blocked in `await_message`).
    #[error("worker {0} is not registered with the bus")]
    NotRegistered(WorkerId),
}
