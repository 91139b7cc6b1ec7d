//! Subscriber registry: who receives which message type.
//!
//! Both maps are sharded (`DashMap`), so operations on different message
//! types never contend. Each entry is mutated under its shard's write lock,
//! which makes the round-robin rotation a single atomic step.

use std::any::TypeId;
use std::collections::VecDeque;

use dashmap::DashMap;

use super::WorkerId;

#[derive(Default)]
pub(crate) struct Registry {
    /// Event type → subscribers in rotation order. Head is next in line.
    events: DashMap<TypeId, VecDeque<WorkerId>>,
    /// Broadcast type → subscribers in subscription order, no duplicates.
    broadcasts: DashMap<TypeId, Vec<WorkerId>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append `worker` to the rotation for `type_id` unless already present.
    pub(crate) fn subscribe_event(&self, type_id: TypeId, worker: &WorkerId) -> bool {
        let mut rotation = self.events.entry(type_id).or_default();
        if rotation.contains(worker) {
            return false;
        }
        rotation.push_back(worker.clone());
        true
    }

    pub(crate) fn subscribe_broadcast(&self, type_id: TypeId, worker: &WorkerId) -> bool {
        let mut subscribers = self.broadcasts.entry(type_id).or_default();
        if subscribers.contains(worker) {
            return false;
        }
        subscribers.push(worker.clone());
        true
    }

    /// Pop the head of the rotation and push it back to the tail.
    ///
    /// Returns the selected worker and the rotation length at that moment.
    pub(crate) fn rotate(&self, type_id: TypeId) -> Option<(WorkerId, usize)> {
        let mut rotation = self.events.get_mut(&type_id)?;
        let next = rotation.pop_front()?;
        rotation.push_back(next.clone());
        Some((next, rotation.len()))
    }

    /// Snapshot of the current broadcast subscribers for `type_id`.
    pub(crate) fn broadcast_targets(&self, type_id: TypeId) -> Vec<WorkerId> {
        self.broadcasts
            .get(&type_id)
            .map(|subscribers| subscribers.value().clone())
            .unwrap_or_default()
    }

    /// Snapshot of the rotation for `type_id`, head first.
    pub(crate) fn event_rotation(&self, type_id: TypeId) -> Vec<WorkerId> {
        self.events
            .get(&type_id)
            .map(|rotation| rotation.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop `worker` from every rotation and every broadcast set.
    pub(crate) fn remove_worker(&self, worker: &WorkerId) {
        for mut rotation in self.events.iter_mut() {
            rotation.retain(|w| w != worker);
        }
        for mut subscribers in self.broadcasts.iter_mut() {
            subscribers.retain(|w| w != worker);
        }
    }

    pub(crate) fn event_subscriber_count(&self, type_id: TypeId) -> usize {
        self.events.get(&type_id).map_or(0, |r| r.len())
    }

    pub(crate) fn broadcast_subscriber_count(&self, type_id: TypeId) -> usize {
        self.broadcasts.get(&type_id).map_or(0, |s| s.len())
    }

    pub(crate) fn has_event_subscriber(&self, type_id: TypeId, worker: &WorkerId) -> bool {
        self.events
            .get(&type_id)
            .is_some_and(|rotation| rotation.contains(worker))
    }

    pub(crate) fn has_broadcast_subscriber(&self, type_id: TypeId, worker: &WorkerId) -> bool {
        self.broadcasts
            .get(&type_id)
            .is_some_and(|subscribers| subscribers.contains(worker))
    }

    /// Whether `worker` appears anywhere in the registry.
    pub(crate) fn mentions(&self, worker: &WorkerId) -> bool {
        self.events.iter().any(|r| r.contains(worker))
            || self.broadcasts.iter().any(|s| s.contains(worker))
    }
}
