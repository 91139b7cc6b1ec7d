//! Pairs observations with the pose recorded for the same tick.
//!
//! Observations and poses for a tick arrive in either order. An observation
//! whose pose is already known is released immediately; otherwise it waits
//! here. Recording a pose releases waiting observations in ascending tick
//! order, stopping at the first tick whose pose is still missing.

use std::collections::{BTreeMap, VecDeque};

use super::objects::Pose;

/// Time-ordered holding area for observations awaiting their pose.
#[derive(Debug)]
pub struct CorrelationBuffer<O> {
    positions: BTreeMap<u64, Pose>,
    pending: BTreeMap<u64, VecDeque<O>>,
}

impl<O> Default for CorrelationBuffer<O> {
    fn default() -> Self {
        Self {
            positions: BTreeMap::new(),
            pending: BTreeMap::new(),
        }
    }
}

impl<O> CorrelationBuffer<O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the pose for `pose.time` (replacing any earlier one) and
    /// release every observation that can now be processed, oldest first.
    pub fn record_position(&mut self, pose: Pose) -> Vec<(Pose, O)> {
        self.positions.insert(pose.time, pose);

        let mut ready = Vec::new();
        while let Some(entry) = self.pending.first_entry() {
            let Some(pose) = self.positions.get(entry.key()).copied() else {
                break;
            };
            ready.extend(entry.remove().into_iter().map(|o| (pose, o)));
        }
        ready
    }

    /// Offer an observation made at `time`.
    ///
    /// Returns it paired with its pose if the pose is known; otherwise
    /// buffers it and returns `None`.
    pub fn offer(&mut self, time: u64, observation: O) -> Option<(Pose, O)> {
        match self.positions.get(&time) {
            Some(pose) => Some((*pose, observation)),
            None => {
                self.pending.entry(time).or_default().push_back(observation);
                None
            }
        }
    }

    /// Release every buffered observation whose pose is known, ignoring
    /// tick order. Used when no more poses will arrive.
    pub fn sweep(&mut self) -> Vec<(Pose, O)> {
        let positions = &self.positions;
        let known: Vec<u64> = self
            .pending
            .keys()
            .copied()
            .filter(|t| positions.contains_key(t))
            .collect();

        let mut ready = Vec::new();
        for time in known {
            if let (Some(pose), Some(observations)) =
                (self.positions.get(&time).copied(), self.pending.remove(&time))
            {
                ready.extend(observations.into_iter().map(|o| (pose, o)));
            }
        }
        ready
    }

    pub fn position(&self, time: u64) -> Option<&Pose> {
        self.positions.get(&time)
    }

    /// Recorded poses in tick order.
    pub fn positions(&self) -> impl Iterator<Item = &Pose> {
        self.positions.values()
    }

    /// Number of buffered observations.
    pub fn pending_len(&self) -> usize {
        self.pending.values().map(VecDeque::len).sum()
    }

    /// Ticks that still have buffered observations, ascending.
    pub fn pending_times(&self) -> Vec<u64> {
        self.pending.keys().copied().collect()
    }
}
