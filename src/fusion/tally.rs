//! Count-down of the workers a consumer is still waiting on.

use std::collections::BTreeSet;

use crate::bus::WorkerId;

/// The set of upstream workers that have not announced completion yet.
///
/// Duplicate names count once; completions from unknown or already finished
/// workers are ignored.
#[derive(Debug, Clone, Default)]
pub struct ProducerTally {
    remaining: BTreeSet<WorkerId>,
}

impl ProducerTally {
    pub fn new<I, W>(producers: I) -> Self
    where
        I: IntoIterator<Item = W>,
        W: Into<WorkerId>,
    {
        Self {
            remaining: producers.into_iter().map(Into::into).collect(),
        }
    }

    /// Mark `producer` as done. Returns `true` if it was still expected.
    pub fn finish(&mut self, producer: &WorkerId) -> bool {
        self.remaining.remove(producer)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}
