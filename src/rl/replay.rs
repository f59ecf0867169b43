//! Bounded experience replay memory
//!
//! Holds the most recent `capacity` transitions. Pushing into a full memory
//! evicts the oldest entry first.

use rand::Rng;
use rand::seq::index;
use std::collections::VecDeque;

/// Default capacity used by the DQN agent
pub const DEFAULT_REPLAY_CAPACITY: usize = 100_000;

/// FIFO ring buffer of transitions
#[derive(Debug, Clone)]
pub struct ReplayMemory<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> ReplayMemory<T> {
    /// Create an empty memory; a capacity of zero is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_REPLAY_CAPACITY)),
            capacity,
        }
    }

    /// Append an entry, dropping the oldest one when full
    pub fn push(&mut self, entry: T) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Up to `n` distinct entries chosen uniformly at random
    ///
    /// Returns every entry, oldest first, when the memory holds `n` or fewer.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<&T> {
        if self.entries.len() <= n {
            return self.entries.iter().collect();
        }
        index::sample(rng, self.entries.len(), n)
            .into_iter()
            .map(|i| &self.entries[i])
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}
