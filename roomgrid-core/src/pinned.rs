//! Pinned participants

use crate::types::UserId;
use std::collections::VecDeque;
use tracing::debug;

/// Default number of participants that can be pinned at once
pub const DEFAULT_MAX_PINNED: usize = 4;

/// Result of a pin operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinChange {
    Pinned { evicted: Option<UserId> },
    AlreadyPinned,
    Unpinned,
    NotPinned,
}

/// Capacity-bounded, insertion-ordered set of pinned participants.
///
/// Pinning beyond capacity evicts the oldest pin first.
#[derive(Debug, Clone)]
pub struct PinnedSet {
    pins: VecDeque<UserId>,
    capacity: usize,
}

impl PinnedSet {
    /// A capacity of 0 is treated as 1
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            pins: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn pin(&mut self, user_id: UserId) -> PinChange {
        if self.contains(&user_id) {
            return PinChange::AlreadyPinned;
        }

        let evicted = if self.pins.len() >= self.capacity {
            self.pins.pop_front()
        } else {
            None
        };
        if let Some(evicted) = &evicted {
            debug!(evicted = %evicted, pinned = %user_id, "Pin capacity reached, evicted oldest pin");
        }

        self.pins.push_back(user_id);
        PinChange::Pinned { evicted }
    }

    pub fn unpin(&mut self, user_id: &UserId) -> PinChange {
        let before = self.pins.len();
        self.pins.retain(|id| id != user_id);
        if self.pins.len() < before {
            PinChange::Unpinned
        } else {
            PinChange::NotPinned
        }
    }

    pub fn toggle(&mut self, user_id: UserId) -> PinChange {
        if self.contains(&user_id) {
            self.unpin(&user_id)
        } else {
            self.pin(user_id)
        }
    }

    #[must_use]
    pub fn contains(&self, user_id: &UserId) -> bool {
        self.pins.contains(user_id)
    }

    /// Position in pin order, oldest first
    #[must_use]
    pub fn position(&self, user_id: &UserId) -> Option<usize> {
        self.pins.iter().position(|id| id == user_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserId> + '_ {
        self.pins.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pins.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for PinnedSet {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PINNED)
    }
}
