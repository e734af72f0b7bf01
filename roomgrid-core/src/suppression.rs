//! Optimistic suppression of removed participants
//!
//! A participant is hidden as soon as a remove is confirmed, before the
//! backend roster reflects it. Each entry carries its own deadline and is
//! checked against the caller's clock, so expiry needs no cleanup timer.

use crate::types::UserId;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Default lifetime of a suppression entry
pub const DEFAULT_SUPPRESSION_TTL: Duration = Duration::from_secs(5);

/// Longest lifetime a suppression entry may have; larger values are clamped
pub const MAX_SUPPRESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// State of a locally removed participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    Suppressed { until: Instant },
}

impl Suppression {
    #[must_use]
    pub fn is_active(&self, now: Instant) -> bool {
        match self {
            Self::Suppressed { until } => now < *until,
        }
    }
}

/// Time-bounded set of participants hidden from the grid
#[derive(Debug, Clone)]
pub struct SuppressionSet {
    entries: HashMap<UserId, Suppression>,
    ttl: Duration,
}

impl SuppressionSet {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl: ttl.min(MAX_SUPPRESSION_TTL),
        }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Hide a participant until `now + ttl`.
    ///
    /// Suppressing an id that is already hidden keeps the later deadline.
    pub fn suppress(&mut self, user_id: UserId, now: Instant) {
        let until = now.checked_add(self.ttl).unwrap_or(now);
        self.entries
            .entry(user_id)
            .and_modify(|entry| {
                let Suppression::Suppressed { until: current } = entry;
                if until > *current {
                    *current = until;
                }
            })
            .or_insert(Suppression::Suppressed { until });
    }

    /// Lift a suppression; returns whether an entry existed
    pub fn lift(&mut self, user_id: &UserId) -> bool {
        self.entries.remove(user_id).is_some()
    }

    #[must_use]
    pub fn is_suppressed(&self, user_id: &UserId, now: Instant) -> bool {
        self.entries
            .get(user_id)
            .is_some_and(|entry| entry.is_active(now))
    }

    /// Drop entries whose deadline has passed; returns how many were dropped
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_active(now));
        before - self.entries.len()
    }

    /// Ids that are currently hidden
    pub fn active_ids(&self, now: Instant) -> impl Iterator<Item = &UserId> + '_ {
        self.entries
            .iter()
            .filter(move |(_, entry)| entry.is_active(now))
            .map(|(id, _)| id)
    }

    /// Keep only entries for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(&UserId) -> bool) {
        self.entries.retain(|id, _| keep(id));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SuppressionSet {
    fn default() -> Self {
        Self::new(DEFAULT_SUPPRESSION_TTL)
    }
}
