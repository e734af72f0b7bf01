//! Session-scoped event bus
//!
//! Lets independent UI regions react to participant changes (a removal,
//! a promotion, a failed action) without sharing ownership of the roster.
//! Each conferencing session owns exactly one bus.

use crate::actions::ParticipantAction;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Default buffer size for session events
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Events published within one conferencing session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Backend accepted a removal
    ParticipantRemoved {
        user_id: UserId,
        display_name: String,
        timestamp: DateTime<Utc>,
    },

    /// Participant was granted co-host privileges
    CoHostPromoted {
        user_id: UserId,
        display_name: String,
        timestamp: DateTime<Utc>,
    },

    /// Co-host privileges were revoked
    CoHostRemoved {
        user_id: UserId,
        display_name: String,
        timestamp: DateTime<Utc>,
    },

    /// A participant action was rejected; `message` is meant for display
    ActionFailed {
        user_id: UserId,
        action: ParticipantAction,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Pin set changed
    PinChanged {
        user_id: UserId,
        pinned: bool,
        evicted: Option<UserId>,
        timestamp: DateTime<Utc>,
    },
}

impl SessionEvent {
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::ParticipantRemoved { .. } => "participant_removed",
            Self::CoHostPromoted { .. } => "co_host_promoted",
            Self::CoHostRemoved { .. } => "co_host_removed",
            Self::ActionFailed { .. } => "action_failed",
            Self::PinChanged { .. } => "pin_changed",
        }
    }

    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        match self {
            Self::ParticipantRemoved { user_id, .. }
            | Self::CoHostPromoted { user_id, .. }
            | Self::CoHostRemoved { user_id, .. }
            | Self::ActionFailed { user_id, .. }
            | Self::PinChanged { user_id, .. } => user_id,
        }
    }

    /// Human-readable text for a notification toast
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::ParticipantRemoved { display_name, .. } => {
                format!("{display_name} was removed from the meeting")
            }
            Self::CoHostPromoted { display_name, .. } => {
                format!("{display_name} is now a co-host")
            }
            Self::CoHostRemoved { display_name, .. } => {
                format!("{display_name} is no longer a co-host")
            }
            Self::ActionFailed { message, .. } => message.clone(),
            Self::PinChanged { user_id, pinned, .. } => {
                if *pinned {
                    format!("Pinned {user_id}")
                } else {
                    format!("Unpinned {user_id}")
                }
            }
        }
    }
}

/// Publish/subscribe channel for one session
#[derive(Debug, Clone)]
pub struct SessionEventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event; returns the number of subscribers that received it.
    ///
    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, event: SessionEvent) -> usize {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(count) => {
                debug!(event_type, subscribers = count, "Session event published");
                count
            }
            Err(_) => {
                debug!(event_type, "Session event dropped, no subscribers");
                0
            }
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SessionEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
