//! Participant management actions
//!
//! Remove, promote and demote each go through a confirmation step:
//!
//! ```text
//! idle -> confirming -> cancelled -> idle
//!                    -> applying  -> applied | failed -> idle
//! ```
//!
//! Only one action per participant may be confirming or applying at a time.
//! A confirmed remove hides the participant immediately through the
//! [`SuppressionSet`], before the backend answers.

use crate::error::{Error, Result};
use crate::events::{SessionEvent, SessionEventBus};
use crate::participant::Participant;
use crate::suppression::SuppressionSet;
use crate::types::UserId;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Guarded participant-management operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantAction {
    Remove,
    Promote,
    #[serde(rename = "remove_cohost")]
    RemoveCoHost,
}

impl ParticipantAction {
    #[must_use]
    pub fn confirmation_message(&self, display_name: &str) -> String {
        match self {
            Self::Remove => format!("Remove {display_name} from the meeting?"),
            Self::Promote => format!("Make {display_name} a co-host?"),
            Self::RemoveCoHost => format!("Remove co-host privileges from {display_name}?"),
        }
    }

    const fn verb(&self) -> &'static str {
        match self {
            Self::Remove => "remove",
            Self::Promote => "promote",
            Self::RemoveCoHost => "remove co-host privileges from",
        }
    }
}

/// Progress of one action invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum ActionState {
    Confirming,
    Applying,
    Applied,
    Failed(String),
    Cancelled,
}

impl ActionState {
    /// Confirming or applying; blocks further actions on the participant
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(self, Self::Confirming | Self::Applying)
    }
}

/// An action awaiting confirmation or completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingAction {
    pub action: ParticipantAction,
    pub user_id: UserId,
    pub display_name: String,
    pub message: String,
    pub state: ActionState,
}

/// Request body for removing a participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveParticipantRequest {
    pub user_id: UserId,
    pub display_name: String,
}

/// Request body for promoting a participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoteRequest {
    pub user_id: UserId,
    pub display_name: String,
}

/// Backend answer to a participant-management call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Participant-management backend
#[async_trait]
pub trait ParticipantApi: Send + Sync {
    async fn remove_participant(&self, request: RemoveParticipantRequest) -> Result<ApiResponse>;

    async fn promote_to_host(&self, request: PromoteRequest) -> Result<ApiResponse>;

    async fn remove_co_host(&self, user_id: &UserId, display_name: &str) -> Result<ApiResponse>;
}

/// Terminal result of a confirmed action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Applied(PendingAction),
    Failed(PendingAction),
    /// The owning view was disposed while the call was in flight
    Discarded,
}

/// Clears an `Applying` entry when dropped, including when the `confirm`
/// future itself is dropped while the backend call is pending.
struct InFlight<'a> {
    pending: &'a Mutex<HashMap<UserId, PendingAction>>,
    user_id: UserId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut pending = self.pending.lock();
        if pending
            .get(&self.user_id)
            .is_some_and(|p| p.state == ActionState::Applying)
        {
            pending.remove(&self.user_id);
        }
    }
}

/// Coordinates confirmation, execution and optimistic state of actions
pub struct ActionCoordinator {
    api: Arc<dyn ParticipantApi>,
    pending: Mutex<HashMap<UserId, PendingAction>>,
    suppression: Arc<Mutex<SuppressionSet>>,
    events: SessionEventBus,
    disposed: CancellationToken,
}

impl std::fmt::Debug for ActionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionCoordinator")
            .field("pending", &self.pending.lock().len())
            .field("disposed", &self.disposed.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl ActionCoordinator {
    pub fn new(
        api: Arc<dyn ParticipantApi>,
        suppression: Arc<Mutex<SuppressionSet>>,
        events: SessionEventBus,
    ) -> Self {
        Self {
            api,
            pending: Mutex::new(HashMap::new()),
            suppression,
            events,
            disposed: CancellationToken::new(),
        }
    }

    /// Start an action; it stays in `confirming` until confirmed or cancelled
    pub fn request(&self, action: ParticipantAction, participant: &Participant) -> Result<PendingAction> {
        let mut pending = self.pending.lock();
        if pending
            .get(&participant.user_id)
            .is_some_and(|p| p.state.is_in_flight())
        {
            warn!(
                user_id = %participant.user_id,
                action = ?action,
                "Rejected action, another one is in progress"
            );
            return Err(Error::ActionInProgress(participant.user_id.clone()));
        }

        let display_name = participant.name().to_string();
        let entry = PendingAction {
            action,
            user_id: participant.user_id.clone(),
            message: action.confirmation_message(&display_name),
            display_name,
            state: ActionState::Confirming,
        };
        pending.insert(participant.user_id.clone(), entry.clone());

        debug!(user_id = %participant.user_id, action = ?action, "Awaiting confirmation");
        Ok(entry)
    }

    /// Current action for a participant, if any
    #[must_use]
    pub fn pending(&self, user_id: &UserId) -> Option<PendingAction> {
        self.pending.lock().get(user_id).cloned()
    }

    #[must_use]
    pub fn is_busy(&self, user_id: &UserId) -> bool {
        self.pending
            .lock()
            .get(user_id)
            .is_some_and(|p| p.state.is_in_flight())
    }

    /// Abandon an action that has not been confirmed yet
    pub fn cancel(&self, user_id: &UserId) -> Result<PendingAction> {
        let mut pending = self.pending.lock();
        match pending.get(user_id).map(|p| p.state.clone()) {
            None => Err(Error::NoPendingAction(user_id.clone())),
            Some(ActionState::Confirming) => {
                let mut entry = pending
                    .remove(user_id)
                    .ok_or_else(|| Error::NoPendingAction(user_id.clone()))?;
                entry.state = ActionState::Cancelled;
                debug!(user_id = %user_id, action = ?entry.action, "Action cancelled");
                Ok(entry)
            }
            Some(state) => Err(Error::InvalidTransition {
                user_id: user_id.clone(),
                reason: format!("cannot cancel an action in state {state:?}"),
            }),
        }
    }

    /// Confirm and execute the pending action for a participant.
    ///
    /// Always ends in a terminal outcome and clears the pending entry, also
    /// when the returned future is dropped before the backend answers. A
    /// failed remove keeps its suppression entry until it expires.
    pub async fn confirm(&self, user_id: &UserId) -> Result<ActionOutcome> {
        let mut entry = {
            let mut pending = self.pending.lock();
            let entry = pending
                .get_mut(user_id)
                .ok_or_else(|| Error::NoPendingAction(user_id.clone()))?;
            match entry.state {
                ActionState::Confirming => {}
                ActionState::Applying => return Err(Error::ActionInProgress(user_id.clone())),
                ref other => {
                    return Err(Error::InvalidTransition {
                        user_id: user_id.clone(),
                        reason: format!("cannot confirm an action in state {other:?}"),
                    })
                }
            }
            entry.state = ActionState::Applying;
            entry.clone()
        };
        let in_flight = InFlight {
            pending: &self.pending,
            user_id: user_id.clone(),
        };

        if entry.action == ParticipantAction::Remove {
            self.suppression
                .lock()
                .suppress(entry.user_id.clone(), Instant::now());
        }

        let result = self.call_backend(&entry).await;

        drop(in_flight);

        if self.disposed.is_cancelled() {
            debug!(user_id = %user_id, action = ?entry.action, "View disposed, discarding action result");
            return Ok(ActionOutcome::Discarded);
        }

        let failure = match result {
            Ok(response) if response.success => None,
            Ok(response) => Some(
                response
                    .error
                    .unwrap_or_else(|| "request was not accepted".to_string()),
            ),
            Err(e) => Some(e.to_string()),
        };

        let timestamp = Utc::now();
        match failure {
            None => {
                entry.state = ActionState::Applied;
                info!(user_id = %entry.user_id, action = ?entry.action, "Participant action applied");
                let event = match entry.action {
                    ParticipantAction::Remove => SessionEvent::ParticipantRemoved {
                        user_id: entry.user_id.clone(),
                        display_name: entry.display_name.clone(),
                        timestamp,
                    },
                    ParticipantAction::Promote => SessionEvent::CoHostPromoted {
                        user_id: entry.user_id.clone(),
                        display_name: entry.display_name.clone(),
                        timestamp,
                    },
                    ParticipantAction::RemoveCoHost => SessionEvent::CoHostRemoved {
                        user_id: entry.user_id.clone(),
                        display_name: entry.display_name.clone(),
                        timestamp,
                    },
                };
                self.events.publish(event);
                Ok(ActionOutcome::Applied(entry))
            }
            Some(detail) => {
                let message = format!(
                    "Failed to {} {}: {detail}",
                    entry.action.verb(),
                    entry.display_name
                );
                warn!(
                    user_id = %entry.user_id,
                    action = ?entry.action,
                    error = %detail,
                    "Participant action failed"
                );
                entry.state = ActionState::Failed(message.clone());
                self.events.publish(SessionEvent::ActionFailed {
                    user_id: entry.user_id.clone(),
                    action: entry.action,
                    message,
                    timestamp,
                });
                Ok(ActionOutcome::Failed(entry))
            }
        }
    }

    /// Request and immediately confirm, for callers that confirm elsewhere
    pub async fn perform(&self, action: ParticipantAction, participant: &Participant) -> Result<ActionOutcome> {
        self.request(action, participant)?;
        self.confirm(&participant.user_id).await
    }

    async fn call_backend(&self, entry: &PendingAction) -> Result<ApiResponse> {
        match entry.action {
            ParticipantAction::Remove => {
                self.api
                    .remove_participant(RemoveParticipantRequest {
                        user_id: entry.user_id.clone(),
                        display_name: entry.display_name.clone(),
                    })
                    .await
            }
            ParticipantAction::Promote => {
                self.api
                    .promote_to_host(PromoteRequest {
                        user_id: entry.user_id.clone(),
                        display_name: entry.display_name.clone(),
                    })
                    .await
            }
            ParticipantAction::RemoveCoHost => {
                self.api
                    .remove_co_host(&entry.user_id, &entry.display_name)
                    .await
            }
        }
    }

    /// Mark the owning view as gone; results that arrive later are dropped
    pub fn dispose(&self) {
        self.disposed.cancel();
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.is_cancelled()
    }
}
