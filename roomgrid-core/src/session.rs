//! Grid session - single entry point for a rendering layer
//!
//! Owns the latest roster snapshot, the optimistic suppression set, the pins
//! and the action coordinator for one viewer in one conferencing session.

use crate::actions::{ActionCoordinator, ActionOutcome, ParticipantAction, ParticipantApi, PendingAction};
use crate::config::GridConfig;
use crate::error::{Error, Result};
use crate::events::{SessionEvent, SessionEventBus};
use crate::participant::Participant;
use crate::pinned::{PinChange, PinnedSet};
use crate::resolver::{Resolution, ResolverRules, StreamResolver};
use crate::stream::{StreamHandle, StreamRegistry};
use crate::suppression::SuppressionSet;
use crate::types::UserId;
use crate::visibility::{compute_visibility, Viewer, VisibilityDecision};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info};

/// Lift suppression entries the roster has caught up with.
///
/// An entry is lifted once its participant is missing from the snapshot or
/// reported as departed. Expired entries are purged as well. Returns the
/// number of entries removed.
pub fn reconcile_suppression(
    suppression: &mut SuppressionSet,
    roster: &[Participant],
    now: Instant,
) -> usize {
    let expired = suppression.purge_expired(now);
    let before = suppression.len();
    suppression.retain(|id| {
        roster
            .iter()
            .any(|p| &p.user_id == id && !p.has_departed())
    });
    expired + (before - suppression.len())
}

/// Participant grid state for one viewer
pub struct GridSession {
    viewer: Viewer,
    roster: RwLock<Vec<Participant>>,
    suppression: Arc<Mutex<SuppressionSet>>,
    pinned: Mutex<PinnedSet>,
    resolver: StreamResolver,
    coordinator: ActionCoordinator,
    events: SessionEventBus,
}

impl std::fmt::Debug for GridSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridSession")
            .field("viewer", &self.viewer)
            .field("roster_len", &self.roster.read().len())
            .finish_non_exhaustive()
    }
}

impl GridSession {
    pub fn new(viewer: Viewer, api: Arc<dyn ParticipantApi>, config: &GridConfig) -> Self {
        let suppression = Arc::new(Mutex::new(SuppressionSet::new(config.suppression_ttl())));
        let events = SessionEventBus::new(config.event_capacity);
        let coordinator = ActionCoordinator::new(api, Arc::clone(&suppression), events.clone());

        info!(
            viewer = %viewer.user_id,
            is_host = viewer.is_host,
            max_pinned = config.max_pinned,
            suppression_ttl_ms = config.suppression_ttl_ms,
            "Grid session created"
        );

        Self {
            viewer,
            roster: RwLock::new(Vec::new()),
            suppression,
            pinned: Mutex::new(PinnedSet::new(config.max_pinned)),
            resolver: StreamResolver::new(ResolverRules::from_config(config)),
            coordinator,
            events,
        }
    }

    #[must_use]
    pub const fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    /// Replace the roster with a fresh snapshot.
    ///
    /// Snapshots are full replacements, never deltas.
    pub fn apply_roster(&self, roster: Vec<Participant>) {
        self.apply_roster_at(roster, Instant::now());
    }

    pub fn apply_roster_at(&self, roster: Vec<Participant>, now: Instant) {
        let lifted = reconcile_suppression(&mut self.suppression.lock(), &roster, now);
        if lifted > 0 {
            debug!(lifted, "Roster caught up with locally removed participants");
        }
        debug!(participants = roster.len(), "Applied roster snapshot");
        *self.roster.write() = roster;
    }

    #[must_use]
    pub fn roster(&self) -> Vec<Participant> {
        self.roster.read().clone()
    }

    #[must_use]
    pub fn participant(&self, user_id: &UserId) -> Option<Participant> {
        self.roster
            .read()
            .iter()
            .find(|p| &p.user_id == user_id)
            .cloned()
    }

    /// Participants to render right now, pinned first
    #[must_use]
    pub fn visible(&self) -> VisibilityDecision {
        self.visible_at(Instant::now())
    }

    #[must_use]
    pub fn visible_at(&self, now: Instant) -> VisibilityDecision {
        let decision = {
            let roster = self.roster.read();
            let suppression = self.suppression.lock();
            compute_visibility(&roster, &self.viewer, &suppression, now)
        };
        decision.order_pinned_first(&self.pinned.lock())
    }

    /// Whether a participant is currently hidden by a local remove
    #[must_use]
    pub fn is_locally_removed(&self, user_id: &UserId) -> bool {
        self.suppression.lock().is_suppressed(user_id, Instant::now())
    }

    pub fn resolve_stream<R>(
        &self,
        participant: &Participant,
        local_stream: Option<&StreamHandle>,
        registry: &R,
    ) -> Option<Resolution>
    where
        R: StreamRegistry + ?Sized,
    {
        self.resolver.resolve(participant, local_stream, registry)
    }

    pub fn pin(&self, user_id: UserId) -> PinChange {
        let change = self.pinned.lock().pin(user_id.clone());
        self.publish_pin_change(user_id, &change);
        change
    }

    pub fn unpin(&self, user_id: &UserId) -> PinChange {
        let change = self.pinned.lock().unpin(user_id);
        self.publish_pin_change(user_id.clone(), &change);
        change
    }

    pub fn toggle_pin(&self, user_id: UserId) -> PinChange {
        let change = self.pinned.lock().toggle(user_id.clone());
        self.publish_pin_change(user_id, &change);
        change
    }

    #[must_use]
    pub fn pinned(&self) -> Vec<UserId> {
        self.pinned.lock().iter().cloned().collect()
    }

    fn publish_pin_change(&self, user_id: UserId, change: &PinChange) {
        let (pinned, evicted) = match change {
            PinChange::Pinned { evicted } => (true, evicted.clone()),
            PinChange::Unpinned => (false, None),
            PinChange::AlreadyPinned | PinChange::NotPinned => return,
        };
        self.events.publish(SessionEvent::PinChanged {
            user_id,
            pinned,
            evicted,
            timestamp: Utc::now(),
        });
    }

    /// Start a guarded action against a participant in the current roster
    pub fn request_action(&self, action: ParticipantAction, user_id: &UserId) -> Result<PendingAction> {
        let participant = self
            .participant(user_id)
            .ok_or_else(|| Error::UnknownParticipant(user_id.clone()))?;
        self.coordinator.request(action, &participant)
    }

    pub async fn confirm_action(&self, user_id: &UserId) -> Result<ActionOutcome> {
        self.coordinator.confirm(user_id).await
    }

    pub fn cancel_action(&self, user_id: &UserId) -> Result<PendingAction> {
        self.coordinator.cancel(user_id)
    }

    #[must_use]
    pub fn pending_action(&self, user_id: &UserId) -> Option<PendingAction> {
        self.coordinator.pending(user_id)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Tear down: results of in-flight actions are discarded from now on
    pub fn dispose(&self) {
        info!(viewer = %self.viewer.user_id, "Grid session disposed");
        self.coordinator.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ApiResponse, PromoteRequest, RemoveParticipantRequest};
    use crate::participant::ParticipantStatus;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct AcceptAll;

    #[async_trait]
    impl ParticipantApi for AcceptAll {
        async fn remove_participant(&self, _request: RemoveParticipantRequest) -> Result<ApiResponse> {
            Ok(ApiResponse::ok())
        }

        async fn promote_to_host(&self, _request: PromoteRequest) -> Result<ApiResponse> {
            Ok(ApiResponse::ok())
        }

        async fn remove_co_host(&self, _user_id: &UserId, _display_name: &str) -> Result<ApiResponse> {
            Ok(ApiResponse::ok())
        }
    }

    /// Holds every call until released
    #[derive(Default)]
    struct HeldApi {
        entered: Notify,
        release: Notify,
    }

    impl HeldApi {
        async fn hold(&self) -> Result<ApiResponse> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(ApiResponse::ok())
        }
    }

    #[async_trait]
    impl ParticipantApi for HeldApi {
        async fn remove_participant(&self, _request: RemoveParticipantRequest) -> Result<ApiResponse> {
            self.hold().await
        }

        async fn promote_to_host(&self, _request: PromoteRequest) -> Result<ApiResponse> {
            self.hold().await
        }

        async fn remove_co_host(&self, _user_id: &UserId, _display_name: &str) -> Result<ApiResponse> {
            self.hold().await
        }
    }

    fn host_session() -> GridSession {
        let session = GridSession::new(Viewer::host("1"), Arc::new(AcceptAll), &GridConfig::default());
        session.apply_roster(vec![
            Participant::new("1", "Host").with_host().with_local(),
            Participant::new("2", "Ann"),
            Participant::new("3", "Ben"),
        ]);
        session
    }

    fn ids(decision: &VisibilityDecision) -> Vec<String> {
        decision.user_ids().map(ToString::to_string).collect()
    }

    #[test]
    fn test_reconcile_lifts_confirmed_removals() {
        let now = Instant::now();
        let mut suppression = SuppressionSet::default();
        suppression.suppress(UserId::from("gone"), now);
        suppression.suppress(UserId::from("left"), now);
        suppression.suppress(UserId::from("still-here"), now);

        let roster = vec![
            Participant::new("left", "L").with_status(ParticipantStatus::Removed),
            Participant::new("still-here", "S"),
        ];

        assert_eq!(reconcile_suppression(&mut suppression, &roster, now), 2);
        assert!(suppression.is_suppressed(&UserId::from("still-here"), now));
        assert_eq!(suppression.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_hides_immediately_and_roster_confirms() {
        let session = host_session();
        let target = UserId::from("2");

        session.request_action(ParticipantAction::Remove, &target).unwrap();
        assert_eq!(ids(&session.visible()), vec!["2", "3"]);

        let outcome = session.confirm_action(&target).await.unwrap();
        assert!(matches!(outcome, ActionOutcome::Applied(_)));
        assert_eq!(ids(&session.visible()), vec!["3"]);
        assert!(session.is_locally_removed(&target));

        session.apply_roster(vec![
            Participant::new("1", "Host").with_host().with_local(),
            Participant::new("3", "Ben"),
        ]);
        assert!(!session.is_locally_removed(&target));
        assert_eq!(ids(&session.visible()), vec!["3"]);
    }

    #[tokio::test]
    async fn test_remove_hides_while_backend_pending() {
        let api = Arc::new(HeldApi::default());
        let session = Arc::new(GridSession::new(Viewer::host("1"), api.clone(), &GridConfig::default()));
        session.apply_roster(vec![
            Participant::new("1", "Host").with_host().with_local(),
            Participant::new("9", "Bob"),
            Participant::new("3", "Ben"),
        ]);
        let target = UserId::from("9");

        session.request_action(ParticipantAction::Remove, &target).unwrap();
        let task = {
            let session = session.clone();
            let target = target.clone();
            tokio::spawn(async move { session.confirm_action(&target).await })
        };

        api.entered.notified().await;
        assert!(!session.visible().user_ids().any(|id| id == &target));
        assert_eq!(ids(&session.visible()), vec!["3"]);
        assert!(session.pending_action(&target).is_some());

        api.release.notify_one();
        let outcome = task.await.unwrap().unwrap();
        assert!(matches!(outcome, ActionOutcome::Applied(_)));
        assert!(session.pending_action(&target).is_none());
        assert_eq!(ids(&session.visible()), vec!["3"]);
    }

    #[test]
    fn test_request_for_unknown_participant() {
        let session = host_session();
        assert!(matches!(
            session.request_action(ParticipantAction::Promote, &UserId::from("99")),
            Err(Error::UnknownParticipant(_))
        ));
    }

    #[tokio::test]
    async fn test_pins_order_grid_and_publish() {
        let session = host_session();
        let mut rx = session.subscribe();

        session.pin(UserId::from("3"));
        assert_eq!(ids(&session.visible()), vec!["3", "2"]);
        assert_eq!(session.pinned(), vec![UserId::from("3")]);

        match rx.recv().await.unwrap() {
            SessionEvent::PinChanged { user_id, pinned, evicted, .. } => {
                assert_eq!(user_id, UserId::from("3"));
                assert!(pinned);
                assert!(evicted.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }

        assert_eq!(session.toggle_pin(UserId::from("3")), PinChange::Unpinned);
        assert!(session.pinned().is_empty());
        assert_eq!(session.unpin(&UserId::from("3")), PinChange::NotPinned);
    }

    #[test]
    fn test_suppression_ttl_from_config() {
        let config = GridConfig {
            suppression_ttl_ms: 1_000,
            ..GridConfig::default()
        };
        let session = GridSession::new(Viewer::host("1"), Arc::new(AcceptAll), &config);
        session.apply_roster(vec![Participant::new("2", "Ann")]);

        let now = Instant::now();
        session.suppression.lock().suppress(UserId::from("2"), now);
        assert!(session.visible_at(now).is_empty());
        assert_eq!(session.visible_at(now + Duration::from_secs(1)).len(), 1);
    }
}
