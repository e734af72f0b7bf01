//! Which participants a viewer sees
//!
//! Hosts see every student and co-host but neither other hosts nor
//! themselves. Everyone else sees themselves plus the hosts and co-hosts.
//! Departed, offline and locally removed participants are hidden for all
//! viewers.

use crate::participant::Participant;
use crate::pinned::PinnedSet;
use crate::suppression::SuppressionSet;
use crate::types::UserId;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// The viewing client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    pub user_id: UserId,
    /// Host authority (hosts and co-hosts acting as hosts)
    pub is_host: bool,
}

impl Viewer {
    pub fn host(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            is_host: true,
        }
    }

    pub fn participant(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            is_host: false,
        }
    }
}

/// Display tag; has no bearing on inclusion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelType {
    #[default]
    None,
    Student,
    Host,
    Cohost,
}

/// What to render instead of an empty grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EmptyState {
    /// Host view: nobody else has joined yet
    NoOneJoined,
    /// Participant view: not connected to anyone yet
    WaitingToConnect,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleParticipant {
    pub participant: Participant,
    pub label: LabelType,
}

/// Ordered participants to render for one viewer and roster snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityDecision {
    pub entries: Vec<VisibleParticipant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_state: Option<EmptyState>,
}

impl VisibilityDecision {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn user_ids(&self) -> impl Iterator<Item = &UserId> + '_ {
        self.entries.iter().map(|e| &e.participant.user_id)
    }

    /// Move pinned participants to the front in pin order.
    ///
    /// Unpinned entries keep their relative order; nothing is added or dropped.
    #[must_use]
    pub fn order_pinned_first(mut self, pinned: &PinnedSet) -> Self {
        self.entries.sort_by_key(|entry| {
            pinned
                .position(&entry.participant.user_id)
                .unwrap_or(usize::MAX)
        });
        self
    }
}

/// Hidden regardless of the viewer's role
#[must_use]
pub fn is_suppressed(participant: &Participant, suppression: &SuppressionSet, now: Instant) -> bool {
    participant.has_departed() || suppression.is_suppressed(&participant.user_id, now)
}

/// The viewer's own roster entry, flagged local by the transport or
/// matching the viewer's id when the flag is missing
fn is_own_entry(participant: &Participant, viewer: &Viewer) -> bool {
    participant.is_local || participant.user_id == viewer.user_id
}

fn label_for(participant: &Participant, viewer: &Viewer) -> LabelType {
    if viewer.is_host {
        LabelType::None
    } else if is_own_entry(participant, viewer) {
        LabelType::Student
    } else if participant.is_host() {
        LabelType::Host
    } else if participant.is_co_host() {
        LabelType::Cohost
    } else {
        LabelType::None
    }
}

/// Compute the grid for `viewer` from a full roster snapshot
#[must_use]
pub fn compute_visibility(
    roster: &[Participant],
    viewer: &Viewer,
    suppression: &SuppressionSet,
    now: Instant,
) -> VisibilityDecision {
    let visible = roster.iter().filter(|p| !is_suppressed(p, suppression, now));

    let selected: Vec<&Participant> = if viewer.is_host {
        visible
            .filter(|p| !p.is_host() && !is_own_entry(p, viewer))
            .collect()
    } else {
        let (local, others): (Vec<&Participant>, Vec<&Participant>) =
            visible.partition(|p| is_own_entry(p, viewer));
        local
            .into_iter()
            .take(1)
            .chain(others.into_iter().filter(|p| p.has_host_role()))
            .collect()
    };

    let entries: Vec<VisibleParticipant> = selected
        .into_iter()
        .map(|p| VisibleParticipant {
            label: label_for(p, viewer),
            participant: p.clone(),
        })
        .collect();

    let empty_state = if entries.is_empty() {
        Some(if viewer.is_host {
            EmptyState::NoOneJoined
        } else {
            EmptyState::WaitingToConnect
        })
    } else {
        None
    };

    VisibilityDecision {
        entries,
        empty_state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::ParticipantStatus;
    use chrono::Utc;
    use std::time::Duration;

    fn roster() -> Vec<Participant> {
        vec![
            Participant::new("1", "Host").with_host(),
            Participant::new("2", "Me").with_local(),
            Participant::new("3", "Other"),
        ]
    }

    /// Same roster as seen from the host's own client
    fn host_side(mut roster: Vec<Participant>) -> Vec<Participant> {
        for p in &mut roster {
            p.is_local = p.user_id.as_str() == "1";
        }
        roster
    }

    fn ids(decision: &VisibilityDecision) -> Vec<&str> {
        decision.user_ids().map(UserId::as_str).collect()
    }

    fn labels(decision: &VisibilityDecision) -> Vec<LabelType> {
        decision.entries.iter().map(|e| e.label).collect()
    }

    #[test]
    fn test_participant_view() {
        let decision = compute_visibility(
            &roster(),
            &Viewer::participant("2"),
            &SuppressionSet::default(),
            Instant::now(),
        );
        assert_eq!(ids(&decision), vec!["2", "1"]);
        assert_eq!(labels(&decision), vec![LabelType::Student, LabelType::Host]);
        assert!(decision.empty_state.is_none());
    }

    #[test]
    fn test_host_view() {
        let decision = compute_visibility(
            &host_side(roster()),
            &Viewer::host("1"),
            &SuppressionSet::default(),
            Instant::now(),
        );
        assert_eq!(ids(&decision), vec!["2", "3"]);
        assert_eq!(labels(&decision), vec![LabelType::None, LabelType::None]);
    }

    #[test]
    fn test_local_entry_symmetry() {
        let roster = roster();
        let none = SuppressionSet::default();
        let now = Instant::now();

        let as_participant = compute_visibility(&roster, &Viewer::participant("2"), &none, now);
        assert!(as_participant.user_ids().any(|id| id.as_str() == "2"));

        let as_host = compute_visibility(&roster, &Viewer::host("2"), &none, now);
        assert!(as_host.user_ids().all(|id| id.as_str() != "2"));
    }

    #[test]
    fn test_co_hosts_visible_to_participants_with_label() {
        let mut roster = roster();
        roster.push(Participant::new("4", "Co").with_co_host());

        let decision = compute_visibility(
            &roster,
            &Viewer::participant("2"),
            &SuppressionSet::default(),
            Instant::now(),
        );
        assert_eq!(ids(&decision), vec!["2", "1", "4"]);
        assert_eq!(decision.entries[2].label, LabelType::Cohost);
    }

    #[test]
    fn test_suppression_rules_apply_to_every_viewer() {
        let now = Instant::now();
        let mut roster = roster();
        roster.push(Participant::new("5", "Gone").with_status(ParticipantStatus::Left));
        roster.push(Participant::new("6", "Offline").with_status(ParticipantStatus::Offline));
        let mut departed = Participant::new("7", "Departed");
        departed.leave_time = Some(Utc::now());
        roster.push(departed);
        let mut removed_host = Participant::new("8", "Removed co-host").with_co_host();
        removed_host.status = ParticipantStatus::Removed;
        roster.push(removed_host);

        let mut suppression = SuppressionSet::default();
        suppression.suppress(UserId::from("3"), now);

        let participant_view = compute_visibility(&roster, &Viewer::participant("2"), &suppression, now);
        assert_eq!(ids(&participant_view), vec!["2", "1"]);

        let host_view = compute_visibility(&host_side(roster), &Viewer::host("1"), &suppression, now);
        assert_eq!(ids(&host_view), vec!["2"]);
    }

    #[test]
    fn test_optimistic_suppression_expires() {
        let now = Instant::now();
        let mut suppression = SuppressionSet::default();
        suppression.suppress(UserId::from("3"), now);
        let viewer = Viewer::host("1");

        let hidden = compute_visibility(&host_side(roster()), &viewer, &suppression, now);
        assert_eq!(ids(&hidden), vec!["2"]);

        let later = now + Duration::from_secs(5);
        let back = compute_visibility(&host_side(roster()), &viewer, &suppression, later);
        assert_eq!(ids(&back), vec!["2", "3"]);
    }

    #[test]
    fn test_suppressed_local_entry_hidden_from_itself() {
        let now = Instant::now();
        let mut suppression = SuppressionSet::default();
        suppression.suppress(UserId::from("2"), now);

        let decision = compute_visibility(&roster(), &Viewer::participant("2"), &suppression, now);
        assert_eq!(ids(&decision), vec!["1"]);
    }

    #[test]
    fn test_own_entry_without_local_flag() {
        let roster = vec![
            Participant::new("1", "Host").with_host(),
            Participant::new("2", "Me"),
        ];
        let decision = compute_visibility(
            &roster,
            &Viewer::participant("2"),
            &SuppressionSet::default(),
            Instant::now(),
        );
        assert_eq!(ids(&decision), vec!["2", "1"]);
        assert_eq!(decision.entries[0].label, LabelType::Student);
    }

    #[test]
    fn test_empty_states() {
        let none = SuppressionSet::default();
        let now = Instant::now();

        let host = compute_visibility(&[], &Viewer::host("1"), &none, now);
        assert_eq!(host.empty_state, Some(EmptyState::NoOneJoined));

        let participant = compute_visibility(&[], &Viewer::participant("2"), &none, now);
        assert_eq!(participant.empty_state, Some(EmptyState::WaitingToConnect));
    }

    #[test]
    fn test_pinned_first_is_stable() {
        let roster = vec![
            Participant::new("a", "A"),
            Participant::new("b", "B"),
            Participant::new("c", "C"),
            Participant::new("d", "D"),
        ];
        let decision = compute_visibility(
            &roster,
            &Viewer::host("h"),
            &SuppressionSet::default(),
            Instant::now(),
        );

        let mut pinned = PinnedSet::default();
        pinned.pin(UserId::from("d"));
        pinned.pin(UserId::from("b"));
        pinned.pin(UserId::from("zz"));

        let ordered = decision.order_pinned_first(&pinned);
        assert_eq!(ids(&ordered), vec!["d", "b", "a", "c"]);
    }
}
