//! Roster entries as reported by the backend and the transport

use crate::error::Result;
use crate::stream::StreamHandle;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

const CO_HOST_ROLES: &[&str] = &["cohost", "co-host", "co_host"];

/// Role flag as it appears in roster payloads.
///
/// Some backends send `"isHost": true`, others `"isHost": "host"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawRoleFlag {
    Flag(bool),
    Role(String),
}

impl RawRoleFlag {
    fn matches(self, roles: &[&str]) -> bool {
        match self {
            Self::Flag(flag) => flag,
            Self::Role(role) => {
                role.eq_ignore_ascii_case("true")
                    || roles.iter().any(|r| role.eq_ignore_ascii_case(r))
            }
        }
    }
}

fn host_flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    let raw = Option::<RawRoleFlag>::deserialize(deserializer)?;
    Ok(raw.is_some_and(|flag| flag.matches(&["host"])))
}

fn co_host_flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    let raw = Option::<RawRoleFlag>::deserialize(deserializer)?;
    Ok(raw.is_some_and(|flag| flag.matches(CO_HOST_ROLES)))
}

/// Lifecycle status of a roster entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    #[default]
    Active,
    Offline,
    Removed,
    Left,
}

impl ParticipantStatus {
    /// Offline, removed and left entries are never rendered
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Offline | Self::Removed | Self::Left)
    }
}

/// One participant in the roster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Participant {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    #[serde(deserialize_with = "host_flag")]
    pub is_host: bool,
    #[serde(deserialize_with = "co_host_flag")]
    pub is_co_host: bool,
    /// Free-form role string; `"host"` and `"cohost"` are honoured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub is_local: bool,

    pub is_audio_enabled: bool,
    #[serde(alias = "video_enabled")]
    pub is_video_enabled: bool,
    pub is_screen_sharing: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub leave_time: Option<DateTime<Utc>>,
    pub status: ParticipantStatus,

    pub display_name: String,

    /// Stream attached directly by the transport, bypassing key lookup
    #[serde(skip)]
    pub stream: Option<StreamHandle>,
}

impl Participant {
    pub fn new(user_id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_host(mut self) -> Self {
        self.is_host = true;
        self
    }

    #[must_use]
    pub fn with_co_host(mut self) -> Self {
        self.is_co_host = true;
        self
    }

    #[must_use]
    pub fn with_local(mut self) -> Self {
        self.is_local = true;
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: ParticipantStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_stream(mut self, stream: StreamHandle) -> Self {
        self.stream = Some(stream);
        self
    }

    #[must_use]
    pub fn is_host(&self) -> bool {
        self.is_host || self.role_is(&["host"])
    }

    #[must_use]
    pub fn is_co_host(&self) -> bool {
        self.is_co_host || self.role_is(CO_HOST_ROLES)
    }

    /// Host or co-host
    #[must_use]
    pub fn has_host_role(&self) -> bool {
        self.is_host() || self.is_co_host()
    }

    /// Whether the entry has left the session according to the backend
    #[must_use]
    pub fn has_departed(&self) -> bool {
        self.leave_time.is_some() || self.status.is_terminal()
    }

    /// Name to show, falling back to the user id
    #[must_use]
    pub fn name(&self) -> &str {
        let trimmed = self.display_name.trim();
        if trimmed.is_empty() {
            self.user_id.as_str()
        } else {
            trimmed
        }
    }

    /// Up to two initials for the avatar placeholder
    #[must_use]
    pub fn initials(&self) -> String {
        let initials: String = self
            .display_name
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect();

        if initials.is_empty() {
            self.user_id
                .as_str()
                .chars()
                .next()
                .map(|c| c.to_uppercase().collect())
                .unwrap_or_else(|| "?".to_string())
        } else {
            initials
        }
    }

    fn role_is(&self, names: &[&str]) -> bool {
        self.role
            .as_deref()
            .is_some_and(|role| names.iter().any(|n| role.eq_ignore_ascii_case(n)))
    }
}

/// Parse a roster snapshot (a JSON array of entries)
pub fn parse_roster(json: &str) -> Result<Vec<Participant>> {
    Ok(serde_json::from_str(json)?)
}

/// Read a roster snapshot from a JSON file
pub fn load_roster(path: impl AsRef<Path>) -> Result<Vec<Participant>> {
    let raw = std::fs::read_to_string(path)?;
    parse_roster(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_backend_payload() {
        let json = r#"{
            "userId": 42,
            "participantId": "PA_abc",
            "role": "host",
            "video_enabled": true,
            "status": "active",
            "displayName": "Ada Lovelace"
        }"#;

        let p: Participant = serde_json::from_str(json).unwrap();
        assert_eq!(p.user_id.as_str(), "42");
        assert!(p.is_host());
        assert!(!p.is_co_host());
        assert!(p.is_video_enabled);
        assert_eq!(p.participant_id.as_deref(), Some("PA_abc"));
        assert!(p.stream.is_none());
    }

    #[test]
    fn test_leave_time_marks_departed() {
        let json = r#"{"userId":"9","leaveTime":"2026-01-05T10:00:00Z"}"#;
        let p: Participant = serde_json::from_str(json).unwrap();
        assert!(p.has_departed());
        assert_eq!(p.status, ParticipantStatus::Active);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!ParticipantStatus::Active.is_terminal());
        assert!(ParticipantStatus::Offline.is_terminal());
        assert!(ParticipantStatus::Removed.is_terminal());
        assert!(ParticipantStatus::Left.is_terminal());
    }

    #[test]
    fn test_role_string_in_flag_fields() {
        let p: Participant = serde_json::from_str(r#"{"userId":1,"isHost":"host"}"#).unwrap();
        assert!(p.is_host);
        assert!(p.is_host());

        let p: Participant =
            serde_json::from_str(r#"{"userId":2,"isHost":"student","isCoHost":"co-host"}"#).unwrap();
        assert!(!p.is_host());
        assert!(p.is_co_host());

        let p: Participant =
            serde_json::from_str(r#"{"userId":3,"isHost":false,"isCoHost":null}"#).unwrap();
        assert!(!p.has_host_role());
    }

    #[test]
    fn test_roster_with_mixed_host_flags() {
        let roster: Vec<Participant> = serde_json::from_str(
            r#"[{"userId":1,"isHost":"host"},{"userId":2,"isHost":true},{"userId":3}]"#,
        )
        .unwrap();
        let hosts: Vec<bool> = roster.iter().map(Participant::is_host).collect();
        assert_eq!(hosts, vec![true, true, false]);
    }

    #[test]
    fn test_load_roster_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(load_roster(&missing), Err(crate::Error::Io(_))));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, r#"[{"userId": 1,"#).unwrap();
        assert!(matches!(load_roster(&broken), Err(crate::Error::Serialization(_))));

        let good = dir.path().join("roster.json");
        std::fs::write(&good, r#"[{"userId": 1, "isHost": "host"}, {"userId": "2"}]"#).unwrap();
        let roster = load_roster(&good).unwrap();
        assert_eq!(roster.len(), 2);
        assert!(roster[0].is_host());
    }

    #[test]
    fn test_co_host_role_string() {
        let mut p = Participant::new("3", "Grace");
        p.role = Some("CoHost".to_string());
        assert!(p.is_co_host());
        assert!(p.has_host_role());
        assert!(!p.is_host());
    }

    #[test]
    fn test_initials() {
        assert_eq!(Participant::new("1", "ada lovelace byron").initials(), "AL");
        assert_eq!(Participant::new("1", "Grace").initials(), "G");
        assert_eq!(Participant::new("zed", "  ").initials(), "Z");
        assert_eq!(Participant::new("", "").initials(), "?");
    }

    #[test]
    fn test_name_falls_back_to_user_id() {
        assert_eq!(Participant::new("77", "").name(), "77");
        assert_eq!(Participant::new("77", " Bob ").name(), "Bob");
    }
}
