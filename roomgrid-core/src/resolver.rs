//! Stream key resolution
//!
//! Transports name their streams inconsistently: by user id, by connection
//! id, by role (`host_42`), or by provider (`livekit_42`). The resolver walks
//! a fixed priority of increasingly loose layers and returns the first stream
//! that still has a live track:
//!
//! 1. stream attached directly to the participant
//! 2. local stream, for the local participant only
//! 3. exact match on identity keys, then role keys for hosts ([`candidate_keys`])
//! 4. registry keys containing the participant's id ([`key_mentions_participant`])
//! 5. registry keys hinting at a host role, for hosts only ([`key_suggests_role`])
//!
//! Every layer is a plain function so provider quirks can be added through
//! [`ResolverRules`] without touching the order.

use crate::config::GridConfig;
use crate::participant::Participant;
use crate::stream::{StreamHandle, StreamRegistry};
use indexmap::IndexSet;
use serde::Serialize;
use tracing::trace;

/// Provider prefixes tried as `<prefix>_<userId>` for hosts and co-hosts
pub const PROVIDER_KEY_PREFIXES: &[&str] = &["instructor", "teacher", "admin", "livekit", "remote"];

/// Substrings that mark a registry key as a host stream
pub const ROLE_KEY_HINTS: &[&str] = &[
    "host",
    "cohost",
    "instructor",
    "teacher",
    "admin",
    "livekit",
    "remote",
];

/// Data-driven part of the heuristics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverRules {
    pub provider_prefixes: Vec<String>,
    pub role_hints: Vec<String>,
}

impl Default for ResolverRules {
    fn default() -> Self {
        Self {
            provider_prefixes: PROVIDER_KEY_PREFIXES.iter().map(ToString::to_string).collect(),
            role_hints: ROLE_KEY_HINTS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl ResolverRules {
    /// Built-in rules followed by the configured extras
    #[must_use]
    pub fn from_config(config: &GridConfig) -> Self {
        let mut rules = Self::default();
        rules
            .provider_prefixes
            .extend(config.extra_role_prefixes.iter().cloned());
        rules.role_hints.extend(
            config
                .extra_role_hints
                .iter()
                .map(|hint| hint.to_lowercase()),
        );
        rules
    }
}

/// Which layer produced a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum ResolutionPath {
    Direct,
    Local,
    ExactKey(String),
    IdSubstring(String),
    RoleSubstring(String),
}

/// A resolved stream together with the layer that found it
#[derive(Debug, Clone)]
pub struct Resolution {
    pub stream: StreamHandle,
    pub path: ResolutionPath,
}

/// Keys derived from the participant's identifiers, most specific first
#[must_use]
pub fn identity_keys(participant: &Participant) -> Vec<String> {
    let user_id = participant.user_id.as_str();
    let mut keys = IndexSet::new();

    if !user_id.is_empty() {
        keys.insert(user_id.to_string());
        keys.insert(format!("user_{user_id}"));
        keys.insert(format!("participant_{user_id}"));
    }

    for id in [
        participant.participant_id.as_deref(),
        participant.connection_id.as_deref(),
        participant.identity.as_deref(),
        participant.sid.as_deref(),
    ]
    .into_iter()
    .flatten()
    {
        if !id.is_empty() {
            keys.insert(id.to_string());
        }
    }

    keys.into_iter().collect()
}

/// Role-based keys; empty unless the participant is a host or co-host
#[must_use]
pub fn role_keys(participant: &Participant, rules: &ResolverRules) -> Vec<String> {
    if !participant.has_host_role() {
        return Vec::new();
    }

    let user_id = participant.user_id.as_str();
    let mut keys = IndexSet::new();
    if !user_id.is_empty() {
        keys.insert(format!("host_{user_id}"));
        keys.insert(format!("cohost_{user_id}"));
    }
    keys.insert("host".to_string());
    keys.insert("cohost".to_string());
    if !user_id.is_empty() {
        for prefix in &rules.provider_prefixes {
            keys.insert(format!("{prefix}_{user_id}"));
        }
    }

    keys.into_iter().collect()
}

/// Every exact-match candidate, in lookup order
#[must_use]
pub fn candidate_keys(participant: &Participant, rules: &ResolverRules) -> Vec<String> {
    let mut keys: IndexSet<String> = identity_keys(participant).into_iter().collect();
    keys.extend(role_keys(participant, rules));
    keys.into_iter().collect()
}

/// Whether a registry key contains one of the participant's ids
#[must_use]
pub fn key_mentions_participant(key: &str, participant: &Participant) -> bool {
    let user_id = participant.user_id.as_str();
    if !user_id.is_empty() && key.contains(user_id) {
        return true;
    }

    participant
        .participant_id
        .as_deref()
        .filter(|id| !id.is_empty() && *id != user_id)
        .is_some_and(|id| key.contains(id))
}

/// Whether a registry key looks like it belongs to a host
#[must_use]
pub fn key_suggests_role(key: &str, rules: &ResolverRules) -> bool {
    let key = key.to_lowercase();
    rules.role_hints.iter().any(|hint| key.contains(hint.as_str()))
}

fn usable(stream: &StreamHandle) -> bool {
    stream.has_active_tracks()
}

/// Maps participants to streams
#[derive(Debug, Clone, Default)]
pub struct StreamResolver {
    rules: ResolverRules,
}

impl StreamResolver {
    #[must_use]
    pub const fn new(rules: ResolverRules) -> Self {
        Self { rules }
    }

    #[must_use]
    pub const fn rules(&self) -> &ResolverRules {
        &self.rules
    }

    /// Find the stream to render for a participant.
    ///
    /// `None` is a normal outcome: the caller renders a placeholder.
    pub fn resolve<R>(
        &self,
        participant: &Participant,
        local_stream: Option<&StreamHandle>,
        registry: &R,
    ) -> Option<Resolution>
    where
        R: StreamRegistry + ?Sized,
    {
        let resolution = self.resolve_inner(participant, local_stream, registry);
        match &resolution {
            Some(found) => trace!(
                user_id = %participant.user_id,
                path = ?found.path,
                stream_id = %found.stream.id,
                "Resolved participant stream"
            ),
            None => trace!(user_id = %participant.user_id, "No stream for participant"),
        }
        resolution
    }

    fn resolve_inner<R>(
        &self,
        participant: &Participant,
        local_stream: Option<&StreamHandle>,
        registry: &R,
    ) -> Option<Resolution>
    where
        R: StreamRegistry + ?Sized,
    {
        if let Some(stream) = &participant.stream {
            return Some(Resolution {
                stream: stream.clone(),
                path: ResolutionPath::Direct,
            });
        }

        if participant.is_local {
            if let Some(stream) = local_stream {
                return Some(Resolution {
                    stream: stream.clone(),
                    path: ResolutionPath::Local,
                });
            }
        }

        self.exact_match(participant, registry)
            .or_else(|| Self::id_substring_match(participant, registry))
            .or_else(|| self.role_substring_match(participant, registry))
    }

    fn exact_match<R>(&self, participant: &Participant, registry: &R) -> Option<Resolution>
    where
        R: StreamRegistry + ?Sized,
    {
        candidate_keys(participant, &self.rules)
            .into_iter()
            .find_map(|key| {
                registry
                    .get(&key)
                    .filter(|stream| usable(stream))
                    .map(|stream| Resolution {
                        stream: stream.clone(),
                        path: ResolutionPath::ExactKey(key.clone()),
                    })
            })
    }

    fn id_substring_match<R>(participant: &Participant, registry: &R) -> Option<Resolution>
    where
        R: StreamRegistry + ?Sized,
    {
        registry
            .entries()
            .find(|(key, stream)| key_mentions_participant(key, participant) && usable(stream))
            .map(|(key, stream)| Resolution {
                stream: stream.clone(),
                path: ResolutionPath::IdSubstring(key.to_string()),
            })
    }

    fn role_substring_match<R>(&self, participant: &Participant, registry: &R) -> Option<Resolution>
    where
        R: StreamRegistry + ?Sized,
    {
        if !participant.has_host_role() {
            return None;
        }

        registry
            .entries()
            .find(|(key, stream)| key_suggests_role(key, &self.rules) && usable(stream))
            .map(|(key, stream)| Resolution {
                stream: stream.clone(),
                path: ResolutionPath::RoleSubstring(key.to_string()),
            })
    }
}
