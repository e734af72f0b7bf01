//! Media stream model and the transport boundary
//!
//! The grid never talks to a media library directly. Transport providers
//! hand over their objects through a [`StreamAdapter`], and publish the
//! resulting handles in a read-only [`StreamRegistry`].

use crate::error::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Media track kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl From<&str> for TrackKind {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "audio" => Self::Audio,
            _ => Self::Video,
        }
    }
}

/// Ready state of a track
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackState {
    #[default]
    Live,
    Ended,
}

/// A single audio or video track inside a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTrack {
    pub id: String,
    pub kind: TrackKind,
    #[serde(default)]
    pub state: TrackState,
}

impl MediaTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            kind,
            state: TrackState::Live,
        }
    }

    #[must_use]
    pub fn ended(mut self) -> Self {
        self.state = TrackState::Ended;
        self
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.state == TrackState::Live
    }
}

/// A media stream as handed over by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStream {
    pub id: String,
    #[serde(default)]
    pub tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>, tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }

    /// A stream is usable only while at least one of its tracks is live.
    /// Streams with no tracks are placeholders and count as absent.
    #[must_use]
    pub fn has_active_tracks(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }

    #[must_use]
    pub fn has_live_video(&self) -> bool {
        self.tracks
            .iter()
            .any(|t| t.kind == TrackKind::Video && t.is_live())
    }

    #[must_use]
    pub fn has_live_audio(&self) -> bool {
        self.tracks
            .iter()
            .any(|t| t.kind == TrackKind::Audio && t.is_live())
    }
}

/// Shared handle to a live stream
pub type StreamHandle = Arc<MediaStream>;

/// Read-only view over the transport's keyed streams.
///
/// The grid only reads registries. Entries are added and removed by the
/// transport that owns them.
pub trait StreamRegistry {
    fn get(&self, key: &str) -> Option<&StreamHandle>;

    /// Iterate over all entries in the registry's own order
    fn entries(&self) -> Box<dyn Iterator<Item = (&str, &StreamHandle)> + '_>;

    fn len(&self) -> usize {
        self.entries().count()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StreamRegistry for IndexMap<String, StreamHandle> {
    fn get(&self, key: &str) -> Option<&StreamHandle> {
        IndexMap::get(self, key)
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&str, &StreamHandle)> + '_> {
        Box::new(self.iter().map(|(k, v)| (k.as_str(), v)))
    }

    fn len(&self) -> usize {
        IndexMap::len(self)
    }
}

/// Iteration order of a `HashMap` registry is unspecified, so the loose
/// matching layers may pick a different entry between runs.
impl StreamRegistry for HashMap<String, StreamHandle> {
    fn get(&self, key: &str) -> Option<&StreamHandle> {
        HashMap::get(self, key)
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&str, &StreamHandle)> + '_> {
        Box::new(self.iter().map(|(k, v)| (k.as_str(), v)))
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }
}

/// Read a registry file: a JSON object mapping stream keys to streams.
///
/// Keys keep their file order.
pub fn load_registry(path: impl AsRef<Path>) -> Result<IndexMap<String, StreamHandle>> {
    let raw = std::fs::read_to_string(path)?;
    let streams: IndexMap<String, MediaStream> = serde_json::from_str(&raw)?;
    Ok(streams
        .into_iter()
        .map(|(key, stream)| (key, Arc::new(stream)))
        .collect())
}

/// Converts a transport-specific object into a stream handle.
///
/// One implementation exists per supported transport provider so that the
/// resolver never has to inspect object shapes itself.
pub trait StreamAdapter {
    type Source: ?Sized;

    fn to_media_stream(&self, source: &Self::Source) -> Option<StreamHandle>;
}

/// Track publication as reported by an SFU-style transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPublication {
    pub sid: String,
    pub participant_identity: String,
    pub kind: TrackKind,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub unpublished: bool,
}

/// Adapter for transports that report individual track publications.
///
/// Publications of one participant become one stream. Muted tracks stay in
/// the stream as live; unpublished ones are marked ended.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicationAdapter;

impl StreamAdapter for PublicationAdapter {
    type Source = [TrackPublication];

    fn to_media_stream(&self, publications: &[TrackPublication]) -> Option<StreamHandle> {
        let first = publications.first()?;
        let tracks = publications
            .iter()
            .map(|p| {
                let track = MediaTrack::new(p.sid.clone(), p.kind);
                if p.unpublished {
                    track.ended()
                } else {
                    track
                }
            })
            .collect();
        Some(Arc::new(MediaStream::new(
            first.participant_identity.clone(),
            tracks,
        )))
    }
}

impl PublicationAdapter {
    /// Build a registry keyed by participant identity, in order of first
    /// appearance.
    #[must_use]
    pub fn build_registry(&self, publications: &[TrackPublication]) -> IndexMap<String, StreamHandle> {
        let mut grouped: IndexMap<&str, Vec<TrackPublication>> = IndexMap::new();
        for publication in publications {
            grouped
                .entry(publication.participant_identity.as_str())
                .or_default()
                .push(publication.clone());
        }

        grouped
            .into_iter()
            .filter_map(|(identity, pubs)| {
                self.to_media_stream(&pubs)
                    .map(|stream| (identity.to_string(), stream))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publication(sid: &str, identity: &str, kind: TrackKind) -> TrackPublication {
        TrackPublication {
            sid: sid.to_string(),
            participant_identity: identity.to_string(),
            kind,
            muted: false,
            unpublished: false,
        }
    }

    #[test]
    fn test_stream_without_tracks_is_inactive() {
        let stream = MediaStream::new("s1", vec![]);
        assert!(!stream.has_active_tracks());
    }

    #[test]
    fn test_stream_with_only_ended_tracks_is_inactive() {
        let stream = MediaStream::new(
            "s1",
            vec![MediaTrack::new("t1", TrackKind::Video).ended()],
        );
        assert!(!stream.has_active_tracks());
        assert!(!stream.has_live_video());
    }

    #[test]
    fn test_track_kind_from_str() {
        assert_eq!(TrackKind::from("AUDIO"), TrackKind::Audio);
        assert_eq!(TrackKind::from("video"), TrackKind::Video);
        assert_eq!(TrackKind::from("screen"), TrackKind::Video);
    }

    #[test]
    fn test_publication_adapter_groups_by_identity() {
        let mut ended = publication("TR_3", "alice", TrackKind::Audio);
        ended.unpublished = true;
        let pubs = vec![
            publication("TR_1", "alice", TrackKind::Video),
            publication("TR_2", "bob", TrackKind::Audio),
            ended,
        ];

        let registry = PublicationAdapter.build_registry(&pubs);
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["alice", "bob"]);

        let alice = StreamRegistry::get(&registry, "alice").unwrap();
        assert_eq!(alice.tracks.len(), 2);
        assert!(alice.has_live_video());
        assert!(!alice.has_live_audio());
    }

    #[test]
    fn test_publication_adapter_empty_source() {
        assert!(PublicationAdapter.to_media_stream(&[]).is_none());
    }

    #[test]
    fn test_load_registry_keeps_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(
            &path,
            r#"{
                "zeta_cam": {"id": "s1", "tracks": [{"id": "v", "kind": "video"}]},
                "alpha_cam": {"id": "s2", "tracks": [{"id": "a", "kind": "audio", "state": "ended"}]}
            }"#,
        )
        .unwrap();

        let registry = load_registry(&path).unwrap();
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["zeta_cam", "alpha_cam"]);
        assert!(registry["zeta_cam"].has_active_tracks());
        assert!(!registry["alpha_cam"].has_active_tracks());

        std::fs::write(&path, "[]").unwrap();
        assert!(matches!(load_registry(&path), Err(crate::Error::Serialization(_))));
    }
}
