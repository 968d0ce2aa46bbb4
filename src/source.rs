// Track references
// A reference is either the id of a clip on our own audio endpoint or a
// remote video locator. Resolution never fails.

use std::time::Duration;

use serde::Serialize;

use crate::youtube::extractor::parse_video_url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackRef {
    Local(String),
    Remote(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSource {
    pub kind: SourceKind,
    // Clip id for local sources, video id for remote ones
    pub locator: String,
    #[serde(rename = "start_offset_seconds", serialize_with = "as_seconds")]
    pub start_offset: Duration,
}

impl TrackRef {
    // Bare alphanumeric/hyphen strings are clip ids, anything else a locator
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if is_clip_id(raw) {
            TrackRef::Local(raw.to_string())
        } else {
            TrackRef::Remote(raw.to_string())
        }
    }

    pub fn resolve(&self) -> ResolvedSource {
        match self {
            // Local offsets are set on the player by the caller
            TrackRef::Local(id) => ResolvedSource {
                kind: SourceKind::Local,
                locator: id.clone(),
                start_offset: Duration::ZERO,
            },
            TrackRef::Remote(url) => {
                let video = parse_video_url(url);
                ResolvedSource {
                    kind: SourceKind::Remote,
                    locator: video.video_id,
                    start_offset: video.start_offset,
                }
            }
        }
    }
}

impl ResolvedSource {
    // URL the local player streams from, e.g. "/api/audio?id=song-1"
    pub fn stream_url(&self, audio_base_url: &str) -> Option<String> {
        match self.kind {
            SourceKind::Local => Some(format!("{}?id={}", audio_base_url, self.locator)),
            SourceKind::Remote => None,
        }
    }
}

pub fn resolve(raw: &str) -> ResolvedSource {
    TrackRef::parse(raw).resolve()
}

// Same rule the audio endpoint enforces
pub fn is_clip_id(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn as_seconds<S: serde::Serializer>(offset: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(offset.as_secs())
}
