// Common data models for embed resolution

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Type tag for a source that is already a playable HLS manifest
pub const MANIFEST_TYPE: &str = "hls";

/// Type tag used when a provider entry carries neither `type` nor `quality`
pub const UNKNOWN_TYPE: &str = "unknown";

/// Input to one extraction attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedRequest {
    pub embed_url: String,
    pub referrer: Option<String>,
}

impl EmbedRequest {
    pub fn new(embed_url: impl Into<String>) -> Self {
        Self {
            embed_url: embed_url.into(),
            referrer: None,
        }
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        let referrer = referrer.into();
        self.referrer = if referrer.trim().is_empty() {
            None
        } else {
            Some(referrer)
        };
        self
    }
}

/// Playable source entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub file: String,
    #[serde(rename = "type")]
    pub source_type: String,
}

impl Source {
    pub fn manifest(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            source_type: MANIFEST_TYPE.to_string(),
        }
    }
}

/// Subtitle / caption / thumbnail track reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub kind: String,
    #[serde(rename = "default", default, skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
}

impl Track {
    /// Check if this track carries captions or subtitles
    pub fn is_caption(&self) -> bool {
        let kind = self.kind.to_ascii_lowercase();
        kind == "captions" || kind == "subtitles"
    }
}

/// Intro / outro skip marker, in seconds (fractional values kept)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub start: f64,
    pub end: f64,
}

/// Final pipeline product
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedResult {
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(rename = "t", default)]
    pub resume_time_seconds: u64,
    #[serde(rename = "server", default)]
    pub server_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro: Option<Marker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outro: Option<Marker>,
}

impl NormalizedResult {
    /// The uniform "no source available" answer
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_sources(&self) -> bool {
        !self.sources.is_empty()
    }
}

/// Raw body of the provider's getSources API.
///
/// Fields stay loosely typed; their shapes change between provider
/// generations and are interpreted by the classifier.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesResponse {
    #[serde(default)]
    pub sources: Option<Value>,
    #[serde(default)]
    pub tracks: Option<Value>,
    #[serde(default)]
    pub t: Option<Value>,
    #[serde(default)]
    pub server: Option<Value>,
    #[serde(default)]
    pub intro: Option<Value>,
    #[serde(default)]
    pub outro: Option<Value>,
}

/// Which tracks survive normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackPolicy {
    /// Copy every track through unfiltered
    #[default]
    PassThrough,
    /// Keep only `captions` / `subtitles` kinds
    CaptionsOnly,
}

impl TrackPolicy {
    pub fn apply(&self, tracks: Vec<Track>) -> Vec<Track> {
        match self {
            Self::PassThrough => tracks,
            Self::CaptionsOnly => tracks.into_iter().filter(Track::is_caption).collect(),
        }
    }
}

/// How terminal failures reach the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveMode {
    /// Propagate a structured error
    #[default]
    Strict,
    /// Degrade every failure to an empty result
    BestEffort,
}

impl fmt::Display for ResolveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::BestEffort => write!(f, "best-effort"),
        }
    }
}
