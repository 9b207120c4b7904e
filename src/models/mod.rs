pub mod episode_context;
mod identifiers;

pub use episode_context::EpisodeNavigationContext;
pub use identifiers::{SessionId, TargetId};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Audio/subtitle treatment of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationKind {
    Raw,
    Subtitled,
    Dubbed,
}

impl TranslationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranslationKind::Raw => "raw",
            TranslationKind::Subtitled => "subtitled",
            TranslationKind::Dubbed => "dubbed",
        }
    }
}

impl fmt::Display for TranslationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TranslationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" | "original" => Ok(TranslationKind::Raw),
            "sub" | "subs" | "subtitles" | "subtitled" => Ok(TranslationKind::Subtitled),
            "dub" | "voice" | "dubbed" => Ok(TranslationKind::Dubbed),
            other => Err(format!("unknown translation kind '{}'", other)),
        }
    }
}

/// How the engine should open a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerHint {
    /// HLS/DASH manifest split into segments
    Segmented,
    /// Single progressive file
    Progressive,
}

impl ContainerHint {
    pub fn from_url(raw: &str) -> Self {
        let path = match url::Url::parse(raw) {
            Ok(parsed) => parsed.path().to_ascii_lowercase(),
            Err(_) => raw
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase(),
        };

        if path.ends_with(".m3u8") || path.ends_with(".mpd") {
            ContainerHint::Segmented
        } else {
            ContainerHint::Progressive
        }
    }
}

/// One row of episode/translation metadata, as supplied by the catalogue layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationEntry {
    pub episode: u32,
    pub kind: TranslationKind,
    pub hosting: String,
    pub author: String,
    pub quality: String,
    pub url: String,
    pub target_id: TargetId,
    /// Web page embedding the same video, used when native playback fails
    #[serde(default)]
    pub page_url: Option<String>,
}

/// A resolved, playable reference to one episode/kind/quality combination.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDescriptor {
    pub url: String,
    pub episode: u32,
    pub kind: TranslationKind,
    pub quality: String,
    pub hosting: String,
    pub author: String,
    pub target_id: TargetId,
    /// Host-specific request headers, in the order they should be sent
    pub headers: Vec<(String, String)>,
    pub container: ContainerHint,
    pub embed_url: String,
}

impl SourceDescriptor {
    /// True when `other` plays the same content, so position carries over.
    pub fn is_same_content(&self, other: &SourceDescriptor) -> bool {
        self.episode == other.episode
    }
}

/// A resumable point in the current playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackPosition {
    pub media_item_index: usize,
    pub offset_ms: u64,
}

impl PlaybackPosition {
    pub fn start() -> Self {
        Self::default()
    }

    /// Position in the single-item playlist, clamped to `[0, duration]`.
    /// An unknown (zero) duration leaves the offset unclamped above.
    pub fn clamped(offset_ms: u64, duration_ms: u64) -> Self {
        let offset_ms = if duration_ms > 0 {
            offset_ms.min(duration_ms)
        } else {
            offset_ms
        };
        Self {
            media_item_index: 0,
            offset_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationDirection {
    Previous,
    Next,
}

/// Result of an episode navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    Navigated { episode: u32 },
    /// Already at the list edge; nothing changed
    Boundary(NavigationDirection),
}
