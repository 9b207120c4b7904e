/// Common types shared by the session controller and its observers
use std::fmt;

use crate::models::NavigationDirection;

/// Playback state owned by the session controller. Exactly one is active.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Paused,
    Buffering,
    Ended,
    Error(String),
}

impl PlaybackState {
    /// States from which play/pause/toggle are accepted
    pub fn accepts_transport(&self) -> bool {
        matches!(
            self,
            PlaybackState::Playing | PlaybackState::Paused | PlaybackState::Ended
        )
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PlaybackState::Error(_))
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => f.write_str("Idle"),
            PlaybackState::Loading => f.write_str("Loading"),
            PlaybackState::Playing => f.write_str("Playing"),
            PlaybackState::Paused => f.write_str("Paused"),
            PlaybackState::Buffering => f.write_str("Buffering"),
            PlaybackState::Ended => f.write_str("Ended"),
            PlaybackState::Error(reason) => write!(f, "Error({})", reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZoomMode {
    /// Fit entire video on the surface (default, may letterbox)
    #[default]
    Fit,
    /// Fill the surface, cropping the video
    Fill,
}

impl ZoomMode {
    pub fn label(&self) -> &'static str {
        match self {
            ZoomMode::Fit => "Fit",
            ZoomMode::Fill => "Fill",
        }
    }
}

/// Host application lifecycle signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Started,
    Resumed,
    Paused,
    Stopped,
}

/// One-shot notifications a session broadcasts to its observers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Native playback failed; show the source page in an embedded web view
    FallbackRequested { embed_url: String, reason: String },
    /// Previous/next was requested at the edge of the episode list
    NavigationBoundary(NavigationDirection),
    /// A new source finished loading and is playing
    SourceLoaded { episode: u32, quality: String },
}
