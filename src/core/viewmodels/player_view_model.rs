use tokio::sync::broadcast;

use super::{Property, PropertySubscriber};
use crate::models::{EpisodeNavigationContext, SourceDescriptor, TranslationKind};
use crate::player::{PlaybackState, SessionEvent, ZoomMode};

/// Point-in-time copy of everything a session exposes.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub current_time_ms: u64,
    pub duration_ms: u64,
    pub buffered_percent: u8,
    pub current_quality: Option<String>,
    pub current_kind: Option<TranslationKind>,
    pub current_speed: f64,
    pub episode: EpisodeNavigationContext,
    pub zoom_mode: ZoomMode,
}

/// Observable output surface of a playback session.
///
/// The session controller is the only writer; UI layers and the PiP
/// coordinator clone it and subscribe to the properties they render.
#[derive(Debug, Clone)]
pub struct PlayerViewModel {
    state: Property<PlaybackState>,
    current_time_ms: Property<u64>,
    duration_ms: Property<u64>,
    buffered_percent: Property<u8>,
    available_qualities: Property<Vec<String>>,
    available_kinds: Property<Vec<TranslationKind>>,
    available_speeds: Property<Vec<f64>>,
    current_quality: Property<Option<String>>,
    current_kind: Property<Option<TranslationKind>>,
    current_speed: Property<f64>,
    episode: Property<EpisodeNavigationContext>,
    zoom_mode: Property<ZoomMode>,
    source: Property<Option<SourceDescriptor>>,
    events: broadcast::Sender<SessionEvent>,
}

impl PlayerViewModel {
    pub fn new(available_speeds: Vec<f64>, speed: f64, episode: EpisodeNavigationContext) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            state: Property::new(PlaybackState::Idle, "state"),
            current_time_ms: Property::new(0, "current_time_ms"),
            duration_ms: Property::new(0, "duration_ms"),
            buffered_percent: Property::new(0, "buffered_percent"),
            available_qualities: Property::new(Vec::new(), "available_qualities"),
            available_kinds: Property::new(Vec::new(), "available_kinds"),
            available_speeds: Property::new(available_speeds, "available_speeds"),
            current_quality: Property::new(None, "current_quality"),
            current_kind: Property::new(None, "current_kind"),
            current_speed: Property::new(speed, "current_speed"),
            episode: Property::new(episode, "episode"),
            zoom_mode: Property::new(ZoomMode::default(), "zoom_mode"),
            source: Property::new(None, "source"),
            events,
        }
    }

    pub fn state(&self) -> &Property<PlaybackState> {
        &self.state
    }

    pub fn current_time_ms(&self) -> &Property<u64> {
        &self.current_time_ms
    }

    pub fn duration_ms(&self) -> &Property<u64> {
        &self.duration_ms
    }

    pub fn buffered_percent(&self) -> &Property<u8> {
        &self.buffered_percent
    }

    pub fn available_qualities(&self) -> &Property<Vec<String>> {
        &self.available_qualities
    }

    pub fn available_kinds(&self) -> &Property<Vec<TranslationKind>> {
        &self.available_kinds
    }

    pub fn available_speeds(&self) -> &Property<Vec<f64>> {
        &self.available_speeds
    }

    pub fn current_quality(&self) -> &Property<Option<String>> {
        &self.current_quality
    }

    pub fn current_kind(&self) -> &Property<Option<TranslationKind>> {
        &self.current_kind
    }

    pub fn current_speed(&self) -> &Property<f64> {
        &self.current_speed
    }

    pub fn episode(&self) -> &Property<EpisodeNavigationContext> {
        &self.episode
    }

    pub fn zoom_mode(&self) -> &Property<ZoomMode> {
        &self.zoom_mode
    }

    pub fn source(&self) -> &Property<Option<SourceDescriptor>> {
        &self.source
    }

    pub fn subscribe_state(&self) -> PropertySubscriber<PlaybackState> {
        self.state.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            state: self.state.get(),
            current_time_ms: self.current_time_ms.get(),
            duration_ms: self.duration_ms.get(),
            buffered_percent: self.buffered_percent.get(),
            current_quality: self.current_quality.get(),
            current_kind: self.current_kind.get(),
            current_speed: self.current_speed.get(),
            episode: self.episode.get(),
            zoom_mode: self.zoom_mode.get(),
        }
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No receivers is fine: nobody is listening for one-shot events
        let _ = self.events.send(event);
    }

    pub(crate) fn publish_source(
        &self,
        source: &SourceDescriptor,
        qualities: Vec<String>,
        kinds: Vec<TranslationKind>,
    ) {
        self.current_quality.set_if_changed(Some(source.quality.clone()));
        self.current_kind.set_if_changed(Some(source.kind));
        self.available_qualities.set_if_changed(qualities);
        self.available_kinds.set_if_changed(kinds);
        self.source.set(Some(source.clone()));
    }
}
