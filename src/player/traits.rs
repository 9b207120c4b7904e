use async_trait::async_trait;
use tokio::sync::mpsc;

use super::ZoomMode;
use crate::models::SourceDescriptor;
use crate::utils::PlayerResult;

/// Callbacks an engine reports about the source it is playing.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Source is prepared; duration is 0 when unknown
    Ready { duration_ms: u64 },
    BufferingStarted,
    BufferingEnded,
    Ended,
    /// Decode or network failure; not retried
    Error(String),
    /// The platform tore the engine down underneath the session
    Released,
}

#[derive(Debug)]
pub(crate) struct EngineNotification {
    pub(crate) generation: u64,
    pub(crate) event: EngineEvent,
}

/// Marshals engine callbacks, from whatever thread they fire on, onto the
/// session's single event queue. Each sink is bound to one load so events from
/// a superseded source are recognised and dropped.
#[derive(Debug, Clone)]
pub struct EngineEventSink {
    generation: u64,
    sender: mpsc::UnboundedSender<EngineNotification>,
}

impl EngineEventSink {
    pub(crate) fn new(generation: u64, sender: mpsc::UnboundedSender<EngineNotification>) -> Self {
        Self { generation, sender }
    }

    /// Returns false once the session has shut down.
    pub fn send(&self, event: EngineEvent) -> bool {
        self.sender
            .send(EngineNotification {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// The native decode/render pipeline driven by a playback session.
///
/// Commands are synchronous from the session's point of view; readiness,
/// buffering, end of stream and failures arrive through the [`EngineEventSink`]
/// handed to [`prepare`](PlaybackEngine::prepare).
#[async_trait]
pub trait PlaybackEngine: Send {
    /// Start opening `source`. Completion is reported as [`EngineEvent::Ready`].
    async fn prepare(&mut self, source: &SourceDescriptor, events: EngineEventSink)
    -> PlayerResult<()>;
    async fn play(&mut self) -> PlayerResult<()>;
    async fn pause(&mut self) -> PlayerResult<()>;
    async fn seek(&mut self, position_ms: u64) -> PlayerResult<()>;
    async fn set_speed(&mut self, speed: f64) -> PlayerResult<()>;
    async fn position_ms(&self) -> u64;
    async fn buffered_percent(&self) -> u8;
    /// Drop the current source. The engine stays usable for the next `prepare`.
    async fn release(&mut self);

    async fn set_zoom_mode(&mut self, _mode: ZoomMode) -> PlayerResult<()> {
        Ok(())
    }
}
