use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use super::resolver::SourceResolver;
use super::sampler::PositionSampler;
use super::traits::{EngineEvent, EngineEventSink, EngineNotification, PlaybackEngine};
use super::{LifecycleEvent, PlaybackState, SessionEvent, ZoomMode};
use crate::config::{Config, PlaybackConfig};
use crate::core::PlayerViewModel;
use crate::models::{
    EpisodeNavigationContext, NavigationDirection, NavigationOutcome, PlaybackPosition, SessionId,
    SourceDescriptor, TranslationEntry, TranslationKind,
};
use crate::utils::{PlayerError, PlayerResult};

/// Resolves once the engine reports the source ready (or the load fails or is superseded).
pub type LoadTicket = oneshot::Receiver<PlayerResult<()>>;

/// Commands that can be sent to the session controller
#[derive(Debug)]
pub enum SessionCommand {
    /// Replace the current source
    LoadSource {
        descriptor: SourceDescriptor,
        respond_to: oneshot::Sender<PlayerResult<LoadTicket>>,
    },
    /// Resolve and load an episode from the catalogue
    OpenEpisode {
        episode: u32,
        kind: TranslationKind,
        quality: String,
        respond_to: oneshot::Sender<PlayerResult<LoadTicket>>,
    },
    /// Switch quality of the current episode, keeping position
    SelectQuality {
        quality: String,
        respond_to: oneshot::Sender<PlayerResult<LoadTicket>>,
    },
    /// Switch dubbing/subtitle track of the current episode, keeping position
    SelectKind {
        kind: TranslationKind,
        respond_to: oneshot::Sender<PlayerResult<LoadTicket>>,
    },
    /// Replace the advertised sources and episode bounds
    SetCatalogue {
        entries: Vec<TranslationEntry>,
        context: EpisodeNavigationContext,
        respond_to: oneshot::Sender<()>,
    },
    Play {
        respond_to: oneshot::Sender<PlayerResult<()>>,
    },
    Pause {
        respond_to: oneshot::Sender<PlayerResult<()>>,
    },
    Toggle {
        respond_to: oneshot::Sender<PlayerResult<()>>,
    },
    SeekRelative {
        delta_ms: i64,
        respond_to: oneshot::Sender<PlayerResult<u64>>,
    },
    SeekAbsolute {
        target_ms: u64,
        respond_to: oneshot::Sender<PlayerResult<u64>>,
    },
    SetSpeed {
        speed: f64,
        respond_to: oneshot::Sender<PlayerResult<()>>,
    },
    SetZoomMode {
        mode: ZoomMode,
        respond_to: oneshot::Sender<PlayerResult<()>>,
    },
    NavigateEpisode {
        direction: NavigationDirection,
        respond_to: oneshot::Sender<PlayerResult<(NavigationOutcome, Option<LoadTicket>)>>,
    },
    /// Host lifecycle signal; `compact` is true while picture-in-picture is active
    Lifecycle {
        event: LifecycleEvent,
        compact: bool,
        respond_to: oneshot::Sender<PlayerResult<()>>,
    },
    GetPosition {
        respond_to: oneshot::Sender<PlaybackPosition>,
    },
    Shutdown {
        respond_to: oneshot::Sender<()>,
    },
}

/// A load waiting for the engine's ready callback.
struct PendingLoad {
    generation: u64,
    restore: PlaybackPosition,
    autoplay: bool,
    respond_to: Option<oneshot::Sender<PlayerResult<()>>>,
}

impl PendingLoad {
    fn finish(&mut self, result: PlayerResult<()>) {
        if let Some(respond_to) = self.respond_to.take() {
            let _ = respond_to.send(result);
        }
    }
}

/// Controller that owns the engine, the active source and the playback state.
///
/// Every mutation happens inside [`run`](Self::run): commands from
/// [`SessionHandle`]s, engine callbacks and sampler ticks are all queued onto
/// this one task.
pub struct PlaybackSessionController {
    id: SessionId,
    engine: Box<dyn PlaybackEngine>,
    receiver: mpsc::UnboundedReceiver<SessionCommand>,
    engine_tx: mpsc::UnboundedSender<EngineNotification>,
    engine_rx: mpsc::UnboundedReceiver<EngineNotification>,
    tick_rx: mpsc::UnboundedReceiver<()>,
    sampler: PositionSampler,
    resolver: SourceResolver,
    view: PlayerViewModel,
    options: PlaybackConfig,

    state: PlaybackState,
    source: Option<SourceDescriptor>,
    generation: u64,
    pending_load: Option<PendingLoad>,
    // State to return to when buffering ends
    buffering_resume: Option<PlaybackState>,
    // Lifecycle persistence
    saved_position: Option<PlaybackPosition>,
    resume_on_foreground: bool,
    engine_released: bool,
    // The current source is not in the active catalogue, so its position
    // belongs to another series
    source_orphaned: bool,

    speed: f64,
    duration_ms: u64,
    position_ms: u64,
}

impl PlaybackSessionController {
    /// Create a new session controller around `engine`
    pub fn new(
        engine: Box<dyn PlaybackEngine>,
        config: &Config,
        resolver: SourceResolver,
    ) -> (SessionHandle, PlaybackSessionController) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();

        let options = config.playback.clone();
        let view = PlayerViewModel::new(
            options.available_speeds.clone(),
            options.default_speed,
            resolver.context(),
        );
        let id = SessionId::generate();

        let controller = PlaybackSessionController {
            id: id.clone(),
            engine,
            receiver,
            engine_tx,
            engine_rx,
            tick_rx,
            sampler: PositionSampler::new(options.sample_interval(), tick_tx),
            resolver,
            view: view.clone(),
            speed: options.default_speed,
            options,
            state: PlaybackState::Idle,
            source: None,
            generation: 0,
            pending_load: None,
            buffering_resume: None,
            saved_position: None,
            resume_on_foreground: false,
            engine_released: false,
            source_orphaned: false,
            duration_ms: 0,
            position_ms: 0,
        };
        let handle = SessionHandle { id, sender, view };

        (handle, controller)
    }

    /// Create a controller and run it on the current tokio runtime
    pub fn spawn(
        engine: Box<dyn PlaybackEngine>,
        config: &Config,
        resolver: SourceResolver,
    ) -> SessionHandle {
        let (handle, controller) = Self::new(engine, config, resolver);
        tokio::spawn(controller.run());
        handle
    }

    /// Run the controller event loop
    pub async fn run(mut self) {
        info!(session = %self.id, "Playback session started");

        loop {
            tokio::select! {
                biased;
                Some(notification) = self.engine_rx.recv() => {
                    self.handle_engine_event(notification).await;
                }
                command = self.receiver.recv() => match command {
                    Some(SessionCommand::Shutdown { respond_to }) => {
                        self.teardown().await;
                        let _ = respond_to.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        self.teardown().await;
                        break;
                    }
                },
                Some(()) = self.tick_rx.recv() => {
                    self.sample_position().await;
                }
            }
        }

        debug!(session = %self.id, "Playback session event loop terminated");
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::LoadSource {
                descriptor,
                respond_to,
            } => {
                trace!("Loading source {}", descriptor.url);
                let ticket = self.load_source(descriptor).await;
                let _ = respond_to.send(Ok(ticket));
            }
            SessionCommand::OpenEpisode {
                episode,
                kind,
                quality,
                respond_to,
            } => {
                trace!("Opening episode {} ({} {})", episode, kind, quality);
                let result = self.open_episode(episode, kind, &quality).await;
                let _ = respond_to.send(result);
            }
            SessionCommand::SelectQuality {
                quality,
                respond_to,
            } => {
                trace!("Selecting quality {}", quality);
                let result = self.select_quality(&quality).await;
                let _ = respond_to.send(result);
            }
            SessionCommand::SelectKind { kind, respond_to } => {
                trace!("Selecting translation kind {}", kind);
                let result = self.select_kind(kind).await;
                let _ = respond_to.send(result);
            }
            SessionCommand::SetCatalogue {
                entries,
                context,
                respond_to,
            } => {
                if let Some(source) = &self.source {
                    self.source_orphaned = !entries.iter().any(|entry| entry.url == source.url);
                    if self.source_orphaned {
                        debug!("Catalogue no longer advertises {}", source.url);
                    }
                }
                self.resolver.set_catalogue(entries, context);
                self.view.episode().set_if_changed(self.resolver.context());
                if let Some(source) = self.source.clone() {
                    self.publish_source(&source);
                }
                let _ = respond_to.send(());
            }
            SessionCommand::Play { respond_to } => {
                trace!("Starting playback");
                let result = self.play().await;
                let _ = respond_to.send(result);
            }
            SessionCommand::Pause { respond_to } => {
                trace!("Pausing playback");
                let result = self.pause().await;
                let _ = respond_to.send(result);
            }
            SessionCommand::Toggle { respond_to } => {
                trace!("Toggling playback");
                let result = self.toggle().await;
                let _ = respond_to.send(result);
            }
            SessionCommand::SeekRelative {
                delta_ms,
                respond_to,
            } => {
                trace!("Seeking by {} ms", delta_ms);
                let result = self.seek_relative(delta_ms).await;
                let _ = respond_to.send(result);
            }
            SessionCommand::SeekAbsolute {
                target_ms,
                respond_to,
            } => {
                trace!("Seeking to {} ms", target_ms);
                let result = self.seek_absolute(target_ms).await;
                let _ = respond_to.send(result);
            }
            SessionCommand::SetSpeed { speed, respond_to } => {
                trace!("Setting playback speed to {}", speed);
                let result = self.set_speed(speed).await;
                let _ = respond_to.send(result);
            }
            SessionCommand::SetZoomMode { mode, respond_to } => {
                trace!("Setting zoom mode to {:?}", mode);
                let result = self.engine.set_zoom_mode(mode).await;
                if result.is_ok() {
                    self.view.zoom_mode().set_if_changed(mode);
                }
                let _ = respond_to.send(result);
            }
            SessionCommand::NavigateEpisode {
                direction,
                respond_to,
            } => {
                trace!("Navigating {:?}", direction);
                let result = self.navigate_episode(direction).await;
                let _ = respond_to.send(result);
            }
            SessionCommand::Lifecycle {
                event,
                compact,
                respond_to,
            } => {
                trace!("Lifecycle {:?} (compact: {})", event, compact);
                let result = self.on_lifecycle(event, compact).await;
                let _ = respond_to.send(result);
            }
            SessionCommand::GetPosition { respond_to } => {
                let _ = respond_to.send(PlaybackPosition::clamped(
                    self.position_ms,
                    self.duration_ms,
                ));
            }
            SessionCommand::Shutdown { respond_to } => {
                let _ = respond_to.send(());
            }
        }
    }

    // === State ===

    fn set_state(&mut self, new_state: PlaybackState) {
        if self.state == new_state {
            return;
        }
        debug!(from = %self.state, to = %new_state, "Playback state transition");

        if self.state.is_playing() {
            self.sampler.cancel();
        }
        if new_state.is_playing() {
            self.sampler.start();
        }

        self.state = new_state.clone();
        self.view.state().set(new_state);
    }

    fn invalid(&self, operation: &'static str) -> PlayerError {
        PlayerError::InvalidState {
            operation,
            state: self.state.to_string(),
        }
    }

    fn set_position(&mut self, position_ms: u64) {
        self.position_ms = PlaybackPosition::clamped(position_ms, self.duration_ms).offset_ms;
        self.view.current_time_ms().set_if_changed(self.position_ms);
    }

    fn enter_error(&mut self, reason: String) {
        if self.state.is_error() {
            trace!("Ignoring repeated engine error: {}", reason);
            return;
        }

        warn!(session = %self.id, "Engine failure: {}", reason);
        if let Some(mut pending) = self.pending_load.take() {
            pending.finish(Err(PlayerError::EngineFatal(reason.clone())));
        }
        self.buffering_resume = None;
        self.set_state(PlaybackState::Error(reason.clone()));

        let embed_url = self
            .source
            .as_ref()
            .map(|source| source.embed_url.clone())
            .unwrap_or_default();
        info!("Requesting embedded fallback for {}", embed_url);
        self.view
            .emit(SessionEvent::FallbackRequested { embed_url, reason });
    }

    /// Position to carry into the next source, read from the engine before it
    /// is torn down.
    async fn capture_position(&mut self) -> PlaybackPosition {
        match self.state {
            PlaybackState::Loading => self
                .pending_load
                .as_ref()
                .map(|pending| pending.restore)
                .unwrap_or_default(),
            PlaybackState::Idle | PlaybackState::Error(_) => PlaybackPosition::start(),
            _ => {
                if !self.engine_released {
                    let position = self.engine.position_ms().await;
                    self.set_position(position);
                }
                PlaybackPosition::clamped(self.position_ms, self.duration_ms)
            }
        }
    }

    fn publish_source(&self, source: &SourceDescriptor) {
        self.view.publish_source(
            source,
            self.resolver.available_qualities(source.episode, source.kind),
            self.resolver.available_kinds(source.episode),
        );
    }

    // === Loading ===

    async fn load_source(&mut self, descriptor: SourceDescriptor) -> LoadTicket {
        let same_content = self
            .source
            .as_ref()
            .is_some_and(|current| current.is_same_content(&descriptor))
            && !self.source_orphaned;
        let restore = if same_content {
            self.capture_position().await
        } else {
            PlaybackPosition::start()
        };

        let context = self.resolver.context();
        if context.contains(descriptor.episode) {
            self.resolver
                .set_context(context.with_current(descriptor.episode));
        }
        self.begin_load(descriptor, restore, true).await
    }

    async fn open_episode(
        &mut self,
        episode: u32,
        kind: TranslationKind,
        quality: &str,
    ) -> PlayerResult<LoadTicket> {
        let author = self.source.as_ref().map(|source| source.author.clone());
        let descriptor =
            self.resolver
                .resolve_preferring(episode, kind, quality, author.as_deref())?;
        Ok(self.load_source(descriptor).await)
    }

    async fn select_quality(&mut self, quality: &str) -> PlayerResult<LoadTicket> {
        let current = self
            .source
            .clone()
            .ok_or_else(|| self.invalid("select_quality"))?;
        let descriptor = self.resolver.resolve_preferring(
            current.episode,
            current.kind,
            quality,
            Some(&current.author),
        )?;

        if descriptor.url == current.url && !self.state.is_error() {
            debug!("Quality {} already active", quality);
            return Ok(ready_ticket());
        }
        Ok(self.load_source(descriptor).await)
    }

    async fn select_kind(&mut self, kind: TranslationKind) -> PlayerResult<LoadTicket> {
        let current = self
            .source
            .clone()
            .ok_or_else(|| self.invalid("select_kind"))?;
        let unavailable = || PlayerError::SourceUnavailable {
            episode: current.episode,
            kind,
            quality: current.quality.clone(),
        };

        let quality = self
            .resolver
            .quality_for_switch(current.episode, kind, &current.quality)
            .ok_or_else(unavailable)?;
        let descriptor = self.resolver.resolve(current.episode, kind, &quality)?;

        if descriptor.url == current.url && !self.state.is_error() {
            return Ok(ready_ticket());
        }
        Ok(self.load_source(descriptor).await)
    }

    /// Tears down the current source and starts preparing `descriptor`.
    /// Any load still in flight is cancelled; its events are dropped by generation.
    async fn begin_load(
        &mut self,
        descriptor: SourceDescriptor,
        restore: PlaybackPosition,
        autoplay: bool,
    ) -> LoadTicket {
        let (respond_to, ticket) = oneshot::channel();
        let pending = PendingLoad {
            generation: 0,
            restore,
            autoplay,
            respond_to: Some(respond_to),
        };
        self.start_load(descriptor, pending).await;
        ticket
    }

    async fn start_load(&mut self, descriptor: SourceDescriptor, mut pending: PendingLoad) {
        if let Some(mut stale) = self.pending_load.take() {
            debug!("Discarding in-flight load {}", stale.generation);
            stale.finish(Err(PlayerError::LoadCancelled));
        }
        self.sampler.cancel();

        if self.source.is_some() && !self.engine_released {
            self.engine.release().await;
        }

        self.generation += 1;
        self.engine_released = false;
        self.source_orphaned = false;
        self.buffering_resume = None;
        self.duration_ms = 0;
        self.view.duration_ms().set_if_changed(0);
        self.view.buffered_percent().set_if_changed(0);
        self.set_position(pending.restore.offset_ms);

        info!(
            session = %self.id,
            "Loading episode {} {} {} from {} (resume at {} ms)",
            descriptor.episode,
            descriptor.kind,
            descriptor.quality,
            descriptor.hosting,
            pending.restore.offset_ms
        );

        self.source = Some(descriptor.clone());
        self.publish_source(&descriptor);
        self.view.episode().set_if_changed(self.resolver.context());
        self.set_state(PlaybackState::Loading);

        pending.generation = self.generation;
        let sink = EngineEventSink::new(self.generation, self.engine_tx.clone());

        match self.engine.prepare(&descriptor, sink).await {
            Ok(()) => self.pending_load = Some(pending),
            Err(err) => {
                pending.finish(Err(err.clone()));
                self.enter_error(err.to_string());
            }
        }
    }

    /// Rebuilds a released engine on the current source, resuming at the
    /// saved position.
    async fn reload_released(&mut self, source: SourceDescriptor, autoplay: bool) -> LoadTicket {
        let restore = self
            .saved_position
            .take()
            .unwrap_or_else(|| PlaybackPosition::clamped(self.position_ms, self.duration_ms));
        info!(
            session = %self.id,
            "Engine was released; reloading at {} ms", restore.offset_ms
        );
        self.begin_load(source, restore, autoplay).await
    }

    async fn on_ready(&mut self, duration_ms: u64) {
        let Some(mut pending) = self.pending_load.take() else {
            // Ready outside a load means the engine recovered from an underrun
            if self.state == PlaybackState::Buffering {
                self.end_buffering();
            }
            return;
        };

        self.duration_ms = duration_ms;
        self.view.duration_ms().set_if_changed(duration_ms);
        let restore = PlaybackPosition::clamped(pending.restore.offset_ms, duration_ms);

        let started = async {
            if restore.offset_ms > 0 {
                self.engine.seek(restore.offset_ms).await?;
            }
            self.engine.set_speed(self.speed).await?;
            if pending.autoplay {
                self.engine.play().await?;
            }
            Ok::<(), PlayerError>(())
        }
        .await;

        if let Err(err) = started {
            pending.finish(Err(err.clone()));
            self.enter_error(err.to_string());
            return;
        }

        self.set_position(restore.offset_ms);
        self.set_state(if pending.autoplay {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        });

        if let Some(source) = &self.source {
            self.view.emit(SessionEvent::SourceLoaded {
                episode: source.episode,
                quality: source.quality.clone(),
            });
        }
        pending.finish(Ok(()));
    }

    // === Engine events ===

    async fn handle_engine_event(&mut self, notification: EngineNotification) {
        if notification.generation != self.generation {
            trace!(
                "Dropping engine event from superseded load {}: {:?}",
                notification.generation, notification.event
            );
            return;
        }

        match notification.event {
            EngineEvent::Ready { duration_ms } => self.on_ready(duration_ms).await,
            EngineEvent::BufferingStarted => {
                if matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
                    self.buffering_resume = Some(self.state.clone());
                    self.set_state(PlaybackState::Buffering);
                }
            }
            EngineEvent::BufferingEnded => {
                if self.state == PlaybackState::Buffering {
                    self.end_buffering();
                }
            }
            EngineEvent::Ended => {
                if matches!(
                    self.state,
                    PlaybackState::Playing | PlaybackState::Paused | PlaybackState::Buffering
                ) {
                    self.on_ended();
                }
            }
            EngineEvent::Error(reason) => self.enter_error(reason),
            EngineEvent::Released => {
                debug!("Engine released by the platform");
                if let Some(mut pending) = self.pending_load.take() {
                    let Some(source) = self.source.clone() else {
                        pending.finish(Err(PlayerError::LoadCancelled));
                        return;
                    };
                    info!(
                        session = %self.id,
                        "Engine released mid-load; restarting at {} ms", pending.restore.offset_ms
                    );
                    self.engine_released = true;
                    self.start_load(source, pending).await;
                    return;
                }
                let was_playing = self.state.is_playing()
                    || self.buffering_resume == Some(PlaybackState::Playing);
                self.engine_released = true;
                if matches!(self.state, PlaybackState::Playing | PlaybackState::Buffering) {
                    self.saved_position =
                        Some(PlaybackPosition::clamped(self.position_ms, self.duration_ms));
                    self.resume_on_foreground |= was_playing;
                    self.buffering_resume = None;
                    self.set_state(PlaybackState::Paused);
                }
            }
        }
    }

    fn end_buffering(&mut self) {
        let resume = self
            .buffering_resume
            .take()
            .unwrap_or(PlaybackState::Paused);
        self.set_state(resume);
    }

    fn on_ended(&mut self) {
        self.buffering_resume = None;
        self.set_position(self.duration_ms);
        self.set_state(PlaybackState::Ended);
    }

    async fn sample_position(&mut self) {
        if !self.state.is_playing() || self.engine_released {
            return;
        }

        let position = self.engine.position_ms().await;
        self.set_position(position);
        let buffered = self.engine.buffered_percent().await.min(100);
        self.view.buffered_percent().set_if_changed(buffered);

        if self.duration_ms > 0 && self.position_ms >= self.duration_ms {
            self.on_ended();
        }
    }

    // === Transport ===

    async fn play(&mut self) -> PlayerResult<()> {
        if !self.state.accepts_transport() {
            return Err(self.invalid("play"));
        }
        if self.engine_released {
            let Some(source) = self.source.clone() else {
                return Err(self.invalid("play"));
            };
            if self.state == PlaybackState::Ended {
                self.saved_position = Some(PlaybackPosition::start());
            }
            self.resume_on_foreground = false;
            // Nobody awaits this ticket; failures surface through the state
            let _ = self.reload_released(source, true).await;
            return Ok(());
        }
        match self.state {
            PlaybackState::Playing => Ok(()),
            PlaybackState::Ended => {
                self.engine.seek(0).await?;
                self.set_position(0);
                self.engine.play().await?;
                self.set_state(PlaybackState::Playing);
                Ok(())
            }
            _ => {
                self.engine.play().await?;
                self.set_state(PlaybackState::Playing);
                Ok(())
            }
        }
    }

    async fn pause(&mut self) -> PlayerResult<()> {
        if !self.state.accepts_transport() {
            return Err(self.invalid("pause"));
        }
        if self.state.is_playing() {
            self.engine.pause().await?;
            let position = self.engine.position_ms().await;
            self.set_position(position);
            self.set_state(PlaybackState::Paused);
        }
        Ok(())
    }

    async fn toggle(&mut self) -> PlayerResult<()> {
        if self.state.is_playing() {
            self.pause().await
        } else {
            self.play().await
        }
    }

    async fn seek_relative(&mut self, delta_ms: i64) -> PlayerResult<u64> {
        let base = match self.state {
            PlaybackState::Idle | PlaybackState::Error(_) => {
                return Err(self.invalid("seek_relative"));
            }
            PlaybackState::Loading => self
                .pending_load
                .as_ref()
                .map(|pending| pending.restore.offset_ms)
                .unwrap_or(0),
            _ if !self.engine_released => self.engine.position_ms().await,
            _ => self.position_ms,
        };
        let target = base.saturating_add_signed(delta_ms);
        self.seek_absolute(target).await
    }

    async fn seek_absolute(&mut self, target_ms: u64) -> PlayerResult<u64> {
        match self.state {
            PlaybackState::Idle | PlaybackState::Error(_) => Err(self.invalid("seek_absolute")),
            PlaybackState::Loading => {
                // Duration is unknown until ready; clamped when the load completes
                if let Some(pending) = self.pending_load.as_mut() {
                    pending.restore = PlaybackPosition::clamped(target_ms, 0);
                }
                self.set_position(target_ms);
                Ok(target_ms)
            }
            _ => {
                let target = PlaybackPosition::clamped(target_ms, self.duration_ms).offset_ms;
                if self.engine_released {
                    self.saved_position = Some(PlaybackPosition::clamped(target, self.duration_ms));
                } else {
                    self.engine.seek(target).await?;
                }
                self.set_position(target);

                if self.state == PlaybackState::Ended && target < self.duration_ms {
                    self.set_state(PlaybackState::Paused);
                }
                Ok(target)
            }
        }
    }

    async fn set_speed(&mut self, speed: f64) -> PlayerResult<()> {
        if !(speed.is_finite() && speed > 0.0) {
            return Err(PlayerError::InvalidSpeed(speed));
        }

        self.speed = speed;
        self.view.current_speed().set_if_changed(speed);

        // While loading the speed is applied on ready
        if matches!(
            self.state,
            PlaybackState::Playing
                | PlaybackState::Paused
                | PlaybackState::Buffering
                | PlaybackState::Ended
        ) && !self.engine_released
        {
            self.engine.set_speed(speed).await?;
        }
        Ok(())
    }

    // === Navigation ===

    async fn navigate_episode(
        &mut self,
        direction: NavigationDirection,
    ) -> PlayerResult<(NavigationOutcome, Option<LoadTicket>)> {
        let Some(target) = self.resolver.context().adjacent(direction) else {
            debug!("No {:?} episode available", direction);
            self.view.emit(SessionEvent::NavigationBoundary(direction));
            return Ok((NavigationOutcome::Boundary(direction), None));
        };

        let (kind, quality, author) = match &self.source {
            Some(source) => (
                source.kind,
                source.quality.clone(),
                Some(source.author.clone()),
            ),
            None => (
                self.options.preferred_kind,
                self.options.preferred_quality.clone(),
                None,
            ),
        };

        let quality = self
            .resolver
            .quality_for_switch(target, kind, &quality)
            .ok_or_else(|| PlayerError::SourceUnavailable {
                episode: target,
                kind,
                quality: quality.clone(),
            })?;
        let descriptor =
            self.resolver
                .resolve_preferring(target, kind, &quality, author.as_deref())?;

        self.resolver
            .set_context(self.resolver.context().with_current(target));
        let ticket = self
            .begin_load(descriptor, PlaybackPosition::start(), true)
            .await;

        Ok((NavigationOutcome::Navigated { episode: target }, Some(ticket)))
    }

    // === Lifecycle ===

    async fn on_lifecycle(&mut self, event: LifecycleEvent, compact: bool) -> PlayerResult<()> {
        if compact {
            debug!("Compact mode active, {:?} leaves playback running", event);
            return Ok(());
        }

        match event {
            LifecycleEvent::Paused | LifecycleEvent::Stopped => {
                self.move_to_background(event == LifecycleEvent::Stopped)
                    .await
            }
            LifecycleEvent::Started | LifecycleEvent::Resumed => self.return_to_foreground().await,
        }
    }

    async fn move_to_background(&mut self, stopped: bool) -> PlayerResult<()> {
        match self.state {
            PlaybackState::Playing
            | PlaybackState::Paused
            | PlaybackState::Buffering
            | PlaybackState::Ended => {
                let was_playing = self.state.is_playing()
                    || self.buffering_resume == Some(PlaybackState::Playing);

                if !self.engine_released {
                    let position = self.engine.position_ms().await;
                    self.set_position(position);
                    if was_playing {
                        self.engine.pause().await?;
                    }
                }
                self.saved_position =
                    Some(PlaybackPosition::clamped(self.position_ms, self.duration_ms));
                self.resume_on_foreground |= was_playing;

                if self.state == PlaybackState::Buffering {
                    self.buffering_resume = Some(PlaybackState::Paused);
                } else if was_playing {
                    self.set_state(PlaybackState::Paused);
                }

                if stopped && self.options.release_engine_on_stop && !self.engine_released {
                    info!(session = %self.id, "Releasing engine while in background");
                    self.engine.release().await;
                    self.engine_released = true;
                    self.buffering_resume = None;
                    if self.state == PlaybackState::Buffering {
                        self.set_state(PlaybackState::Paused);
                    }
                }
                debug!(
                    "Persisted position {} ms (resume: {})",
                    self.position_ms, self.resume_on_foreground
                );
            }
            PlaybackState::Loading => {
                if let Some(pending) = self.pending_load.as_mut() {
                    self.resume_on_foreground |= pending.autoplay;
                    pending.autoplay = false;
                }
            }
            PlaybackState::Idle | PlaybackState::Error(_) => {}
        }
        Ok(())
    }

    async fn return_to_foreground(&mut self) -> PlayerResult<()> {
        let resume = std::mem::take(&mut self.resume_on_foreground);

        if self.engine_released {
            let Some(source) = self.source.clone() else {
                return Ok(());
            };
            let _ = self.reload_released(source, resume).await;
            return Ok(());
        }

        match self.state {
            PlaybackState::Loading => {
                if let Some(pending) = self.pending_load.as_mut() {
                    pending.autoplay |= resume;
                }
            }
            PlaybackState::Paused | PlaybackState::Ended => {
                if let Some(saved) = self.saved_position.take() {
                    let current = self.engine.position_ms().await;
                    if current != saved.offset_ms {
                        self.engine.seek(saved.offset_ms).await?;
                    }
                    self.set_position(saved.offset_ms);
                }
                if resume && self.state == PlaybackState::Paused {
                    self.engine.play().await?;
                    self.set_state(PlaybackState::Playing);
                }
            }
            PlaybackState::Buffering => {
                if resume {
                    self.engine.play().await?;
                    self.buffering_resume = Some(PlaybackState::Playing);
                }
                self.saved_position = None;
            }
            _ => {
                self.saved_position = None;
            }
        }
        Ok(())
    }

    async fn teardown(&mut self) {
        self.sampler.cancel();
        if let Some(mut pending) = self.pending_load.take() {
            pending.finish(Err(PlayerError::LoadCancelled));
        }
        if self.source.is_some() && !self.engine_released {
            self.engine.release().await;
            self.engine_released = true;
        }
        self.set_state(PlaybackState::Idle);
    }
}

fn ready_ticket() -> LoadTicket {
    let (respond_to, ticket) = oneshot::channel();
    let _ = respond_to.send(Ok(()));
    ticket
}

/// Handle to send commands to the session controller
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    sender: mpsc::UnboundedSender<SessionCommand>,
    view: PlayerViewModel,
}

impl SessionHandle {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Observable outputs of this session
    pub fn view(&self) -> &PlayerViewModel {
        &self.view
    }

    async fn request<R>(
        &self,
        command: impl FnOnce(oneshot::Sender<R>) -> SessionCommand,
    ) -> PlayerResult<R> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(command(respond_to))
            .map_err(|_| PlayerError::Disconnected)?;
        response.await.map_err(|_| PlayerError::Disconnected)
    }

    async fn await_ticket(ticket: LoadTicket) -> PlayerResult<()> {
        ticket.await.map_err(|_| PlayerError::Disconnected)?
    }

    /// Replace the current source and wait until the engine is playing it.
    /// Position carries over when the descriptor is for the same episode.
    pub async fn load_source(&self, descriptor: SourceDescriptor) -> PlayerResult<()> {
        let ticket = self
            .request(|respond_to| SessionCommand::LoadSource {
                descriptor,
                respond_to,
            })
            .await??;
        Self::await_ticket(ticket).await
    }

    /// Resolve an episode from the catalogue and play it
    pub async fn open_episode(
        &self,
        episode: u32,
        kind: TranslationKind,
        quality: &str,
    ) -> PlayerResult<()> {
        let quality = quality.to_string();
        let ticket = self
            .request(|respond_to| SessionCommand::OpenEpisode {
                episode,
                kind,
                quality,
                respond_to,
            })
            .await??;
        Self::await_ticket(ticket).await
    }

    pub async fn select_quality(&self, quality: &str) -> PlayerResult<()> {
        let quality = quality.to_string();
        let ticket = self
            .request(|respond_to| SessionCommand::SelectQuality {
                quality,
                respond_to,
            })
            .await??;
        Self::await_ticket(ticket).await
    }

    pub async fn select_kind(&self, kind: TranslationKind) -> PlayerResult<()> {
        let ticket = self
            .request(|respond_to| SessionCommand::SelectKind { kind, respond_to })
            .await??;
        Self::await_ticket(ticket).await
    }

    pub async fn set_catalogue(
        &self,
        entries: Vec<TranslationEntry>,
        context: EpisodeNavigationContext,
    ) -> PlayerResult<()> {
        self.request(|respond_to| SessionCommand::SetCatalogue {
            entries,
            context,
            respond_to,
        })
        .await
    }

    pub async fn play(&self) -> PlayerResult<()> {
        self.request(|respond_to| SessionCommand::Play { respond_to })
            .await?
    }

    pub async fn pause(&self) -> PlayerResult<()> {
        self.request(|respond_to| SessionCommand::Pause { respond_to })
            .await?
    }

    pub async fn toggle(&self) -> PlayerResult<()> {
        self.request(|respond_to| SessionCommand::Toggle { respond_to })
            .await?
    }

    /// Seek by `delta_ms`, clamped into the media; returns the new position
    pub async fn seek_relative(&self, delta_ms: i64) -> PlayerResult<u64> {
        self.request(|respond_to| SessionCommand::SeekRelative {
            delta_ms,
            respond_to,
        })
        .await?
    }

    /// Seek to `target_ms`, clamped into the media; returns the new position
    pub async fn seek_absolute(&self, target_ms: u64) -> PlayerResult<u64> {
        self.request(|respond_to| SessionCommand::SeekAbsolute {
            target_ms,
            respond_to,
        })
        .await?
    }

    /// Queue a seek without waiting for the engine
    pub fn fire_seek_absolute(&self, target_ms: u64) -> PlayerResult<()> {
        let (respond_to, _) = oneshot::channel();
        self.sender
            .send(SessionCommand::SeekAbsolute {
                target_ms,
                respond_to,
            })
            .map_err(|_| PlayerError::Disconnected)
    }

    /// Queue a relative seek without waiting for the engine
    pub fn fire_seek_relative(&self, delta_ms: i64) -> PlayerResult<()> {
        let (respond_to, _) = oneshot::channel();
        self.sender
            .send(SessionCommand::SeekRelative {
                delta_ms,
                respond_to,
            })
            .map_err(|_| PlayerError::Disconnected)
    }

    pub async fn set_speed(&self, speed: f64) -> PlayerResult<()> {
        self.request(|respond_to| SessionCommand::SetSpeed { speed, respond_to })
            .await?
    }

    pub async fn set_zoom_mode(&self, mode: ZoomMode) -> PlayerResult<()> {
        self.request(|respond_to| SessionCommand::SetZoomMode { mode, respond_to })
            .await?
    }

    /// Move to the adjacent episode, starting from zero. At a list edge this is
    /// a no-op reported as [`NavigationOutcome::Boundary`].
    pub async fn navigate_episode(
        &self,
        direction: NavigationDirection,
    ) -> PlayerResult<NavigationOutcome> {
        let (outcome, ticket) = self
            .request(|respond_to| SessionCommand::NavigateEpisode {
                direction,
                respond_to,
            })
            .await??;
        if let Some(ticket) = ticket {
            Self::await_ticket(ticket).await?;
        }
        Ok(outcome)
    }

    pub async fn lifecycle(&self, event: LifecycleEvent, compact: bool) -> PlayerResult<()> {
        self.request(|respond_to| SessionCommand::Lifecycle {
            event,
            compact,
            respond_to,
        })
        .await?
    }

    pub async fn position(&self) -> PlayerResult<PlaybackPosition> {
        self.request(|respond_to| SessionCommand::GetPosition { respond_to })
            .await
    }

    /// Release the engine and stop the controller loop
    pub async fn shutdown(&self) -> PlayerResult<()> {
        self.request(|respond_to| SessionCommand::Shutdown { respond_to })
            .await
    }
}
