//! Picture-in-picture: compact floating playback with a three-button remote.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::PipConfig;
use crate::constants::{SEEK_BACK_MS, SEEK_FORWARD_MS};
use crate::controls::ControlsVisibilityTimer;
use crate::player::{LifecycleEvent, PlaybackState, SessionHandle};
use crate::utils::{PlayerError, PlayerResult};

/// Commands the compact-mode remote can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteCommand {
    Back,
    PlayPause,
    Next,
}

impl RemoteCommand {
    pub const ALL: [RemoteCommand; 3] = [
        RemoteCommand::Back,
        RemoteCommand::PlayPause,
        RemoteCommand::Next,
    ];
}

/// One button on the compact remote, as handed to the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAction {
    pub command: RemoteCommand,
    pub title: &'static str,
    /// Platform icon name hint
    pub icon: &'static str,
    pub enabled: bool,
}

/// Remote actions for a session in `state`. Play/Pause shows "Pause" while
/// playing; seeking is only offered where the session accepts it.
pub fn remote_actions(state: &PlaybackState) -> Vec<RemoteAction> {
    let playing = state.is_playing();
    let can_seek = matches!(
        state,
        PlaybackState::Playing
            | PlaybackState::Paused
            | PlaybackState::Buffering
            | PlaybackState::Ended
    );

    RemoteCommand::ALL
        .iter()
        .map(|command| match command {
            RemoteCommand::Back => RemoteAction {
                command: *command,
                title: "Back",
                icon: "media-seek-backward",
                enabled: can_seek,
            },
            RemoteCommand::PlayPause => RemoteAction {
                command: *command,
                title: if playing { "Pause" } else { "Play" },
                icon: if playing {
                    "media-playback-pause"
                } else {
                    "media-playback-start"
                },
                enabled: state.accepts_transport(),
            },
            RemoteCommand::Next => RemoteAction {
                command: *command,
                title: "Next",
                icon: "media-seek-forward",
                enabled: can_seek,
            },
        })
        .collect()
}

/// Platform mechanism that shows remote actions while compact and routes their
/// presses back through [`PictureInPictureCoordinator::on_compact_action`].
pub trait RemoteCommandChannel: Send {
    fn publish(&mut self, actions: &[RemoteAction]) -> PlayerResult<()>;
    fn clear(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
}

/// What the host platform reports about compact mode support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformCapabilities {
    pub pip_supported: bool,
    pub orientation: Orientation,
}

struct Shared {
    channel: Box<dyn RemoteCommandChannel>,
    compact: bool,
    published: Vec<RemoteAction>,
}

impl Shared {
    fn publish(&mut self, state: &PlaybackState) -> PlayerResult<()> {
        let actions = remote_actions(state);
        if actions == self.published {
            return Ok(());
        }
        trace!("Publishing remote actions for {}", state);
        self.channel.publish(&actions)?;
        self.published = actions;
        Ok(())
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives entry to and exit from compact mode and the remote that goes with it.
///
/// The coordinator only reads session state and issues commands through the
/// [`SessionHandle`]; it never owns playback state itself.
pub struct PictureInPictureCoordinator {
    session: SessionHandle,
    controls: ControlsVisibilityTimer,
    shared: Arc<Mutex<Shared>>,
    capabilities: PlatformCapabilities,
    enabled: bool,
}

impl PictureInPictureCoordinator {
    pub fn new(
        session: SessionHandle,
        controls: ControlsVisibilityTimer,
        channel: Box<dyn RemoteCommandChannel>,
        capabilities: PlatformCapabilities,
        config: &PipConfig,
    ) -> Self {
        Self {
            session,
            controls,
            shared: Arc::new(Mutex::new(Shared {
                channel,
                compact: false,
                published: Vec::new(),
            })),
            capabilities,
            enabled: config.enabled,
        }
    }

    pub fn is_compact(&self) -> bool {
        lock(&self.shared).compact
    }

    pub fn capabilities(&self) -> PlatformCapabilities {
        self.capabilities
    }

    /// Whether compact mode can be entered right now
    pub fn is_available(&self) -> bool {
        self.enabled && self.capabilities.pip_supported
    }

    /// New capability flags from the platform. Losing support while compact
    /// leaves compact mode.
    pub fn update_capabilities(&mut self, capabilities: PlatformCapabilities) {
        debug!("Platform capabilities changed: {:?}", capabilities);
        self.capabilities = capabilities;
        if !capabilities.pip_supported && self.is_compact() {
            warn!("Compact mode no longer supported, leaving it");
            self.on_compact_exit();
        }
    }

    pub fn enter_compact(&self) -> PlayerResult<()> {
        if !self.is_available() {
            debug!(
                "Compact mode refused (supported: {}, enabled: {})",
                self.capabilities.pip_supported, self.enabled
            );
            return Err(PlayerError::PipUnsupported);
        }

        let mut shared = lock(&self.shared);
        if shared.compact {
            return Ok(());
        }

        let state = self.session.view().state().get();
        shared.published.clear();
        shared.publish(&state)?;
        shared.compact = true;
        drop(shared);

        self.controls.hide();
        info!(
            session = %self.session.id(),
            "Entered compact mode ({:?}) while {}",
            self.capabilities.orientation, state
        );
        Ok(())
    }

    /// A remote button was pressed while compact
    pub async fn on_compact_action(&self, command: RemoteCommand) -> PlayerResult<()> {
        if !self.is_compact() {
            warn!("Ignoring remote {:?} outside compact mode", command);
            return Ok(());
        }

        debug!("Remote command {:?}", command);
        let result = match command {
            RemoteCommand::Back => self.session.seek_relative(-SEEK_BACK_MS).await.map(|_| ()),
            RemoteCommand::PlayPause => self.session.toggle().await,
            RemoteCommand::Next => self.session.seek_relative(SEEK_FORWARD_MS).await.map(|_| ()),
        };
        self.sync_actions()?;
        result
    }

    /// Back to the full surface: drop the remote and show the controls, which
    /// hide again on their own unless playback has ended.
    pub fn on_compact_exit(&self) {
        {
            let mut shared = lock(&self.shared);
            if !shared.compact {
                return;
            }
            shared.compact = false;
            shared.channel.clear();
            shared.published.clear();
        }

        let state = self.session.view().state().get();
        self.controls.set_playback_state(&state);
        self.controls.show();
        info!(session = %self.session.id(), "Left compact mode while {}", state);
    }

    /// Forward a host lifecycle signal. Stopping while compact keeps playing.
    pub async fn on_lifecycle(&self, event: LifecycleEvent) -> PlayerResult<()> {
        let compact = self.is_compact();
        self.session.lifecycle(event, compact).await
    }

    /// Republish the remote for the current state if compact
    pub fn sync_actions(&self) -> PlayerResult<()> {
        let mut shared = lock(&self.shared);
        if !shared.compact {
            return Ok(());
        }
        let state = self.session.view().state().get();
        shared.publish(&state)
    }

    /// Keep the remote in step with the session state while compact.
    pub fn watch_state(&self) -> JoinHandle<()> {
        let shared = self.shared.clone();
        let mut states = self.session.view().subscribe_state();

        tokio::spawn(async move {
            while states.wait_for_change().await {
                let state = states.current();
                let mut shared = lock(&shared);
                if shared.compact
                    && let Err(err) = shared.publish(&state)
                {
                    warn!("Failed to update remote actions: {}", err);
                }
            }
            trace!("Remote action follower finished");
        })
    }
}

/// Remote channel that only logs; for hosts without a platform remote.
#[derive(Debug, Default)]
pub struct LoggingRemoteChannel;

impl RemoteCommandChannel for LoggingRemoteChannel {
    fn publish(&mut self, actions: &[RemoteAction]) -> PlayerResult<()> {
        let titles: Vec<&str> = actions
            .iter()
            .map(|action| if action.enabled { action.title } else { "-" })
            .collect();
        info!("Remote actions: [{}]", titles.join(" | "));
        Ok(())
    }

    fn clear(&mut self) {
        info!("Remote actions cleared");
    }
}
