use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::core::{Property, PropertySubscriber};
use crate::player::PlaybackState;

/// Visibility state machine for the transport chrome
#[derive(Debug)]
enum ControlState {
    /// Controls are hidden
    Hidden,
    /// Controls are visible with the inactivity countdown running
    Visible { countdown: JoinHandle<()> },
    /// Controls are visible and stay so: playback has ended
    Pinned,
}

#[derive(Debug)]
struct Inner {
    state: ControlState,
    // Bumped on every transition so a countdown that already fired cannot
    // hide controls that were re-shown in the meantime
    generation: u64,
    ended: bool,
}

/// Auto-hide timer for the on-screen transport controls.
///
/// Clones share the same state, so gestures, the PiP coordinator and the
/// state follower can all drive one timer.
#[derive(Debug, Clone)]
pub struct ControlsVisibilityTimer {
    inner: Arc<Mutex<Inner>>,
    visible: Property<bool>,
    hide_after: Duration,
}

impl ControlsVisibilityTimer {
    /// Starts hidden
    pub fn new(hide_after: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: ControlState::Hidden,
                generation: 0,
                ended: false,
            })),
            visible: Property::new(false, "controls_visible"),
            hide_after,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_visible(&self) -> bool {
        self.visible.get()
    }

    pub fn visible(&self) -> &Property<bool> {
        &self.visible
    }

    pub fn subscribe(&self) -> PropertySubscriber<bool> {
        self.visible.subscribe()
    }

    /// Whether a hide countdown is currently armed
    pub fn is_armed(&self) -> bool {
        matches!(self.lock().state, ControlState::Visible { .. })
    }

    /// Show the controls and (re)start the countdown.
    pub fn show(&self) {
        let mut inner = self.lock();
        self.transition_to_visible(&mut inner);
    }

    /// Hide immediately. Ignored once playback has ended.
    pub fn hide(&self) {
        let mut inner = self.lock();
        if inner.ended {
            debug!("Playback ended, keeping controls visible");
            return;
        }
        self.transition_to_hidden(&mut inner);
    }

    /// Single tap: flip visibility
    pub fn toggle(&self) {
        let mut inner = self.lock();
        match inner.state {
            ControlState::Hidden => self.transition_to_visible(&mut inner),
            ControlState::Visible { .. } => self.transition_to_hidden(&mut inner),
            ControlState::Pinned => {}
        }
    }

    /// Any user interaction: reset the countdown if the controls are showing
    pub fn touch(&self) {
        let mut inner = self.lock();
        if matches!(inner.state, ControlState::Visible { .. }) {
            self.transition_to_visible(&mut inner);
        }
    }

    /// Reaching `Ended` pins the controls; leaving it re-arms the countdown.
    pub fn set_playback_state(&self, state: &PlaybackState) {
        let mut inner = self.lock();
        let ended = *state == PlaybackState::Ended;
        if ended == inner.ended {
            return;
        }

        inner.ended = ended;
        if ended {
            self.transition_to_pinned(&mut inner);
        } else if matches!(inner.state, ControlState::Pinned) {
            self.transition_to_visible(&mut inner);
        }
    }

    /// Keep the timer in step with a session's playback state
    pub fn spawn_state_follower(&self, mut states: PropertySubscriber<PlaybackState>) -> JoinHandle<()> {
        let timer = self.clone();
        timer.set_playback_state(&states.current());
        tokio::spawn(async move {
            while states.wait_for_change().await {
                timer.set_playback_state(&states.current());
            }
            trace!("Controls state follower finished");
        })
    }

    fn cancel_countdown(inner: &mut Inner) {
        if let ControlState::Visible { countdown } = &inner.state {
            countdown.abort();
        }
        inner.generation += 1;
    }

    fn transition_to_hidden(&self, inner: &mut Inner) {
        Self::cancel_countdown(inner);
        inner.state = ControlState::Hidden;
        self.visible.set_if_changed(false);
    }

    fn transition_to_pinned(&self, inner: &mut Inner) {
        Self::cancel_countdown(inner);
        inner.state = ControlState::Pinned;
        self.visible.set_if_changed(true);
    }

    fn transition_to_visible(&self, inner: &mut Inner) {
        Self::cancel_countdown(inner);
        self.visible.set_if_changed(true);

        if inner.ended {
            inner.state = ControlState::Pinned;
            return;
        }

        let generation = inner.generation;
        let timer = self.clone();
        let hide_after = self.hide_after;
        let countdown = tokio::spawn(async move {
            tokio::time::sleep(hide_after).await;
            let mut inner = timer.lock();
            if inner.generation == generation {
                trace!("Controls hidden after inactivity");
                timer.transition_to_hidden(&mut inner);
            }
        });
        inner.state = ControlState::Visible { countdown };
    }
}
