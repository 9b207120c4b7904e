use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::mapping::{GestureIntent, ZoomDecision, preview_target};
use super::zones::GestureZone;
use crate::controls::ControlsVisibilityTimer;
use crate::core::Property;
use crate::player::{SessionHandle, ZoomMode};
use crate::utils::PlayerResult;
use crate::utils::time::format_millis;

/// A platform level (screen brightness, media volume) in `0.0..=1.0`.
pub trait LevelControl: Send {
    fn level(&self) -> f32;
    fn set_level(&mut self, level: f32);
}

/// Seek-preview triple shown while a centre drag is in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct SeekPreviewReadout {
    pub target: String,
    pub current: String,
    pub total: String,
    pub target_ms: u64,
}

/// Double-tap feedback on one side of the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapPulse {
    pub zone: GestureZone,
    pub started: Instant,
}

impl TapPulse {
    /// Linear fade from 1.0 to 0.0 over `fade`
    pub fn opacity(&self, now: Instant, fade: Duration) -> f32 {
        if fade.is_zero() {
            return 0.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (1.0 - elapsed.as_secs_f32() / fade.as_secs_f32()).clamp(0.0, 1.0)
    }
}

/// Transient on-screen feedback for gestures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GestureReadouts {
    pub brightness_percent: Option<u8>,
    pub volume_percent: Option<u8>,
    pub seek_preview: Option<SeekPreviewReadout>,
    pub tap_pulse: Option<TapPulse>,
}

fn percent(level: f32) -> u8 {
    (level.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Applies recognised gestures to the session, the platform levels and the
/// controls timer, and keeps the readouts current.
pub struct GestureDispatcher {
    session: SessionHandle,
    controls: ControlsVisibilityTimer,
    brightness: Box<dyn LevelControl>,
    volume: Box<dyn LevelControl>,
    readouts: Property<GestureReadouts>,
    tap_feedback: Duration,
    // Position the running centre drag is previewing from
    preview_base: Option<u64>,
}

impl GestureDispatcher {
    pub fn new(
        session: SessionHandle,
        controls: ControlsVisibilityTimer,
        brightness: Box<dyn LevelControl>,
        volume: Box<dyn LevelControl>,
        tap_feedback: Duration,
    ) -> Self {
        Self {
            session,
            controls,
            brightness,
            volume,
            readouts: Property::new(GestureReadouts::default(), "gesture_readouts"),
            tap_feedback,
            preview_base: None,
        }
    }

    pub fn readouts(&self) -> &Property<GestureReadouts> {
        &self.readouts
    }

    /// Current opacity of the double-tap pulse, 0.0 when there is none
    pub fn tap_pulse_opacity(&self) -> f32 {
        self.readouts
            .get()
            .tap_pulse
            .map(|pulse| pulse.opacity(Instant::now(), self.tap_feedback))
            .unwrap_or(0.0)
    }

    pub async fn dispatch_all(&mut self, intents: Vec<GestureIntent>) -> PlayerResult<()> {
        for intent in intents {
            self.dispatch(intent).await?;
        }
        Ok(())
    }

    pub async fn dispatch(&mut self, intent: GestureIntent) -> PlayerResult<()> {
        trace!("Dispatching {:?}", intent);
        match intent {
            GestureIntent::ToggleControls => self.controls.toggle(),
            GestureIntent::SeekRelative { delta_ms, zone } => {
                self.controls.touch();
                self.session.fire_seek_relative(delta_ms)?;
                self.pulse(zone);
            }
            GestureIntent::BrightnessDelta(delta) => {
                self.controls.touch();
                let level = (self.brightness.level() + delta).clamp(0.0, 1.0);
                self.brightness.set_level(level);
                self.readouts
                    .update(|readouts| readouts.brightness_percent = Some(percent(level)));
            }
            GestureIntent::VolumeDelta(delta) => {
                self.controls.touch();
                let level = (self.volume.level() + delta).clamp(0.0, 1.0);
                self.volume.set_level(level);
                self.readouts
                    .update(|readouts| readouts.volume_percent = Some(percent(level)));
            }
            GestureIntent::LevelDragEnded => {
                self.readouts.update(|readouts| {
                    readouts.brightness_percent = None;
                    readouts.volume_percent = None;
                });
            }
            GestureIntent::SeekPreview { delta_ms, commit } => {
                self.controls.touch();
                self.preview(delta_ms, commit)?;
            }
            GestureIntent::SeekPreviewCancelled => {
                self.preview_base = None;
                self.readouts.update(|readouts| readouts.seek_preview = None);
            }
            GestureIntent::Zoom(decision) => {
                let mode = match decision {
                    ZoomDecision::ScaleUp => ZoomMode::Fill,
                    ZoomDecision::Fit => ZoomMode::Fit,
                    ZoomDecision::Unchanged => return Ok(()),
                };
                debug!("Zoom gesture: {}", mode.label());
                self.session.set_zoom_mode(mode).await?;
            }
        }
        Ok(())
    }

    fn preview(&mut self, delta_ms: i64, commit: bool) -> PlayerResult<()> {
        let view = self.session.view();
        let current = view.current_time_ms().get();
        let duration = view.duration_ms().get();
        let base = *self.preview_base.get_or_insert(current);
        let target = preview_target(base, delta_ms, duration);

        if commit {
            debug!("Committing seek preview to {} ms", target);
            self.preview_base = None;
            self.readouts.update(|readouts| readouts.seek_preview = None);
            return self.session.fire_seek_absolute(target);
        }

        let readout = SeekPreviewReadout {
            target: format_millis(target),
            current: format_millis(current),
            total: format_millis(duration),
            target_ms: target,
        };
        self.readouts
            .update(|readouts| readouts.seek_preview = Some(readout));
        Ok(())
    }

    fn pulse(&self, zone: GestureZone) {
        let pulse = TapPulse {
            zone,
            started: Instant::now(),
        };
        self.readouts
            .update(|readouts| readouts.tap_pulse = Some(pulse));

        let readouts = self.readouts.clone();
        let fade = self.tap_feedback;
        tokio::spawn(async move {
            tokio::time::sleep(fade).await;
            readouts.update(|readouts| {
                if readouts.tap_pulse == Some(pulse) {
                    readouts.tap_pulse = None;
                }
            });
        });
    }
}
