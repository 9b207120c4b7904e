//! Pure mappings from gesture geometry to intents. Nothing here touches the
//! session or any platform service.

use super::zones::GestureZone;
use crate::config::GestureConfig;

/// Dominant direction of a drag, fixed once it leaves the touch slop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragAxis {
    Horizontal,
    Vertical,
}

/// Outcome of a two-finger horizontal drag across the side zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDecision {
    /// Both fingers moved outward: fill the screen, cropping
    ScaleUp,
    /// Both fingers moved inward: back to fit
    Fit,
    /// Mixed or too small to read
    Unchanged,
}

/// What a recognised gesture asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureIntent {
    ToggleControls,
    /// Double tap in a side zone
    SeekRelative { delta_ms: i64, zone: GestureZone },
    /// Fraction of full range, positive is brighter
    BrightnessDelta(f32),
    /// Fraction of full range, positive is louder
    VolumeDelta(f32),
    /// Centre horizontal drag; only a `commit` preview reaches the engine
    SeekPreview { delta_ms: i64, commit: bool },
    /// Centre drag was cancelled; drop the readout without seeking
    SeekPreviewCancelled,
    /// Side vertical drag released; hide the level readout
    LevelDragEnded,
    Zoom(ZoomDecision),
}

/// Scale factors turning drag distance into deltas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragMapping {
    pub seek_ms_per_px: f32,
    pub level_per_px: f32,
}

impl Default for DragMapping {
    fn default() -> Self {
        Self::from_config(&GestureConfig::default())
    }
}

impl DragMapping {
    pub fn from_config(config: &GestureConfig) -> Self {
        Self {
            seek_ms_per_px: config.seek_ms_per_px,
            level_per_px: config.level_per_px,
        }
    }

    /// Map a single-finger drag of `amount` pixels along `axis` in `zone`.
    ///
    /// Vertical amounts follow screen coordinates (down is positive), so the
    /// sign is inverted: dragging up raises the level. Horizontal amounts are
    /// the distance accumulated since the drag started.
    pub fn map_drag(
        &self,
        zone: GestureZone,
        axis: DragAxis,
        amount: f32,
        commit: bool,
    ) -> Option<GestureIntent> {
        if !amount.is_finite() {
            return None;
        }

        match (zone, axis) {
            (GestureZone::Left, DragAxis::Vertical) => {
                Some(GestureIntent::BrightnessDelta(-amount * self.level_per_px))
            }
            (GestureZone::Right, DragAxis::Vertical) => {
                Some(GestureIntent::VolumeDelta(-amount * self.level_per_px))
            }
            (GestureZone::Center, DragAxis::Horizontal) => Some(GestureIntent::SeekPreview {
                delta_ms: self.seek_delta_ms(amount),
                commit,
            }),
            _ => None,
        }
    }

    pub fn seek_delta_ms(&self, amount: f32) -> i64 {
        (amount * self.seek_ms_per_px).round() as i64
    }
}

/// Read a two-finger side drag. `left_dx` and `right_dx` are the horizontal
/// distances moved by the fingers in the left and right zones; movements under
/// `slop` pixels count as not moving.
pub fn decide_zoom(left_dx: f32, right_dx: f32, slop: f32) -> ZoomDecision {
    let direction = |dx: f32| {
        if dx.abs() < slop || !dx.is_finite() {
            0
        } else if dx > 0.0 {
            1
        } else {
            -1
        }
    };

    match (direction(left_dx), direction(right_dx)) {
        (-1, 1) => ZoomDecision::ScaleUp,
        (1, -1) => ZoomDecision::Fit,
        _ => ZoomDecision::Unchanged,
    }
}

/// Seek target for a preview, clamped into the media. A zero duration means
/// the length is not known yet and only the lower bound applies.
pub fn preview_target(current_ms: u64, delta_ms: i64, duration_ms: u64) -> u64 {
    let target = current_ms.saturating_add_signed(delta_ms);
    if duration_ms > 0 {
        target.min(duration_ms)
    } else {
        target
    }
}
