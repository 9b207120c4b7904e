use tracing::trace;

use super::mapping::{DragAxis, DragMapping, GestureIntent, ZoomDecision, decide_zoom};
use super::zones::{GestureZone, ZoneLayout};
use crate::config::GestureConfig;
use crate::constants::{SEEK_BACK_MS, SEEK_FORWARD_MS};

/// Raw pointer input over the player surface. Times are milliseconds on any
/// monotonic clock, as long as it is the same one passed to `poll`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down { id: u64, x: f32, y: f32, time_ms: u64 },
    Move { id: u64, x: f32, y: f32, time_ms: u64 },
    Up { id: u64, x: f32, y: f32, time_ms: u64 },
    /// The platform took the gesture stream away
    Cancel { id: u64 },
}

#[derive(Debug, Clone, Copy)]
struct Pointer {
    id: u64,
    zone: GestureZone,
    start_x: f32,
    start_y: f32,
    x: f32,
    y: f32,
    axis: Option<DragAxis>,
    // Last y already turned into a level delta
    level_y: f32,
}

impl Pointer {
    fn new(id: u64, zone: GestureZone, x: f32, y: f32) -> Self {
        Self {
            id,
            zone,
            start_x: x,
            start_y: y,
            x,
            y,
            axis: None,
            level_y: y,
        }
    }

    fn dx(&self) -> f32 {
        self.x - self.start_x
    }

    fn dy(&self) -> f32 {
        self.y - self.start_y
    }
}

#[derive(Debug)]
enum Phase {
    Idle,
    Single(Pointer),
    Zoom { left: Pointer, right: Pointer },
    /// Gesture already resolved or unrecognised; wait for every pointer to lift
    Consumed,
}

#[derive(Debug, Clone, Copy)]
struct PendingTap {
    zone: GestureZone,
    time_ms: u64,
}

/// Turns pointer streams into [`GestureIntent`]s.
///
/// Single taps are held back for the double-tap window so a double tap never
/// also toggles the controls; call [`poll`](Self::poll) to release them.
#[derive(Debug)]
pub struct GestureInputMapper {
    layout: ZoneLayout,
    mapping: DragMapping,
    touch_slop: f32,
    double_tap_window_ms: u64,
    phase: Phase,
    down: Vec<u64>,
    pending_tap: Option<PendingTap>,
}

impl GestureInputMapper {
    pub fn new(layout: ZoneLayout, config: &GestureConfig) -> Self {
        Self {
            layout,
            mapping: DragMapping::from_config(config),
            touch_slop: config.touch_slop_px.max(0.0),
            double_tap_window_ms: config.double_tap_window_ms,
            phase: Phase::Idle,
            down: Vec::new(),
            pending_tap: None,
        }
    }

    pub fn layout(&self) -> ZoneLayout {
        self.layout
    }

    /// New surface geometry, e.g. after rotation
    pub fn set_layout(&mut self, layout: ZoneLayout) {
        self.layout = layout;
    }

    /// When the held-back single tap becomes a toggle, if one is pending
    pub fn pending_deadline(&self) -> Option<u64> {
        self.pending_tap
            .map(|tap| tap.time_ms + self.double_tap_window_ms)
    }

    /// Release a held-back single tap whose double-tap window has passed.
    pub fn poll(&mut self, now_ms: u64) -> Option<GestureIntent> {
        let deadline = self.pending_deadline()?;
        if now_ms < deadline {
            return None;
        }
        self.pending_tap = None;
        Some(GestureIntent::ToggleControls)
    }

    pub fn handle(&mut self, event: PointerEvent) -> Vec<GestureIntent> {
        let mut intents = Vec::new();
        match event {
            PointerEvent::Down { id, x, y, time_ms } => self.on_down(id, x, y, time_ms, &mut intents),
            PointerEvent::Move { id, x, y, .. } => self.on_move(id, x, y, &mut intents),
            PointerEvent::Up { id, x, y, time_ms } => self.on_up(id, x, y, time_ms, &mut intents),
            PointerEvent::Cancel { id } => self.on_cancel(id, &mut intents),
        }
        intents
    }

    fn on_down(&mut self, id: u64, x: f32, y: f32, time_ms: u64, intents: &mut Vec<GestureIntent>) {
        if !self.down.contains(&id) {
            self.down.push(id);
        }
        // A stale pending tap must not wait behind a new gesture
        if let Some(intent) = self.poll(time_ms) {
            intents.push(intent);
        }

        let zone = self.layout.classify(x);
        trace!("Pointer {} down in {:?} at ({}, {})", id, zone, x, y);
        let pointer = Pointer::new(id, zone, x, y);

        self.phase = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => Phase::Single(pointer),
            Phase::Single(first) => {
                let sides = (first.zone, zone);
                let still = !matches!(first.axis, Some(DragAxis::Vertical))
                    && !(first.zone == GestureZone::Center && first.axis.is_some());
                match sides {
                    (GestureZone::Left, GestureZone::Right) if still => Phase::Zoom {
                        left: first,
                        right: pointer,
                    },
                    (GestureZone::Right, GestureZone::Left) if still => Phase::Zoom {
                        left: pointer,
                        right: first,
                    },
                    _ => {
                        Self::abandon_drag(&first, intents);
                        Phase::Consumed
                    }
                }
            }
            Phase::Zoom { .. } | Phase::Consumed => Phase::Consumed,
        };
    }

    fn on_move(&mut self, id: u64, x: f32, y: f32, intents: &mut Vec<GestureIntent>) {
        match &mut self.phase {
            Phase::Single(pointer) if pointer.id == id => {
                pointer.x = x;
                pointer.y = y;

                if pointer.axis.is_none() {
                    let (dx, dy) = (pointer.dx(), pointer.dy());
                    if dx.hypot(dy) < self.touch_slop {
                        return;
                    }
                    let axis = if dx.abs() >= dy.abs() {
                        DragAxis::Horizontal
                    } else {
                        DragAxis::Vertical
                    };
                    trace!("Pointer {} dragging {:?} in {:?}", id, axis, pointer.zone);
                    pointer.axis = Some(axis);
                }

                match pointer.axis {
                    Some(DragAxis::Vertical) => {
                        let step = y - pointer.level_y;
                        pointer.level_y = y;
                        if step != 0.0
                            && let Some(intent) =
                                self.mapping
                                    .map_drag(pointer.zone, DragAxis::Vertical, step, false)
                        {
                            intents.push(intent);
                        }
                    }
                    Some(DragAxis::Horizontal) => {
                        if let Some(intent) = self.mapping.map_drag(
                            pointer.zone,
                            DragAxis::Horizontal,
                            pointer.dx(),
                            false,
                        ) {
                            intents.push(intent);
                        }
                    }
                    None => {}
                }
            }
            Phase::Zoom { left, right } => {
                for pointer in [left, right] {
                    if pointer.id == id {
                        pointer.x = x;
                        pointer.y = y;
                    }
                }
            }
            _ => {}
        }
    }

    fn on_up(&mut self, id: u64, x: f32, y: f32, time_ms: u64, intents: &mut Vec<GestureIntent>) {
        self.down.retain(|down| *down != id);

        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Single(mut pointer) if pointer.id == id => {
                pointer.x = x;
                pointer.y = y;
                match pointer.axis {
                    None => self.on_tap(pointer.zone, time_ms, intents),
                    Some(DragAxis::Vertical) => {
                        if pointer.zone != GestureZone::Center {
                            intents.push(GestureIntent::LevelDragEnded);
                        }
                    }
                    Some(DragAxis::Horizontal) => {
                        if let Some(intent) = self.mapping.map_drag(
                            pointer.zone,
                            DragAxis::Horizontal,
                            pointer.dx(),
                            true,
                        ) {
                            intents.push(intent);
                        }
                    }
                }
            }
            Phase::Zoom {
                mut left,
                mut right,
            } => {
                for pointer in [&mut left, &mut right] {
                    if pointer.id == id {
                        pointer.x = x;
                        pointer.y = y;
                    }
                }
                match decide_zoom(left.dx(), right.dx(), self.touch_slop) {
                    ZoomDecision::Unchanged => trace!(
                        "Ambiguous zoom drag ({}, {}), leaving scale unchanged",
                        left.dx(),
                        right.dx()
                    ),
                    decision => intents.push(GestureIntent::Zoom(decision)),
                }
                self.phase = Phase::Consumed;
            }
            other => self.phase = other,
        }

        if self.down.is_empty() {
            self.phase = Phase::Idle;
        }
    }

    fn on_cancel(&mut self, id: u64, intents: &mut Vec<GestureIntent>) {
        trace!("Pointer {} cancelled", id);
        if let Phase::Single(pointer) = &self.phase {
            Self::abandon_drag(pointer, intents);
        }
        self.phase = Phase::Idle;
        self.down.clear();
    }

    fn abandon_drag(pointer: &Pointer, intents: &mut Vec<GestureIntent>) {
        match (pointer.zone, pointer.axis) {
            (GestureZone::Center, Some(DragAxis::Horizontal)) => {
                intents.push(GestureIntent::SeekPreviewCancelled)
            }
            (GestureZone::Left | GestureZone::Right, Some(DragAxis::Vertical)) => {
                intents.push(GestureIntent::LevelDragEnded)
            }
            _ => {}
        }
    }

    fn on_tap(&mut self, zone: GestureZone, time_ms: u64, intents: &mut Vec<GestureIntent>) {
        match self.pending_tap.take() {
            Some(first)
                if first.zone == zone
                    && time_ms.saturating_sub(first.time_ms) <= self.double_tap_window_ms =>
            {
                match zone {
                    GestureZone::Left => intents.push(GestureIntent::SeekRelative {
                        delta_ms: -SEEK_BACK_MS,
                        zone,
                    }),
                    GestureZone::Right => intents.push(GestureIntent::SeekRelative {
                        delta_ms: SEEK_FORWARD_MS,
                        zone,
                    }),
                    GestureZone::Center => intents.push(GestureIntent::ToggleControls),
                }
            }
            Some(_) => {
                // Earlier tap elsewhere stands on its own
                intents.push(GestureIntent::ToggleControls);
                self.pending_tap = Some(PendingTap { zone, time_ms });
            }
            None => self.pending_tap = Some(PendingTap { zone, time_ms }),
        }
    }
}
