//! Gesture input over the player surface: zone classification, pure drag
//! mappings, the pointer recogniser and the dispatcher that applies intents.

pub mod dispatcher;
pub mod mapping;
pub mod recognizer;
pub mod zones;

pub use dispatcher::{GestureDispatcher, GestureReadouts, LevelControl, SeekPreviewReadout, TapPulse};
pub use mapping::{DragAxis, DragMapping, GestureIntent, ZoomDecision, decide_zoom, preview_target};
pub use recognizer::{GestureInputMapper, PointerEvent};
pub use zones::{GestureZone, ZoneLayout, classify_zone};
