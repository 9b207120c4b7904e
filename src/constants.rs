// Playback and gesture tuning constants. Values users may want to change live in
// `config.rs`; these are fixed by the transport controls.

// === Transport ===
/// Seek-back button and left double-tap increment
pub const SEEK_BACK_MS: i64 = 5_000;
/// Seek-forward button and right double-tap increment
pub const SEEK_FORWARD_MS: i64 = 10_000;

// === Gesture zones ===
/// Left zone ends at this fraction of the surface width
pub const LEFT_ZONE_FRACTION: f32 = 0.25;
/// Right zone starts at this fraction of the surface width
pub const RIGHT_ZONE_FRACTION: f32 = 0.75;

// === Controls chrome ===
pub const DEFAULT_CONTROLS_HIDE_SECS: u64 = 5;
pub const DEFAULT_TAP_FEEDBACK_MS: u64 = 500;

// === Position sampling ===
pub const DEFAULT_POSITION_SAMPLE_HZ: u32 = 30;
