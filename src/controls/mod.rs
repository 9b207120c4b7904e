pub mod visibility;

pub use visibility::ControlsVisibilityTimer;
