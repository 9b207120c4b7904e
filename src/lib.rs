// Playback session library; the headless driver lives in src/main.rs

#![allow(clippy::result_large_err)]

pub mod config;
pub mod constants;
pub mod controls;
pub mod core;
pub mod gestures;
pub mod models;
pub mod pip;
pub mod player;
pub mod utils;

pub use config::Config;
pub use controls::ControlsVisibilityTimer;
pub use gestures::{GestureDispatcher, GestureInputMapper, GestureIntent, GestureZone};
pub use models::{
    EpisodeNavigationContext, NavigationDirection, NavigationOutcome, PlaybackPosition,
    SourceDescriptor, TranslationEntry, TranslationKind,
};
pub use pip::{PictureInPictureCoordinator, RemoteCommand, RemoteCommandChannel};
pub use player::{
    PlaybackEngine, PlaybackSessionController, PlaybackState, SessionHandle, SourceResolver,
};
pub use utils::{PlayerError, PlayerResult};
