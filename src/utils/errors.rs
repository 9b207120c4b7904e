use thiserror::Error;

use crate::models::TranslationKind;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlayerError {
    #[error("Source unavailable: episode {episode}, {kind} {quality}")]
    SourceUnavailable {
        episode: u32,
        kind: TranslationKind,
        quality: String,
    },

    #[error("Engine failure: {0}")]
    EngineFatal(String),

    #[error("Engine command failed: {0}")]
    Engine(String),

    #[error("Operation '{operation}' not valid in state {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    #[error("Invalid playback speed: {0}")]
    InvalidSpeed(f64),

    #[error("Picture-in-picture is not supported")]
    PipUnsupported,

    #[error("Load superseded by a newer source")]
    LoadCancelled,

    #[error("Player controller disconnected")]
    Disconnected,
}

pub type PlayerResult<T> = Result<T, PlayerError>;
