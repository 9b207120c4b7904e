pub mod player_view_model;
pub mod property;

pub use player_view_model::{PlaybackSnapshot, PlayerViewModel};
pub use property::{Property, PropertySubscriber};
