pub mod viewmodels;

pub use viewmodels::{PlaybackSnapshot, PlayerViewModel, Property, PropertySubscriber};
