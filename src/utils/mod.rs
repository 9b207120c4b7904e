pub mod errors;
pub mod time;

pub use errors::{PlayerError, PlayerResult};
pub use time::format_duration;
