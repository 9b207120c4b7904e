pub mod controller;
pub mod resolver;
pub mod sampler;
pub mod simulated;
pub mod traits;
pub mod types;

pub use controller::{LoadTicket, PlaybackSessionController, SessionCommand, SessionHandle};
pub use resolver::SourceResolver;
pub use simulated::{SimulatedEngine, SimulatedEngineControl, SimulatedMedia};
pub use traits::{EngineEvent, EngineEventSink, PlaybackEngine};
pub use types::{LifecycleEvent, PlaybackState, SessionEvent, ZoomMode};
