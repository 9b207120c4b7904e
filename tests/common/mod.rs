pub mod fixtures;

use kadr::config::Config;
use kadr::player::{
    PlaybackSessionController, SessionHandle, SimulatedEngine, SimulatedEngineControl,
    SourceResolver,
};
use std::time::Duration;

pub use fixtures::{DURATION_MS, EPISODES, Fixtures};
pub use mocks::{MockLevel, RecordingRemoteChannel};

/// A running session over the simulated engine and the fixture catalogue.
pub struct TestContext {
    pub session: SessionHandle,
    pub engine: SimulatedEngineControl,
    pub config: Config,
}

impl TestContext {
    pub fn new(episode: u32) -> Self {
        Self::with_config(episode, Config::default())
    }

    pub fn with_config(episode: u32, config: Config) -> Self {
        let (engine, control) = SimulatedEngine::new(DURATION_MS);
        let resolver = SourceResolver::new(Fixtures::catalogue(), Fixtures::context(episode));
        let session = PlaybackSessionController::spawn(Box::new(engine), &config, resolver);

        Self {
            session,
            engine: control,
            config,
        }
    }

    /// Opens `episode` dubbed at 720p and waits for it to play
    pub async fn playing(episode: u32) -> Self {
        let context = Self::new(episode);
        context
            .session
            .open_episode(episode, kadr::TranslationKind::Dubbed, "720")
            .await
            .expect("episode should open");
        context
    }

    pub fn position(&self) -> u64 {
        self.session.view().current_time_ms().get()
    }

    /// Let queued engine events and sampler ticks run
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
